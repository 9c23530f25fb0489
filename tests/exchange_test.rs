// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Exchange public API integration tests.

use currency_exchange_rs::{
    Balance, Currency, Exchange, ExchangeError, Participant, ParticipantId, RejectReason,
    TransactionRequest, TransactionStatus,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::thread;

fn make_participant(id: u32, amounts: &[(Currency, Decimal)]) -> Arc<Participant> {
    Arc::new(Participant::new(
        ParticipantId(id),
        format!("participant-{id}"),
        Balance::with_amounts(amounts.iter().copied()),
        2,
    ))
}

fn register(exchange: &Exchange, id: u32, amounts: &[(Currency, Decimal)]) -> Arc<Participant> {
    let participant = make_participant(id, amounts);
    exchange
        .register_participant(Arc::clone(&participant))
        .unwrap();
    participant
}

fn sell<'a>(
    seller: &'a Participant,
    from: Currency,
    to: Currency,
    amount: Decimal,
) -> TransactionRequest<'a> {
    TransactionRequest::builder()
        .seller(seller)
        .from(from)
        .to(to)
        .amount(amount)
        .build()
        .unwrap()
}

// === Trades with the exchange ===

#[test]
fn convert_with_exchange_uses_derived_rate() {
    let exchange = Exchange::with_default_rates();
    let alice = register(&exchange, 1, &[(Currency::Mnt, dec!(1000))]);

    let record = exchange.submit(&sell(&alice, Currency::Mnt, Currency::Usd, dec!(400)));

    assert_eq!(record.status(), TransactionStatus::Completed);
    assert_eq!(record.rate(), dec!(0.000290));
    assert_eq!(alice.balance().get(Currency::Mnt), dec!(600));
    assert_eq!(alice.balance().get(Currency::Usd), dec!(0.116));
    assert_eq!(exchange.transaction_count(), 1);
}

#[test]
fn insufficient_funds_rejects_without_touching_balances() {
    let exchange = Exchange::with_default_rates();
    let alice = register(&exchange, 1, &[(Currency::Eur, dec!(5))]);

    let completed =
        exchange.execute_transaction(&sell(&alice, Currency::Usd, Currency::Eur, dec!(50)));

    assert!(!completed);
    assert_eq!(alice.balance().get(Currency::Usd), Decimal::ZERO);
    assert_eq!(alice.balance().get(Currency::Eur), dec!(5));

    let history = exchange.transaction_history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status(), TransactionStatus::Rejected);
    assert_eq!(
        history[0].reason(),
        Some(&RejectReason::InsufficientFunds {
            participant: ParticipantId(1),
            currency: Currency::Usd,
            required: dec!(50),
            available: Decimal::ZERO,
        })
    );
}

#[test]
fn completed_trade_drifts_the_rate() {
    let exchange = Exchange::with_default_rates();
    let alice = register(&exchange, 1, &[(Currency::Usd, dec!(10000))]);

    assert!(exchange.execute_transaction(&sell(&alice, Currency::Usd, Currency::Eur, dec!(5000))));

    assert_eq!(exchange.get_exchange_rate(Currency::Usd, Currency::Eur), dec!(0.910005));
}

#[test]
fn small_or_rejected_trades_leave_rates_alone() {
    let exchange = Exchange::with_default_rates();
    let alice = register(&exchange, 1, &[(Currency::Usd, dec!(100))]);
    let before = exchange.all_rates();

    let small = sell(&alice, Currency::Usd, Currency::Mnt, dec!(10));
    let unaffordable = sell(&alice, Currency::Usd, Currency::Eur, dec!(50000));
    assert!(exchange.execute_transaction(&small));
    assert!(!exchange.execute_transaction(&unaffordable));

    assert_eq!(exchange.all_rates(), before);
}

#[test]
fn unknown_pair_is_rejected() {
    let exchange = Exchange::new(Default::default());
    let alice = register(&exchange, 1, &[(Currency::Usd, dec!(100))]);

    let record = exchange.submit(&sell(&alice, Currency::Usd, Currency::Eur, dec!(10)));

    assert_eq!(record.reason(), Some(&RejectReason::UntradeablePair));
    assert_eq!(alice.balance().get(Currency::Usd), dec!(100));
}

#[test]
fn overflowing_credit_is_rejected_with_nothing_applied() {
    let exchange = Exchange::with_default_rates();
    let alice = register(
        &exchange,
        1,
        &[(Currency::Mnt, Decimal::MAX - Decimal::ONE), (Currency::Usd, dec!(1000))],
    );

    let record = exchange.submit(&sell(&alice, Currency::Usd, Currency::Mnt, dec!(1000)));

    assert_eq!(record.reason(), Some(&RejectReason::Overflow));
    assert_eq!(alice.balance().get(Currency::Usd), dec!(1000));
    assert_eq!(alice.balance().get(Currency::Mnt), Decimal::MAX - Decimal::ONE);
    assert_eq!(exchange.transaction_count(), 1);
}

#[test]
fn overflowing_conversion_is_recorded_without_panicking() {
    let exchange = Exchange::with_default_rates();
    let alice = register(&exchange, 1, &[(Currency::Usd, Decimal::MAX)]);

    let record = exchange.submit(&sell(&alice, Currency::Usd, Currency::Mnt, Decimal::MAX));

    assert_eq!(record.reason(), Some(&RejectReason::Overflow));
    assert_eq!(record.converted_amount(), None);
    assert_eq!(exchange.transaction_history()[0].converted_amount(), None);
    assert_eq!(alice.balance().get(Currency::Usd), Decimal::MAX);
}

// === Peer-to-peer ===

#[test]
fn peer_to_peer_trade_moves_both_legs() {
    let exchange = Exchange::with_default_rates();
    let buyer = register(&exchange, 1, &[(Currency::Eur, dec!(100))]);
    let seller = register(&exchange, 2, &[(Currency::Usd, dec!(50))]);

    let request = TransactionRequest::builder()
        .buyer(&buyer)
        .seller(&seller)
        .from(Currency::Usd)
        .to(Currency::Eur)
        .amount(dec!(50))
        .rate(dec!(0.9))
        .build()
        .unwrap();
    let record = exchange.submit(&request);

    assert!(record.is_completed());
    assert!(record.is_peer_to_peer());
    assert_eq!(buyer.balance().get(Currency::Eur), dec!(55));
    assert_eq!(buyer.balance().get(Currency::Usd), dec!(50));
    assert_eq!(seller.balance().get(Currency::Usd), Decimal::ZERO);
    assert_eq!(seller.balance().get(Currency::Eur), dec!(45));
}

#[test]
fn peer_to_peer_rejects_when_seller_is_short() {
    let exchange = Exchange::with_default_rates();
    let buyer = register(&exchange, 1, &[(Currency::Eur, dec!(100))]);
    let seller = register(&exchange, 2, &[(Currency::Usd, dec!(10))]);

    let request = TransactionRequest::builder()
        .buyer(&buyer)
        .seller(&seller)
        .from(Currency::Usd)
        .to(Currency::Eur)
        .amount(dec!(50))
        .rate(dec!(0.9))
        .build()
        .unwrap();

    assert!(!exchange.execute_transaction(&request));
    assert_eq!(buyer.balance().get(Currency::Eur), dec!(100));
    assert_eq!(seller.balance().get(Currency::Usd), dec!(10));
}

#[test]
fn peer_to_peer_overflow_leaves_both_ledgers_untouched() {
    let exchange = Exchange::with_default_rates();
    let buyer = register(
        &exchange,
        1,
        &[(Currency::Usd, Decimal::MAX), (Currency::Eur, dec!(100))],
    );
    let seller = register(&exchange, 2, &[(Currency::Usd, dec!(10))]);

    let request = TransactionRequest::builder()
        .buyer(&buyer)
        .seller(&seller)
        .from(Currency::Usd)
        .to(Currency::Eur)
        .amount(dec!(10))
        .rate(dec!(1))
        .build()
        .unwrap();
    let record = exchange.submit(&request);

    assert_eq!(record.reason(), Some(&RejectReason::Overflow));
    assert_eq!(buyer.balance().get(Currency::Usd), Decimal::MAX);
    assert_eq!(buyer.balance().get(Currency::Eur), dec!(100));
    assert_eq!(seller.balance().get(Currency::Usd), dec!(10));
    assert_eq!(seller.balance().get(Currency::Eur), Decimal::ZERO);
}

#[test]
fn peer_to_peer_trade_drifts_the_pair_rate() {
    let exchange = Exchange::with_default_rates();
    let buyer = register(&exchange, 1, &[(Currency::Eur, dec!(100000))]);
    let seller = register(&exchange, 2, &[(Currency::Usd, dec!(100000))]);

    let request = TransactionRequest::builder()
        .buyer(&buyer)
        .seller(&seller)
        .from(Currency::Usd)
        .to(Currency::Eur)
        .amount(dec!(50000))
        .rate(dec!(0.9))
        .build()
        .unwrap();
    assert!(exchange.execute_transaction(&request));

    assert_eq!(exchange.get_exchange_rate(Currency::Usd, Currency::Eur), dec!(0.91005));
}

// === Rates ===

#[test]
fn rates_are_symmetric() {
    let exchange = Exchange::with_default_rates();
    for from in Currency::ALL {
        for to in Currency::ALL {
            let rate = exchange.get_exchange_rate(from, to);
            let inverse = exchange.get_exchange_rate(to, from);
            assert!(rate > Decimal::ZERO, "{from}→{to}");
            assert!(
                (rate * inverse - Decimal::ONE).abs() < dec!(0.001),
                "{from}→{to}: {rate} × {inverse}"
            );
        }
    }
}

#[test]
fn set_exchange_rate_overrides_lookup() {
    let exchange = Exchange::with_default_rates();
    exchange
        .set_exchange_rate(Currency::Eur, Currency::Usd, dec!(1.2))
        .unwrap();
    assert_eq!(exchange.get_exchange_rate(Currency::Eur, Currency::Usd), dec!(1.2));
    assert!(
        exchange
            .set_exchange_rate(Currency::Eur, Currency::Usd, dec!(-1))
            .is_err()
    );
}

// === Registry and history ===

#[test]
fn duplicate_registration_is_rejected() {
    let exchange = Exchange::with_default_rates();
    register(&exchange, 1, &[]);

    let result = exchange.register_participant(make_participant(1, &[]));

    assert_eq!(result, Err(ExchangeError::DuplicateParticipant(ParticipantId(1))));
    assert_eq!(exchange.participants().len(), 1);
}

#[test]
fn participants_are_listed_by_id() {
    let exchange = Exchange::with_default_rates();
    for id in [3, 1, 2] {
        register(&exchange, id, &[]);
    }
    let ids: Vec<_> = exchange.participants().iter().map(|p| p.id().0).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert!(exchange.participant(ParticipantId(2)).is_some());
    assert!(exchange.participant(ParticipantId(9)).is_none());
}

#[test]
fn history_is_append_only() {
    let exchange = Exchange::with_default_rates();
    let alice = register(&exchange, 1, &[(Currency::Usd, dec!(100))]);

    exchange.execute_transaction(&sell(&alice, Currency::Usd, Currency::Mnt, dec!(10)));
    let first = exchange.transaction_history();

    exchange.execute_transaction(&sell(&alice, Currency::Usd, Currency::Eur, dec!(1000)));
    exchange.execute_transaction(&sell(&alice, Currency::Usd, Currency::Eur, dec!(10)));
    let second = exchange.transaction_history();

    assert_eq!(second.len(), 3);
    assert_eq!(&second[..1], &first[..]);
    let counts = exchange.transaction_counts();
    assert_eq!((counts.completed, counts.rejected), (2, 1));
}

#[test]
fn concurrent_submissions_never_overdraw() {
    let exchange = Arc::new(Exchange::with_default_rates());
    let alice = register(&exchange, 1, &[(Currency::Usd, dec!(100))]);

    thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for _ in 0..25 {
                    let request = sell(&alice, Currency::Usd, Currency::Mnt, dec!(1));
                    exchange.execute_transaction(&request);
                }
            });
        }
    });

    let counts = exchange.transaction_counts();
    assert_eq!(counts.completed, 100);
    assert_eq!(counts.rejected, 100);
    assert_eq!(alice.balance().get(Currency::Usd), Decimal::ZERO);

    let ids: Vec<_> = exchange.transaction_history().iter().map(|tx| tx.id().0).collect();
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
}
