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

//! Deadlock detection tests using parking_lot's built-in deadlock detector.
//!
//! These tests drive the real exchange with locking patterns that would
//! deadlock under a naive lock order: opposing peer-to-peer trades between
//! the same two participants, trades interleaved with balance snapshots and
//! rate updates, and full trader runs.
//!
//! Ledgers and the rate table use parking_lot locks, so the
//! `deadlock_detection` dev feature lets a background thread find cycles in
//! the lock graph.

use currency_exchange_rs::reporter::write_report;
use currency_exchange_rs::{
    Balance, Currency, Exchange, Participant, ParticipantId, ParticipantTrader, TraderConfig,
    TransactionRequest,
};
use parking_lot::deadlock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Starts a background thread that checks for deadlocks.
/// Returns a handle to stop the detector.
fn start_deadlock_detector() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();

    thread::spawn(move || {
        while running_clone.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(100));
            let deadlocks = deadlock::check_deadlock();
            if !deadlocks.is_empty() {
                eprintln!("\n=== DEADLOCK DETECTED ===");
                for (i, threads) in deadlocks.iter().enumerate() {
                    eprintln!("\nDeadlock #{}", i + 1);
                    for t in threads {
                        eprintln!("Thread ID: {:?}", t.thread_id());
                        eprintln!("Backtrace:\n{:#?}", t.backtrace());
                    }
                }
                panic!("Deadlock detected! See output above for details.");
            }
        }
    });

    running
}

/// Stops the deadlock detector.
fn stop_deadlock_detector(running: Arc<AtomicBool>) {
    running.store(false, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(150));
}

fn rich_participant(id: u32) -> Arc<Participant> {
    Arc::new(Participant::new(
        ParticipantId(id),
        format!("p{id}"),
        Balance::with_amounts([
            (Currency::Mnt, dec!(10_000_000)),
            (Currency::Usd, dec!(100_000)),
            (Currency::Eur, dec!(100_000)),
        ]),
        4,
    ))
}

fn setup(count: u32) -> (Arc<Exchange>, Vec<Arc<Participant>>) {
    let exchange = Arc::new(Exchange::with_default_rates());
    let participants: Vec<_> = (1..=count).map(rich_participant).collect();
    for participant in &participants {
        exchange
            .register_participant(Arc::clone(participant))
            .unwrap();
    }
    (exchange, participants)
}

fn peer_trade(exchange: &Exchange, buyer: &Participant, seller: &Participant, amount: Decimal) {
    let request = TransactionRequest::builder()
        .buyer(buyer)
        .seller(seller)
        .from(Currency::Usd)
        .to(Currency::Eur)
        .amount(amount)
        .rate(dec!(0.9))
        .build()
        .unwrap();
    exchange.execute_transaction(&request);
}

// === Tests ===

/// Two participants trading against each other from both sides at once.
#[test]
fn no_deadlock_opposing_peer_trades() {
    let detector = start_deadlock_detector();
    let (exchange, participants) = setup(2);
    let (a, b) = (&participants[0], &participants[1]);

    const NUM_THREADS: usize = 16;
    const OPS_PER_THREAD: usize = 500;

    thread::scope(|scope| {
        for i in 0..NUM_THREADS {
            let exchange = &exchange;
            scope.spawn(move || {
                for _ in 0..OPS_PER_THREAD {
                    if i % 2 == 0 {
                        peer_trade(exchange, a, b, dec!(1));
                    } else {
                        peer_trade(exchange, b, a, dec!(1));
                    }
                }
            });
        }
    });

    stop_deadlock_detector(detector);

    assert_eq!(exchange.transaction_count(), NUM_THREADS * OPS_PER_THREAD);
    let usd = a.balance().get(Currency::Usd) + b.balance().get(Currency::Usd);
    let eur = a.balance().get(Currency::Eur) + b.balance().get(Currency::Eur);
    assert_eq!(usd, dec!(200_000));
    assert_eq!(eur, dec!(200_000));
}

/// Trades in a ring so every participant is both buyer and seller.
#[test]
fn no_deadlock_ring_of_peer_trades() {
    let detector = start_deadlock_detector();
    let (exchange, participants) = setup(5);

    thread::scope(|scope| {
        for i in 0..participants.len() {
            let exchange = &exchange;
            let seller = &participants[i];
            let buyer = &participants[(i + 1) % participants.len()];
            scope.spawn(move || {
                for _ in 0..500 {
                    peer_trade(exchange, buyer, seller, dec!(2));
                }
            });
        }
    });

    stop_deadlock_detector(detector);

    for participant in &participants {
        for (_, held) in participant.balance().snapshot().iter() {
            assert!(held >= Decimal::ZERO);
        }
    }
}

/// Snapshots, reports and rate updates interleaved with trading.
#[test]
fn no_deadlock_reads_and_rate_updates_during_trades() {
    let detector = start_deadlock_detector();
    let (exchange, participants) = setup(3);
    let done = AtomicBool::new(false);

    thread::scope(|scope| {
        scope.spawn(|| {
            while !done.load(Ordering::SeqCst) {
                write_report(&exchange, io::sink()).unwrap();
                let _ = exchange.transaction_history();
            }
        });
        scope.spawn(|| {
            let mut rate = dec!(0.90);
            while !done.load(Ordering::SeqCst) {
                exchange
                    .set_exchange_rate(Currency::Usd, Currency::Eur, rate)
                    .unwrap();
                rate = if rate > dec!(0.95) { dec!(0.90) } else { rate + dec!(0.01) };
                let _ = exchange.all_rates();
            }
        });

        let traders: Vec<_> = (0..6)
            .map(|i| {
                let exchange = &exchange;
                let participants = &participants;
                scope.spawn(move || {
                    for n in 0..300 {
                        let seller = &participants[(i + n) % participants.len()];
                        let buyer = &participants[(i + n + 1) % participants.len()];
                        if n % 2 == 0 {
                            peer_trade(exchange, buyer, seller, dec!(1));
                        } else {
                            let request = TransactionRequest::builder()
                                .seller(seller)
                                .from(Currency::Eur)
                                .to(Currency::Usd)
                                .amount(dec!(1))
                                .build()
                                .unwrap();
                            exchange.execute_transaction(&request);
                        }
                    }
                })
            })
            .collect();

        for trader in traders {
            trader.join().expect("Thread panicked");
        }
        done.store(true, Ordering::SeqCst);
    });

    stop_deadlock_detector(detector);

    assert_eq!(exchange.transaction_count(), 6 * 300);
}

/// Full trader runs with every attempt going peer-to-peer.
#[test]
fn no_deadlock_concurrent_traders() {
    let detector = start_deadlock_detector();
    let (exchange, participants) = setup(4);
    let config = TraderConfig {
        attempts: 50,
        backoff: Duration::from_millis(1),
        peer_ratio: 1.0,
        seed: Some(11),
    };

    let summaries: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = participants
            .iter()
            .map(|participant| {
                let trader = ParticipantTrader::new(
                    Arc::clone(participant),
                    Arc::clone(&exchange),
                    config.clone(),
                );
                scope.spawn(move || trader.run())
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("Thread panicked"))
            .collect()
    });

    stop_deadlock_detector(detector);

    assert!(summaries.iter().all(|summary| summary.attempts() == 50));
    assert!(participants.iter().all(|p| p.active_transactions() == 0));
}
