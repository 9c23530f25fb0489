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

//! Central exchange engine.
//!
//! The [`Exchange`] owns the rate table, the participant registry and the
//! transaction history, and is the only place balances change hands.
//!
//! # Transaction Processing
//!
//! - **With the exchange** (no buyer): the seller converts `amount` of the
//!   source currency at the current exchange rate.
//! - **Peer-to-peer** (buyer present): seller and buyer swap `amount` of the
//!   source currency against `amount × rate` of the target currency, at the
//!   rate fixed on the request.
//!
//! Every evaluated request appends exactly one record to the history, either
//! Completed or Rejected. Completed trades nudge the pair's rate. All
//! post-trade balances are computed before any is written, so a trade that
//! would overflow a balance is rejected with nothing applied.
//!
//! # Thread Safety
//!
//! The sufficiency check and the balance mutation happen under one ledger
//! write lock per participant, held together for the whole settlement. Peer
//! trades lock the two ledgers in ascending participant id order, so two
//! opposing trades between the same pair cannot deadlock. The rate table and
//! the history each have their own lock, taken after the ledgers are released.

use crate::balance::Holdings;
use crate::base::ParticipantId;
use crate::config::ExchangeConfig;
use crate::currency::Currency;
use crate::error::ExchangeError;
use crate::history::{HistoryCounts, TransactionHistory};
use crate::participant::Participant;
use crate::rates::{CurrencyPair, RateTable};
use crate::transaction::{RejectReason, Transaction, TransactionBuilder, TransactionRequest};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::{RwLock, RwLockWriteGuard};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of settling one request against the ledgers.
struct Settlement {
    rate: Decimal,
    result: Result<(), RejectReason>,
}

impl Settlement {
    fn completed(rate: Decimal) -> Self {
        Self {
            rate,
            result: Ok(()),
        }
    }

    fn rejected(rate: Decimal, reason: RejectReason) -> Self {
        Self {
            rate,
            result: Err(reason),
        }
    }
}

/// Currency exchange shared by every participant.
///
/// Construct one per run and share it behind an [`Arc`].
///
/// # Invariants
///
/// - No ledger amount is ever driven negative by a settlement.
/// - A Completed peer-to-peer trade conserves the combined holdings of each
///   currency across buyer and seller.
/// - History only grows, in transaction id order.
#[derive(Debug)]
pub struct Exchange {
    config: ExchangeConfig,
    rates: RwLock<RateTable>,
    /// Registered participants indexed by id.
    participants: DashMap<ParticipantId, Arc<Participant>>,
    history: TransactionHistory,
}

impl Exchange {
    /// Creates an exchange with no rates and no participants.
    pub fn new(config: ExchangeConfig) -> Self {
        Self::with_rates(config, RateTable::new())
    }

    pub fn with_rates(config: ExchangeConfig, rates: RateTable) -> Self {
        info!(rates = rates.len(), "exchange initialized");
        Exchange {
            config,
            rates: RwLock::new(rates),
            participants: DashMap::new(),
            history: TransactionHistory::new(),
        }
    }

    /// Default configuration and the opening rates of
    /// [`RateTable::with_default_rates`].
    pub fn with_default_rates() -> Self {
        Self::with_rates(ExchangeConfig::default(), RateTable::with_default_rates())
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    // === Participants ===

    /// Adds a participant to the registry.
    ///
    /// # Errors
    ///
    /// [`ExchangeError::DuplicateParticipant`] if the id is already taken.
    pub fn register_participant(&self, participant: Arc<Participant>) -> Result<(), ExchangeError> {
        let id = participant.id();
        match self.participants.entry(id) {
            Entry::Occupied(_) => Err(ExchangeError::DuplicateParticipant(id)),
            Entry::Vacant(entry) => {
                info!(participant = %participant.name(), %id, "participant registered");
                entry.insert(participant);
                Ok(())
            }
        }
    }

    /// Registered participants ordered by id.
    pub fn participants(&self) -> Vec<Arc<Participant>> {
        let mut participants: Vec<_> = self
            .participants
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        participants.sort_by_key(|participant| participant.id());
        participants
    }

    pub fn participant(&self, id: ParticipantId) -> Option<Arc<Participant>> {
        self.participants.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    // === Rates ===

    /// Current rate for converting `from` into `to`. Zero means the pair is
    /// not tradeable.
    pub fn get_exchange_rate(&self, from: Currency, to: Currency) -> Decimal {
        self.rates.read().get(from, to)
    }

    /// Records a rate for the ordered pair.
    ///
    /// # Errors
    ///
    /// [`ExchangeError::InvalidRate`] if `rate` is not positive or `from`
    /// equals `to`.
    pub fn set_exchange_rate(
        &self,
        from: Currency,
        to: Currency,
        rate: Decimal,
    ) -> Result<(), ExchangeError> {
        if rate <= Decimal::ZERO || from == to {
            return Err(ExchangeError::InvalidRate {
                pair: CurrencyPair::new(from, to),
                rate,
            });
        }
        self.rates.write().set(from, to, rate);
        debug!(%from, %to, %rate, "rate set");
        Ok(())
    }

    /// Every recorded rate, ordered by pair.
    pub fn all_rates(&self) -> BTreeMap<CurrencyPair, Decimal> {
        self.rates.read().snapshot()
    }

    // === Transactions ===

    /// Evaluates `request` and records the outcome.
    ///
    /// Returns `true` if the trade completed, `false` if it was rejected.
    /// Rejection is a normal outcome and is recorded in the history as well.
    pub fn execute_transaction(&self, request: &TransactionRequest<'_>) -> bool {
        self.submit(request).is_completed()
    }

    /// Evaluates `request`, records the outcome and returns the record.
    ///
    /// | Mode | Requirement | Effect on success |
    /// |------|-------------|-------------------|
    /// | With exchange | seller holds `amount` of `from` | seller: `-amount from`, `+amount × rate to` |
    /// | Peer-to-peer | seller holds `amount` of `from`, buyer holds `amount × rate` of `to` | seller: `-from +to`, buyer: `-to +from` |
    pub fn submit(&self, request: &TransactionRequest<'_>) -> Transaction {
        let settlement = match request.buyer() {
            None => self.settle_with_exchange(request),
            Some(buyer) => self.settle_peer_to_peer(buyer, request),
        };

        let builder = TransactionBuilder::from_request(request, settlement.rate);
        let builder = match settlement.result {
            Ok(()) => {
                self.apply_drift(request.from(), request.to(), request.amount());
                builder.completed()
            }
            Err(reason) => builder.rejected(reason),
        };

        let transaction = self.history.record(builder);
        match transaction.reason() {
            None => debug!(
                id = %transaction.id(),
                seller = %request.seller().name(),
                from = %transaction.from(),
                to = %transaction.to(),
                amount = %transaction.amount(),
                rate = %transaction.rate(),
                "transaction completed"
            ),
            Some(reason) => debug!(
                id = %transaction.id(),
                seller = %request.seller().name(),
                %reason,
                "transaction rejected"
            ),
        }
        transaction
    }

    /// Copy of the history in append order.
    pub fn transaction_history(&self) -> Vec<Transaction> {
        self.history.snapshot()
    }

    pub fn transaction_count(&self) -> usize {
        self.history.len()
    }

    pub fn transaction_counts(&self) -> HistoryCounts {
        self.history.counts()
    }

    fn settle_with_exchange(&self, request: &TransactionRequest<'_>) -> Settlement {
        let seller = request.seller();
        let (from, to, amount) = (request.from(), request.to(), request.amount());

        let rate = self.get_exchange_rate(from, to);
        if rate <= Decimal::ZERO {
            return Settlement::rejected(rate, RejectReason::UntradeablePair);
        }
        let Some(converted) = amount.checked_mul(rate) else {
            return Settlement::rejected(rate, RejectReason::Overflow);
        };

        let mut ledger = seller.balance().write();
        if let Err(reason) = require(&ledger, seller.id(), from, amount) {
            return Settlement::rejected(rate, reason);
        }
        let Some(settled) = ledger.after_conversion(from, amount, to, converted) else {
            return Settlement::rejected(rate, RejectReason::Overflow);
        };
        *ledger = settled;

        Settlement::completed(rate)
    }

    fn settle_peer_to_peer(
        &self,
        buyer: &Participant,
        request: &TransactionRequest<'_>,
    ) -> Settlement {
        let seller = request.seller();
        let (from, to, amount) = (request.from(), request.to(), request.amount());

        let rate = request
            .rate()
            .unwrap_or_else(|| self.get_exchange_rate(from, to));
        if rate <= Decimal::ZERO {
            return Settlement::rejected(rate, RejectReason::UntradeablePair);
        }
        let Some(converted) = amount.checked_mul(rate) else {
            return Settlement::rejected(rate, RejectReason::Overflow);
        };

        let (mut buyer_ledger, mut seller_ledger) = lock_in_order(buyer, seller);
        if let Err(reason) = require(&buyer_ledger, buyer.id(), to, converted)
            .and_then(|()| require(&seller_ledger, seller.id(), from, amount))
        {
            return Settlement::rejected(rate, reason);
        }

        let seller_after = seller_ledger.after_conversion(from, amount, to, converted);
        let buyer_after = buyer_ledger.after_conversion(to, converted, from, amount);
        let (Some(seller_after), Some(buyer_after)) = (seller_after, buyer_after) else {
            return Settlement::rejected(rate, RejectReason::Overflow);
        };
        *seller_ledger = seller_after;
        *buyer_ledger = buyer_after;

        Settlement::completed(rate)
    }

    fn apply_drift(&self, from: Currency, to: Currency, amount: Decimal) {
        if let Some(updated) = self.rates.write().drift(from, to, amount, &self.config) {
            debug!(%from, %to, rate = %updated, "rate drifted");
        }
    }
}

impl Default for Exchange {
    fn default() -> Self {
        Self::with_default_rates()
    }
}

/// Checks that `holdings` cover `required` of `currency`.
fn require(
    holdings: &Holdings,
    participant: ParticipantId,
    currency: Currency,
    required: Decimal,
) -> Result<(), RejectReason> {
    if holdings.has_at_least(currency, required) {
        Ok(())
    } else {
        Err(RejectReason::InsufficientFunds {
            participant,
            currency,
            required,
            available: holdings.get(currency),
        })
    }
}

/// Write-locks both ledgers, lower participant id first.
///
/// Returns the guards as `(buyer, seller)`. Participants sharing an id are
/// ordered by address.
fn lock_in_order<'a>(
    buyer: &'a Participant,
    seller: &'a Participant,
) -> (RwLockWriteGuard<'a, Holdings>, RwLockWriteGuard<'a, Holdings>) {
    let key = |participant: &Participant| {
        (
            participant.id(),
            participant as *const Participant as usize,
        )
    };

    if key(buyer) < key(seller) {
        let buyer_ledger = buyer.balance().write();
        let seller_ledger = seller.balance().write();
        (buyer_ledger, seller_ledger)
    } else {
        let seller_ledger = seller.balance().write();
        let buyer_ledger = buyer.balance().write();
        (buyer_ledger, seller_ledger)
    }
}
