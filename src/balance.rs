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

//! Per-participant currency ledger.
//!
//! A [`Balance`] holds one exact decimal amount per [`Currency`]. Every public
//! operation takes the ledger lock for its own duration only, so a check
//! followed by a mutation is two critical sections. The exchange closes that
//! gap by taking the write guard once per transaction (see
//! [`Balance::write`]).
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use currency_exchange_rs::{Balance, Currency};
//!
//! let balance = Balance::with_amounts([(Currency::Mnt, dec!(1000))]);
//! assert!(balance.has_at_least(Currency::Mnt, dec!(400)));
//! assert_eq!(balance.get(Currency::Usd), dec!(0));
//! ```

use crate::currency::Currency;
use parking_lot::{RwLock, RwLockWriteGuard};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

/// Amounts held in every currency.
///
/// Every currency always has an entry; a fresh value holds zero of each.
/// This is also the immutable snapshot type handed out by [`Balance::snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Holdings {
    amounts: [Decimal; Currency::COUNT],
}

impl Holdings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, currency: Currency) -> Decimal {
        self.amounts[currency.index()]
    }

    pub fn has_at_least(&self, currency: Currency, amount: Decimal) -> bool {
        self.get(currency) >= amount
    }

    /// Iterates over `(currency, amount)` pairs in [`Currency::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (Currency, Decimal)> + '_ {
        Currency::ALL.iter().map(|&currency| (currency, self.get(currency)))
    }

    pub(crate) fn add(&mut self, currency: Currency, delta: Decimal) {
        self.amounts[currency.index()] += delta;
    }

    /// Decreases the amount held. Sufficiency is the caller's responsibility.
    pub(crate) fn subtract(&mut self, currency: Currency, delta: Decimal) {
        self.amounts[currency.index()] -= delta;
        self.assert_invariants();
    }

    pub(crate) fn set(&mut self, currency: Currency, amount: Decimal) {
        self.amounts[currency.index()] = amount;
    }

    /// Amounts after giving up `paid` of `from` and receiving `received` of
    /// `to`, or `None` if either leg overflows. `self` is left unchanged.
    pub(crate) fn after_conversion(
        &self,
        from: Currency,
        paid: Decimal,
        to: Currency,
        received: Decimal,
    ) -> Option<Holdings> {
        let mut next = *self;
        next.amounts[from.index()] = next.get(from).checked_sub(paid)?;
        next.amounts[to.index()] = next.get(to).checked_add(received)?;
        next.assert_invariants();
        Some(next)
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.amounts.iter().all(|amount| *amount >= Decimal::ZERO),
            "Invariant violated: ledger amount went negative: {:?}",
            self.amounts
        );
    }
}

impl FromIterator<(Currency, Decimal)> for Holdings {
    fn from_iter<I: IntoIterator<Item = (Currency, Decimal)>>(iter: I) -> Self {
        let mut holdings = Holdings::new();
        for (currency, amount) in iter {
            holdings.set(currency, amount);
        }
        holdings
    }
}

impl Serialize for Holdings {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(Currency::COUNT))?;
        for (currency, amount) in self.iter() {
            map.serialize_entry(currency.code(), &amount)?;
        }
        map.end()
    }
}

/// Thread-safe ledger owned by a single participant.
#[derive(Debug, Default)]
pub struct Balance {
    inner: RwLock<Holdings>,
}

impl Balance {
    /// Display precision used by [`fmt::Display`].
    const DISPLAY_PRECISION: u32 = 2;

    /// Creates a ledger holding zero of every currency.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a ledger with the given opening amounts.
    ///
    /// Currencies not mentioned start at zero.
    pub fn with_amounts<I>(amounts: I) -> Self
    where
        I: IntoIterator<Item = (Currency, Decimal)>,
    {
        Self {
            inner: RwLock::new(amounts.into_iter().collect()),
        }
    }

    pub fn get(&self, currency: Currency) -> Decimal {
        self.inner.read().get(currency)
    }

    /// Returns `true` if at least `amount` of `currency` is held.
    pub fn has_at_least(&self, currency: Currency, amount: Decimal) -> bool {
        self.inner.read().has_at_least(currency, amount)
    }

    pub fn add(&self, currency: Currency, delta: Decimal) {
        self.inner.write().add(currency, delta);
    }

    /// Decreases the amount held without checking sufficiency.
    ///
    /// Callers must verify with [`Balance::has_at_least`] first, or hold
    /// [`Balance::write`] across the check and the subtraction.
    pub fn subtract(&self, currency: Currency, delta: Decimal) {
        self.inner.write().subtract(currency, delta);
    }

    pub fn set(&self, currency: Currency, amount: Decimal) {
        self.inner.write().set(currency, amount);
    }

    /// Returns a copy of all amounts taken under a single read lock.
    pub fn snapshot(&self) -> Holdings {
        *self.inner.read()
    }

    /// Exclusive access spanning several reads and mutations.
    ///
    /// Used by the exchange to check and settle a trade in one critical
    /// section. Hold it only for short, non-blocking work.
    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Holdings> {
        self.inner.write()
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let holdings = self.snapshot();
        let mut first = true;
        for (currency, amount) in holdings.iter() {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            let rounded = amount.round_dp_with_strategy(
                Self::DISPLAY_PRECISION,
                RoundingStrategy::MidpointAwayFromZero,
            );
            write!(
                f,
                "{}{}: {:.prec$}",
                currency.symbol(),
                currency.code(),
                rounded,
                prec = Self::DISPLAY_PRECISION as usize
            )?;
        }
        Ok(())
    }
}
