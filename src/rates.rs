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

//! Exchange rate table.
//!
//! Rates are keyed by ordered [`CurrencyPair`]. When only one direction of a
//! pair is recorded the other is derived as its reciprocal, rounded to
//! [`RateTable::DERIVED_PRECISION`] places. A pair with no recorded direction
//! has a rate of zero, meaning "not tradeable".

use crate::config::ExchangeConfig;
use crate::currency::Currency;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Ordered currency pair: the price of one `from` in units of `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub struct CurrencyPair {
    pub from: Currency,
    pub to: Currency,
}

impl CurrencyPair {
    pub fn new(from: Currency, to: Currency) -> Self {
        Self { from, to }
    }

    pub fn inverse(self) -> Self {
        Self {
            from: self.to,
            to: self.from,
        }
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}→{}", self.from, self.to)
    }
}

/// Mutable rate storage. Not synchronized; the exchange wraps it in a lock.
#[derive(Debug, Clone, Default)]
pub struct RateTable {
    rates: HashMap<CurrencyPair, Decimal>,
}

impl RateTable {
    /// Decimal places kept for derived rates and drift steps.
    pub const DERIVED_PRECISION: u32 = 6;

    pub fn new() -> Self {
        Self::default()
    }

    /// Opening rates: USD→MNT 3450.50, EUR→MNT 3780.75, USD→EUR 0.91.
    pub fn with_default_rates() -> Self {
        let mut table = Self::new();
        table.set(Currency::Usd, Currency::Mnt, dec!(3450.50));
        table.set(Currency::Eur, Currency::Mnt, dec!(3780.75));
        table.set(Currency::Usd, Currency::Eur, dec!(0.91));
        table
    }

    /// Rate to convert `from` into `to`.
    ///
    /// Identical currencies convert at one. Falls back to the reciprocal of
    /// the inverse pair, and to zero if neither direction is known.
    pub fn get(&self, from: Currency, to: Currency) -> Decimal {
        if from == to {
            return Decimal::ONE;
        }

        let pair = CurrencyPair::new(from, to);
        if let Some(rate) = self.rates.get(&pair) {
            return *rate;
        }

        self.rates
            .get(&pair.inverse())
            .and_then(|inverse| Decimal::ONE.checked_div(*inverse))
            .map(|rate| {
                rate.round_dp_with_strategy(
                    Self::DERIVED_PRECISION,
                    RoundingStrategy::MidpointAwayFromZero,
                )
            })
            .unwrap_or(Decimal::ZERO)
    }

    /// Returns `true` if the rate was stored directly rather than derived.
    pub fn contains(&self, from: Currency, to: Currency) -> bool {
        self.rates.contains_key(&CurrencyPair::new(from, to))
    }

    pub fn set(&mut self, from: Currency, to: Currency, rate: Decimal) {
        self.rates.insert(CurrencyPair::new(from, to), rate);
    }

    /// Nudges the `from → to` rate by the market impact of a completed trade
    /// of `amount` units.
    ///
    /// The step is `amount × volatility / scaling`, rounded half-up to
    /// [`RateTable::DERIVED_PRECISION`] places. The result is stored under the
    /// ordered pair. Nothing changes when the step rounds to zero, when the
    /// pair has no rate, or when the result would not be positive. Returns the
    /// new rate if one was stored.
    pub fn drift(
        &mut self,
        from: Currency,
        to: Currency,
        amount: Decimal,
        config: &ExchangeConfig,
    ) -> Option<Decimal> {
        if from == to {
            return None;
        }

        let current = self.get(from, to);
        if current <= Decimal::ZERO {
            return None;
        }

        let step = amount
            .checked_mul(config.volatility)?
            .checked_div(config.scaling)?
            .round_dp_with_strategy(
                Self::DERIVED_PRECISION,
                RoundingStrategy::MidpointAwayFromZero,
            );
        if step.is_zero() {
            return None;
        }

        let updated = current.checked_add(step)?;
        if updated <= Decimal::ZERO {
            return None;
        }

        self.set(from, to, updated);
        Some(updated)
    }

    /// Recorded rates in pair order.
    pub fn snapshot(&self) -> BTreeMap<CurrencyPair, Decimal> {
        self.rates.iter().map(|(pair, rate)| (*pair, *rate)).collect()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}
