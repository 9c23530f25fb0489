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

//! Runtime configuration for the exchange, the trading driver and the reporter.
//!
//! The binary fills these from command-line arguments; library users and
//! tests construct them directly or start from [`Default`].

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;

/// Exchange engine parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeConfig {
    /// Market impact per traded unit, before scaling.
    pub volatility: Decimal,
    /// Divisor applied to `amount × volatility`. Must be non-zero.
    pub scaling: Decimal,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            volatility: dec!(0.00001),
            scaling: dec!(10000),
        }
    }
}

/// Per-participant trading driver parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TraderConfig {
    /// Transaction attempts each participant makes before completing.
    pub attempts: usize,
    /// Pause between slot acquisition retries.
    pub backoff: Duration,
    /// Probability in `[0, 1]` that an attempt trades with another
    /// participant instead of the exchange.
    pub peer_ratio: f64,
    /// Seed for reproducible trade selection. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for TraderConfig {
    fn default() -> Self {
        Self {
            attempts: 10,
            backoff: Duration::from_millis(100),
            peer_ratio: 0.25,
            seed: None,
        }
    }
}

/// Periodic balance reporter parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReporterConfig {
    pub interval: Duration,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(3000),
        }
    }
}
