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

//! Tradeable currencies.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of currencies traded on the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Mnt,
    Usd,
    Eur,
}

impl Currency {
    /// Every currency, in ledger order.
    pub const ALL: [Currency; 3] = [Currency::Mnt, Currency::Usd, Currency::Eur];

    /// Number of supported currencies.
    pub const COUNT: usize = Self::ALL.len();

    /// ISO-style three letter code.
    pub fn code(self) -> &'static str {
        match self {
            Currency::Mnt => "MNT",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
        }
    }

    pub fn full_name(self) -> &'static str {
        match self {
            Currency::Mnt => "Mongolian Tugrik",
            Currency::Usd => "US Dollar",
            Currency::Eur => "Euro",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Currency::Mnt => "₮",
            Currency::Usd => "$",
            Currency::Eur => "€",
        }
    }

    /// Position of this currency in [`Currency::ALL`].
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
