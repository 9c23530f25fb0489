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

//! Error types for request validation, participant registration and loading.
//!
//! A rejected trade is not an error: it is a normal outcome recorded in the
//! transaction history. These types cover requests that cannot be evaluated
//! at all and setup failures around the engine.

use crate::base::ParticipantId;
use crate::rates::CurrencyPair;
use rust_decimal::Decimal;
use thiserror::Error;

/// Transaction request validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    /// Seller (the initiating participant) was not provided
    #[error("missing seller")]
    MissingSeller,

    /// Source or target currency was not provided
    #[error("missing currency")]
    MissingCurrency,

    /// Amount field is missing
    #[error("missing amount")]
    MissingAmount,

    /// Amount is zero or negative
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// Rate is zero or negative
    #[error("invalid rate (must be positive)")]
    InvalidRate,

    /// Peer-to-peer trades must carry a rate
    #[error("missing rate for peer-to-peer trade")]
    MissingRate,

    /// Source and target currency are identical
    #[error("source and target currency are the same")]
    SameCurrency,

    /// Buyer and seller are the same participant
    #[error("participant cannot trade with itself")]
    SelfTrade,
}

/// Exchange registry errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    /// A participant with the same id is already registered
    #[error("participant {0} already registered")]
    DuplicateParticipant(ParticipantId),

    /// Rates must be positive and between two different currencies
    #[error("invalid rate {rate} for {pair}")]
    InvalidRate { pair: CurrencyPair, rate: Decimal },
}

/// Participant file loading errors.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The participant file could not be opened or read
    #[error("failed to read participants: {0}")]
    Io(#[from] std::io::Error),

    /// The underlying CSV reader failed
    #[error("failed to parse participants: {0}")]
    Csv(#[from] csv::Error),

    /// A line parsed but its values are not acceptable
    #[error("invalid participant on line {line}: {reason}")]
    InvalidParticipant { line: u64, reason: String },
}
