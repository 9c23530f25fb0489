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

//! Transaction requests and records.
//!
//! A [`TransactionRequest`] is what a participant hands to the exchange. The
//! exchange evaluates it and appends an immutable [`Transaction`] record with
//! the outcome:
//!
//! ```text
//! TransactionRequest ──execute──► Transaction (Completed)
//!                           └───► Transaction (Rejected, with RejectReason)
//! ```
//!
//! A request without a buyer trades directly against the exchange rate. A
//! request with a buyer is a peer-to-peer trade at the rate on the request.

use crate::base::{ParticipantId, TransactionId};
use crate::currency::Currency;
use crate::error::TransactionError;
use crate::participant::Participant;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Completed,
    Rejected,
}

/// Why the exchange rejected a request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    /// A participant held less than the trade required.
    InsufficientFunds {
        participant: ParticipantId,
        currency: Currency,
        required: Decimal,
        available: Decimal,
    },
    /// No rate is known for the pair.
    UntradeablePair,
    /// The converted amount, or a balance after settlement, does not fit in
    /// a decimal. Nothing is applied.
    Overflow,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::InsufficientFunds {
                participant,
                currency,
                required,
                available,
            } => write!(
                f,
                "participant {participant} holds {available} {currency}, needs {required}"
            ),
            RejectReason::UntradeablePair => f.write_str("no rate for currency pair"),
            RejectReason::Overflow => f.write_str("amount overflow"),
        }
    }
}

/// A validated request to exchange `amount` of `from` into `to`.
#[derive(Debug, Clone, Copy)]
pub struct TransactionRequest<'a> {
    buyer: Option<&'a Participant>,
    seller: &'a Participant,
    from: Currency,
    to: Currency,
    amount: Decimal,
    rate: Option<Decimal>,
}

impl<'a> TransactionRequest<'a> {
    pub fn builder() -> TransactionRequestBuilder<'a> {
        TransactionRequestBuilder::default()
    }

    /// Counter-party for a peer-to-peer trade; `None` trades with the exchange.
    pub fn buyer(&self) -> Option<&'a Participant> {
        self.buyer
    }

    /// Participant giving up `amount` of `from`.
    pub fn seller(&self) -> &'a Participant {
        self.seller
    }

    pub fn from(&self) -> Currency {
        self.from
    }

    pub fn to(&self) -> Currency {
        self.to
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Rate fixed on the request. Always present for peer-to-peer trades;
    /// ignored for trades with the exchange, which use the current rate.
    pub fn rate(&self) -> Option<Decimal> {
        self.rate
    }

    pub fn is_peer_to_peer(&self) -> bool {
        self.buyer.is_some()
    }
}

/// Builder for [`TransactionRequest`].
#[derive(Debug, Default)]
pub struct TransactionRequestBuilder<'a> {
    buyer: Option<&'a Participant>,
    seller: Option<&'a Participant>,
    from: Option<Currency>,
    to: Option<Currency>,
    amount: Option<Decimal>,
    rate: Option<Decimal>,
}

impl<'a> TransactionRequestBuilder<'a> {
    pub fn buyer(mut self, buyer: &'a Participant) -> Self {
        self.buyer = Some(buyer);
        self
    }

    pub fn seller(mut self, seller: &'a Participant) -> Self {
        self.seller = Some(seller);
        self
    }

    pub fn from(mut self, currency: Currency) -> Self {
        self.from = Some(currency);
        self
    }

    pub fn to(mut self, currency: Currency) -> Self {
        self.to = Some(currency);
        self
    }

    pub fn amount(mut self, amount: Decimal) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn rate(mut self, rate: Decimal) -> Self {
        self.rate = Some(rate);
        self
    }

    /// Validates and builds the request.
    ///
    /// # Errors
    ///
    /// - [`TransactionError::MissingSeller`] - No seller set.
    /// - [`TransactionError::MissingCurrency`] - Source or target missing.
    /// - [`TransactionError::MissingAmount`] / [`TransactionError::InvalidAmount`] -
    ///   Amount missing or not positive.
    /// - [`TransactionError::SameCurrency`] - Source equals target.
    /// - [`TransactionError::InvalidRate`] - Rate set but not positive.
    /// - [`TransactionError::MissingRate`] - Peer-to-peer request without rate.
    /// - [`TransactionError::SelfTrade`] - Buyer and seller are the same participant.
    pub fn build(self) -> Result<TransactionRequest<'a>, TransactionError> {
        let seller = self.seller.ok_or(TransactionError::MissingSeller)?;
        let (from, to) = self
            .from
            .zip(self.to)
            .ok_or(TransactionError::MissingCurrency)?;
        let amount = self.amount.ok_or(TransactionError::MissingAmount)?;

        if amount <= Decimal::ZERO {
            return Err(TransactionError::InvalidAmount);
        }
        if from == to {
            return Err(TransactionError::SameCurrency);
        }
        if self.rate.is_some_and(|rate| rate <= Decimal::ZERO) {
            return Err(TransactionError::InvalidRate);
        }
        if let Some(buyer) = self.buyer {
            if self.rate.is_none() {
                return Err(TransactionError::MissingRate);
            }
            if buyer.id() == seller.id() {
                return Err(TransactionError::SelfTrade);
            }
        }

        Ok(TransactionRequest {
            buyer: self.buyer,
            seller,
            from,
            to,
            amount,
            rate: self.rate,
        })
    }
}

/// Immutable record of one evaluated transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    id: TransactionId,
    buyer: Option<ParticipantId>,
    seller: ParticipantId,
    from: Currency,
    to: Currency,
    amount: Decimal,
    rate: Decimal,
    status: TransactionStatus,
    reason: Option<RejectReason>,
    timestamp: DateTime<Utc>,
}

impl Transaction {
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// `None` for trades against the exchange.
    pub fn buyer(&self) -> Option<ParticipantId> {
        self.buyer
    }

    pub fn seller(&self) -> ParticipantId {
        self.seller
    }

    pub fn from(&self) -> Currency {
        self.from
    }

    pub fn to(&self) -> Currency {
        self.to
    }

    /// Amount in the source currency.
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Rate applied (or that would have been applied, if rejected).
    pub fn rate(&self) -> Decimal {
        self.rate
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn reason(&self) -> Option<&RejectReason> {
        self.reason.as_ref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// `amount × rate`, in the target currency.
    ///
    /// `None` when the product does not fit in a [`Decimal`], which is the
    /// case for records rejected with [`RejectReason::Overflow`].
    pub fn converted_amount(&self) -> Option<Decimal> {
        self.amount.checked_mul(self.rate)
    }

    pub fn is_completed(&self) -> bool {
        self.status == TransactionStatus::Completed
    }

    pub fn is_peer_to_peer(&self) -> bool {
        self.buyer.is_some()
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let buyer = self
            .buyer
            .map_or_else(|| "exchange".to_string(), |id| id.to_string());
        write!(
            f,
            "#{} {}→{} {} {} @ {} seller={} buyer={} {:?}",
            self.id, self.from, self.to, self.amount, self.from, self.rate, self.seller, buyer,
            self.status
        )
    }
}

/// Builder for [`Transaction`] records.
///
/// The mandatory fields are taken up front. The id is supplied at
/// [`TransactionBuilder::build`] time by whoever owns the id sequence, and the
/// timestamp is taken then as well.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    buyer: Option<ParticipantId>,
    seller: ParticipantId,
    from: Currency,
    to: Currency,
    amount: Decimal,
    rate: Decimal,
    status: TransactionStatus,
    reason: Option<RejectReason>,
}

impl TransactionBuilder {
    /// Starts a [`TransactionStatus::Pending`] record for a trade with the
    /// exchange.
    pub fn new(
        seller: ParticipantId,
        from: Currency,
        to: Currency,
        amount: Decimal,
        rate: Decimal,
    ) -> Self {
        Self {
            buyer: None,
            seller,
            from,
            to,
            amount,
            rate,
            status: TransactionStatus::Pending,
            reason: None,
        }
    }

    /// Starts a pending record describing `request`, evaluated at `rate`.
    pub fn from_request(request: &TransactionRequest<'_>, rate: Decimal) -> Self {
        let builder = Self::new(
            request.seller().id(),
            request.from(),
            request.to(),
            request.amount(),
            rate,
        );
        match request.buyer() {
            Some(buyer) => builder.buyer(buyer.id()),
            None => builder,
        }
    }

    pub fn buyer(mut self, buyer: ParticipantId) -> Self {
        self.buyer = Some(buyer);
        self
    }

    pub fn completed(mut self) -> Self {
        self.status = TransactionStatus::Completed;
        self.reason = None;
        self
    }

    pub fn rejected(mut self, reason: RejectReason) -> Self {
        self.status = TransactionStatus::Rejected;
        self.reason = Some(reason);
        self
    }

    /// Builds the record, stamping it with `id` and the current time.
    pub fn build(self, id: TransactionId) -> Transaction {
        Transaction {
            id,
            buyer: self.buyer,
            seller: self.seller,
            from: self.from,
            to: self.to,
            amount: self.amount,
            rate: self.rate,
            status: self.status,
            reason: self.reason,
            timestamp: Utc::now(),
        }
    }
}
