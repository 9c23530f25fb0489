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

//! # Currency Exchange
//!
//! A concurrent multi-party currency exchange. Participants hold balances in
//! MNT, USD and EUR and trade either against the exchange at its current rate
//! or directly with each other at an agreed rate, while exchange rates drift
//! with traded volume.
//!
//! ## Core Components
//!
//! - [`Exchange`]: Settles trades, owns the rate table, the participant
//!   registry and the append-only transaction history
//! - [`Participant`]: Trader with a thread-safe [`Balance`], a lifecycle
//!   [`ParticipantState`] and a concurrent-transaction throttle
//! - [`TransactionRequest`]: Validated trade request built with
//!   [`TransactionRequest::builder`]
//! - [`Transaction`]: Immutable record of an attempt, completed or rejected
//! - [`ParticipantTrader`] and [`BalanceReporter`]: Driver and console
//!   reporter used by the `currency-exchange` binary
//!
//! ## Example
//!
//! ```
//! use currency_exchange_rs::{
//!     Balance, Currency, Exchange, Participant, ParticipantId, TransactionRequest,
//! };
//! use rust_decimal_macros::dec;
//! use std::sync::Arc;
//!
//! let exchange = Exchange::with_default_rates();
//! let alice = Arc::new(Participant::new(
//!     ParticipantId(1),
//!     "alice",
//!     Balance::with_amounts([(Currency::Usd, dec!(100))]),
//!     2,
//! ));
//! exchange.register_participant(Arc::clone(&alice)).unwrap();
//!
//! // Sell 10 USD to the exchange for MNT
//! let request = TransactionRequest::builder()
//!     .seller(&alice)
//!     .from(Currency::Usd)
//!     .to(Currency::Mnt)
//!     .amount(dec!(10))
//!     .build()
//!     .unwrap();
//! assert!(exchange.execute_transaction(&request));
//!
//! assert_eq!(alice.balance().get(Currency::Usd), dec!(90));
//! assert_eq!(alice.balance().get(Currency::Mnt), dec!(34505.00));
//! ```
//!
//! ## Thread Safety
//!
//! Every participant's balance sits behind its own lock. A trade checks and
//! mutates the balances it touches inside one critical section, taking the
//! locks in a fixed global order, so concurrent trades never overdraw a
//! ledger and opposing peer-to-peer trades cannot deadlock.

mod balance;
mod base;
pub mod config;
mod currency;
pub mod error;
mod exchange;
mod history;
pub mod loader;
mod participant;
mod rates;
pub mod reporter;
mod state;
pub mod trader;
mod transaction;

pub use balance::{Balance, Holdings};
pub use base::{ParticipantId, TransactionId};
pub use config::{ExchangeConfig, ReporterConfig, TraderConfig};
pub use currency::Currency;
pub use error::{ExchangeError, LoadError, TransactionError};
pub use exchange::Exchange;
pub use history::{HistoryCounts, TransactionHistory};
pub use participant::{Participant, TransactionSlot};
pub use rates::{CurrencyPair, RateTable};
pub use reporter::{BalanceReporter, ReporterHandle};
pub use state::{ParticipantState, SlotCounters};
pub use trader::{ParticipantTrader, TradingSummary};
pub use transaction::{
    RejectReason, Transaction, TransactionBuilder, TransactionRequest, TransactionRequestBuilder,
    TransactionStatus,
};
