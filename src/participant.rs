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

//! Trading participants.
//!
//! A [`Participant`] owns its [`Balance`], a lifecycle [`ParticipantState`]
//! and a throttle capping how many transactions it may have in flight. The
//! throttle is a compare-and-swap loop on an atomic counter: acquisition never
//! blocks, and callers that fail are expected to back off and retry.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use currency_exchange_rs::{Balance, Currency, Participant, ParticipantId};
//!
//! let alice = Participant::new(
//!     ParticipantId(1),
//!     "alice",
//!     Balance::with_amounts([(Currency::Mnt, dec!(1000))]),
//!     2,
//! );
//!
//! let slot = alice.try_start_transaction().unwrap();
//! assert_eq!(alice.active_transactions(), 1);
//! drop(slot);
//! assert_eq!(alice.active_transactions(), 0);
//! ```

use crate::balance::Balance;
use crate::base::ParticipantId;
use crate::currency::Currency;
use crate::state::{ParticipantState, SlotCounters};
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use tracing::debug;

/// A trading participant.
#[derive(Debug)]
pub struct Participant {
    id: ParticipantId,
    name: String,
    balance: Balance,
    /// Current [`ParticipantState`], swapped as a whole (last writer wins).
    state: AtomicU8,
    /// Transactions in flight. Always within `0..=max_concurrent_transactions`.
    active_transactions: AtomicUsize,
    max_concurrent_transactions: usize,
}

impl Participant {
    const DECIMAL_PRECISION: u32 = 4;

    /// Creates a participant in the [`ParticipantState::Active`] state.
    ///
    /// A concurrency cap of zero is raised to one so the participant can
    /// trade at all.
    pub fn new(
        id: ParticipantId,
        name: impl Into<String>,
        balance: Balance,
        max_concurrent_transactions: usize,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            balance,
            state: AtomicU8::new(ParticipantState::Active.as_u8()),
            active_transactions: AtomicUsize::new(0),
            max_concurrent_transactions: max_concurrent_transactions.max(1),
        }
    }

    pub fn id(&self) -> ParticipantId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn balance(&self) -> &Balance {
        &self.balance
    }

    pub fn state(&self) -> ParticipantState {
        ParticipantState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: ParticipantState) {
        let previous = ParticipantState::from_u8(self.state.swap(state.as_u8(), Ordering::AcqRel));
        if previous != state {
            debug!(participant = %self.name, from = %previous, to = %state, "state transition");
        }
    }

    pub fn active_transactions(&self) -> usize {
        self.active_transactions.load(Ordering::Acquire)
    }

    pub fn max_concurrent_transactions(&self) -> usize {
        self.max_concurrent_transactions
    }

    /// Snapshot of the throttle counters, with `remaining` attempts supplied
    /// by the driver.
    pub fn counters(&self, remaining: usize) -> SlotCounters {
        SlotCounters {
            active: self.active_transactions(),
            max: self.max_concurrent_transactions,
            remaining,
        }
    }

    /// Re-evaluates the lifecycle state against the current counters and
    /// stores the result.
    pub fn handle(&self, remaining: usize) -> ParticipantState {
        let next = self.state().next(self.counters(remaining));
        self.set_state(next);
        next
    }

    /// Attempts to take a transaction slot without blocking.
    ///
    /// Returns `false` when every slot is in use. There is no fairness among
    /// competing callers.
    pub fn try_acquire_slot(&self) -> bool {
        let mut current = self.active_transactions.load(Ordering::Acquire);
        loop {
            if current >= self.max_concurrent_transactions {
                return false;
            }
            match self.active_transactions.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Gives back a slot taken with [`Participant::try_acquire_slot`].
    ///
    /// Never drives the counter below zero.
    pub fn release_slot(&self) {
        let released = self
            .active_transactions
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_sub(1)
            });
        debug_assert!(released.is_ok(), "released a slot that was never acquired");
    }

    /// Takes a slot and moves to [`ParticipantState::Trading`], or moves to
    /// [`ParticipantState::Waiting`] if none is free.
    ///
    /// A completed participant never gets a slot. The slot is released when
    /// the returned guard is dropped.
    pub fn try_start_transaction(&self) -> Option<TransactionSlot<'_>> {
        if self.state().is_terminal() {
            return None;
        }
        if self.try_acquire_slot() {
            self.set_state(ParticipantState::Trading);
            Some(TransactionSlot { participant: self })
        } else {
            self.set_state(ParticipantState::Waiting);
            None
        }
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (#{}, {}, {}/{} in flight)",
            self.name,
            self.id,
            self.state(),
            self.active_transactions(),
            self.max_concurrent_transactions
        )
    }
}

impl Serialize for Participant {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let holdings = self.balance.snapshot();
        let rounded = |currency: Currency| -> Decimal {
            holdings.get(currency).round_dp(Self::DECIMAL_PRECISION)
        };

        let mut state = serializer.serialize_struct("Participant", 7)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("state", &self.state())?;
        state.serialize_field("mnt", &rounded(Currency::Mnt))?;
        state.serialize_field("usd", &rounded(Currency::Usd))?;
        state.serialize_field("eur", &rounded(Currency::Eur))?;
        state.serialize_field("max_concurrent", &self.max_concurrent_transactions)?;
        state.end()
    }
}

/// An acquired transaction slot. Dropping it releases the slot.
#[derive(Debug)]
pub struct TransactionSlot<'a> {
    participant: &'a Participant,
}

impl TransactionSlot<'_> {
    pub fn participant(&self) -> &Participant {
        self.participant
    }
}

impl Drop for TransactionSlot<'_> {
    fn drop(&mut self) {
        self.participant.release_slot();
    }
}
