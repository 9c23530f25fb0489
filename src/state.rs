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

//! Participant lifecycle.
//!
//! ```text
//!            slot acquired              active count back to 0
//!   Active ───────────────► Trading ─────────────────────────► Active
//!     │  ▲
//!     │  └──── slot free ──── Waiting
//!     └──── no free slot ───►    │
//!                                └── attempts exhausted ──► Completed (terminal)
//! ```
//!
//! A state is a plain value. It does not schedule anything; the driver calls
//! [`ParticipantState::next`] (through `Participant::handle`) before and after
//! each attempt and the state decides what follows from the current counters.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum ParticipantState {
    /// Ready to start a transaction.
    #[default]
    Active = 0,
    /// Every slot is taken; polling until one frees up.
    Waiting = 1,
    /// At least one transaction in flight.
    Trading = 2,
    /// All configured attempts are done. Terminal.
    Completed = 3,
}

/// Counters a state transition is decided on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotCounters {
    /// Transactions currently in flight.
    pub active: usize,
    /// Concurrent transaction cap.
    pub max: usize,
    /// Attempts the driver has not finished yet, including any in flight.
    pub remaining: usize,
}

impl SlotCounters {
    pub fn has_free_slot(&self) -> bool {
        self.active < self.max
    }

    /// No attempt left and nothing in flight.
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0 && self.active == 0
    }
}

impl ParticipantState {
    /// Human-facing status label.
    pub fn name(self) -> &'static str {
        match self {
            ParticipantState::Active => "ACTIVE",
            ParticipantState::Waiting => "WAITING",
            ParticipantState::Trading => "TRADING",
            ParticipantState::Completed => "COMPLETED",
        }
    }

    /// Only an active participant may initiate a new transaction.
    pub fn can_trade(self) -> bool {
        matches!(self, ParticipantState::Active)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ParticipantState::Completed)
    }

    /// Decides the state that follows `self` given the current counters.
    pub fn next(self, counters: SlotCounters) -> ParticipantState {
        use ParticipantState::*;

        match self {
            Completed => Completed,
            Active if counters.is_exhausted() => Completed,
            Active if !counters.has_free_slot() => Waiting,
            Active if counters.active > 0 => Trading,
            Active => Active,
            Waiting if counters.is_exhausted() => Completed,
            Waiting if counters.has_free_slot() => Active,
            Waiting => Waiting,
            Trading if counters.active > 0 => Trading,
            Trading if counters.remaining == 0 => Completed,
            Trading => Active,
        }
    }

    pub(crate) fn as_u8(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_u8(value: u8) -> ParticipantState {
        match value {
            0 => ParticipantState::Active,
            1 => ParticipantState::Waiting,
            2 => ParticipantState::Trading,
            _ => ParticipantState::Completed,
        }
    }
}

impl fmt::Display for ParticipantState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
