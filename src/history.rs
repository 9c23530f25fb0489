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

//! Append-only transaction history.
//!
//! Owns the transaction id sequence. Ids are issued and entries appended
//! under the same write lock, so history order and id order always agree.

use crate::base::TransactionId;
use crate::transaction::{Transaction, TransactionBuilder, TransactionStatus};
use parking_lot::RwLock;

#[derive(Debug)]
struct HistoryData {
    entries: Vec<Transaction>,
    /// Id handed to the next appended record.
    next_id: u64,
}

/// A thread-safe, append-only log of evaluated transactions.
///
/// Entries are never removed or reordered.
#[derive(Debug)]
pub struct TransactionHistory {
    inner: RwLock<HistoryData>,
}

/// Completed and rejected totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryCounts {
    pub completed: usize,
    pub rejected: usize,
}

impl TransactionHistory {
    /// Creates an empty history whose first id is 1.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HistoryData {
                entries: Vec::new(),
                next_id: 1,
            }),
        }
    }

    /// Builds `builder` with the next id and appends it.
    ///
    /// Returns a copy of the appended record.
    pub fn record(&self, builder: TransactionBuilder) -> Transaction {
        let mut data = self.inner.write();
        let transaction = builder.build(TransactionId(data.next_id));
        data.next_id += 1;
        data.entries.push(transaction.clone());
        transaction
    }

    /// Copy of every record in append order.
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.inner.read().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn counts(&self) -> HistoryCounts {
        let data = self.inner.read();
        data.entries
            .iter()
            .fold(HistoryCounts::default(), |mut counts, tx| {
                match tx.status() {
                    TransactionStatus::Completed => counts.completed += 1,
                    TransactionStatus::Rejected => counts.rejected += 1,
                    TransactionStatus::Pending => {}
                }
                counts
            })
    }
}

impl Default for TransactionHistory {
    fn default() -> Self {
        Self::new()
    }
}
