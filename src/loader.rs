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

//! Participant file loading.
//!
//! # Format
//!
//! One participant per line, semicolon separated:
//!
//! ```text
//! # name;MNT;USD;EUR;max_concurrent_transactions
//! Alice;1000000;500;300;3
//! Bob;250000;1200;0;2
//! ```
//!
//! Blank lines and lines starting with `#` are ignored. Lines that do not
//! parse, or parse to unusable values, are skipped with a warning. Ids are
//! assigned from 1 in file order among the accepted lines.

use crate::balance::Balance;
use crate::base::ParticipantId;
use crate::currency::Currency;
use crate::error::LoadError;
use crate::participant::Participant;
use csv::{ReaderBuilder, StringRecord, Trim};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{info, warn};

/// Raw participant line.
///
/// Fields: `name; mnt; usd; eur; max_concurrent`
#[derive(Debug, Deserialize)]
struct ParticipantRecord {
    name: String,
    mnt: Decimal,
    usd: Decimal,
    eur: Decimal,
    max_concurrent: usize,
}

impl ParticipantRecord {
    fn parse(record: &StringRecord, line: u64) -> Result<Self, LoadError> {
        let parsed: ParticipantRecord =
            record
                .deserialize(None)
                .map_err(|e| LoadError::InvalidParticipant {
                    line,
                    reason: e.to_string(),
                })?;

        let invalid = |reason: &str| LoadError::InvalidParticipant {
            line,
            reason: reason.to_string(),
        };
        if parsed.name.is_empty() {
            return Err(invalid("empty name"));
        }
        if [parsed.mnt, parsed.usd, parsed.eur]
            .iter()
            .any(|amount| *amount < Decimal::ZERO)
        {
            return Err(invalid("negative balance"));
        }
        if parsed.max_concurrent == 0 {
            return Err(invalid("max concurrent transactions must be at least 1"));
        }
        Ok(parsed)
    }

    fn into_participant(self, id: ParticipantId) -> Participant {
        let balance = Balance::with_amounts([
            (Currency::Mnt, self.mnt),
            (Currency::Usd, self.usd),
            (Currency::Eur, self.eur),
        ]);
        Participant::new(id, self.name, balance, self.max_concurrent)
    }
}

/// Reads participants from `reader`.
///
/// # Errors
///
/// Returns [`LoadError::Csv`] if the underlying reader fails. Individual bad
/// lines are logged and skipped, never returned.
pub fn load_participants<R: Read>(reader: R) -> Result<Vec<Participant>, LoadError> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b';')
        .comment(Some(b'#'))
        .trim(Trim::All)
        .flexible(true) // Short lines are reported per line, not as a reader error
        .has_headers(false)
        .from_reader(reader);

    let mut participants = Vec::new();
    for result in rdr.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(LoadError::Csv(e)),
            Err(e) => {
                warn!(error = %e, "skipping malformed participant line");
                continue;
            }
        };

        let line = record.position().map_or(0, |position| position.line());
        match ParticipantRecord::parse(&record, line) {
            Ok(parsed) => {
                let id = ParticipantId(participants.len() as u32 + 1);
                let participant = parsed.into_participant(id);
                info!(participant = %participant.name(), %id, "participant loaded");
                participants.push(participant);
            }
            Err(e) => warn!(error = %e, "skipping participant line"),
        }
    }

    Ok(participants)
}

/// Opens `path` and reads participants from it.
///
/// # Errors
///
/// [`LoadError::Io`] if the file cannot be opened, otherwise as
/// [`load_participants`].
pub fn load_participants_from_path(path: &Path) -> Result<Vec<Participant>, LoadError> {
    let file = File::open(path)?;
    let participants = load_participants(BufReader::new(file))?;
    info!(
        count = participants.len(),
        path = %path.display(),
        "participants loaded"
    );
    Ok(participants)
}
