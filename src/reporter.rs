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

//! Console reporting of participant balances and exchange rates.
//!
//! [`write_report`] renders one snapshot; [`BalanceReporter`] repeats it on a
//! background thread until its [`ReporterHandle`] is stopped or dropped.
//!
//! ```text
//! ===== Balances =====
//!   ID  Name          State          MNT          USD          EUR  Slots
//!    1  alice         TRADING    1000.00        50.00         0.00    1/2
//! ===== Rates =====
//!   EUR→MNT  3780.750000
//! ```

use crate::config::ReporterConfig;
use crate::currency::Currency;
use crate::exchange::Exchange;
use crossbeam::channel::{self, RecvTimeoutError, Sender};
use std::io::{self, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Writes a balance and rate table for the current state of `exchange`.
///
/// Each participant's amounts come from one ledger snapshot, but
/// participants are read one after another while trading continues.
pub fn write_report<W: Write>(exchange: &Exchange, mut out: W) -> io::Result<()> {
    writeln!(out, "===== Balances =====")?;
    write!(out, "{:>4}  {:<12} {:<9}", "ID", "Name", "State")?;
    for currency in Currency::ALL {
        write!(out, " {:>12}", currency.code())?;
    }
    writeln!(out, "  Slots")?;

    for participant in exchange.participants() {
        let holdings = participant.balance().snapshot();
        write!(
            out,
            "{:>4}  {:<12} {:<9}",
            participant.id(),
            participant.name(),
            participant.state().name()
        )?;
        for (_, amount) in holdings.iter() {
            write!(out, " {:>12.2}", amount)?;
        }
        writeln!(
            out,
            "  {:>2}/{}",
            participant.active_transactions(),
            participant.max_concurrent_transactions()
        )?;
    }

    writeln!(out, "===== Rates =====")?;
    for (pair, rate) in exchange.all_rates() {
        writeln!(out, "  {pair}  {rate:.6}")?;
    }
    out.flush()
}

/// Periodic reporter writing to stdout.
pub struct BalanceReporter {
    exchange: Arc<Exchange>,
    config: ReporterConfig,
}

impl BalanceReporter {
    pub fn new(exchange: Arc<Exchange>, config: ReporterConfig) -> Self {
        Self { exchange, config }
    }

    /// Starts the reporting thread.
    ///
    /// The first report is written one interval after spawning.
    pub fn spawn(self) -> io::Result<ReporterHandle> {
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);
        let thread = thread::Builder::new()
            .name("balance-reporter".into())
            .spawn(move || {
                debug!(interval_ms = self.config.interval.as_millis() as u64, "reporter started");
                loop {
                    match stop_rx.recv_timeout(self.config.interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            if let Err(e) = write_report(&self.exchange, io::stdout().lock()) {
                                warn!(error = %e, "failed to write balance report");
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("reporter stopped");
            })?;

        Ok(ReporterHandle {
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }
}

/// Owner of a running [`BalanceReporter`]. Dropping it stops the thread.
#[derive(Debug)]
pub struct ReporterHandle {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ReporterHandle {
    /// Signals the reporter and waits for its thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the sender disconnects the channel, which also ends the loop.
        if let Some(stop) = self.stop.take() {
            let _ = stop.try_send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("balance reporter thread panicked");
            }
        }
    }
}

impl Drop for ReporterHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
