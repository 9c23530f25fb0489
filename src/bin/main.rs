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

use anyhow::{Context, bail};
use clap::Parser;
use csv::Writer;
use currency_exchange_rs::loader::load_participants_from_path;
use currency_exchange_rs::reporter::write_report;
use currency_exchange_rs::{
    BalanceReporter, Exchange, Participant, ParticipantTrader, ReporterConfig, TraderConfig,
    TradingSummary,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Currency Exchange - Simulate concurrent currency trading
///
/// Loads participants from a file, lets each of them trade concurrently
/// against the exchange and against each other, reports balances
/// periodically and writes the final balances as CSV to stdout.
#[derive(Parser, Debug)]
#[command(name = "currency-exchange")]
#[command(about = "A concurrent multi-party currency exchange simulation", long_about = None)]
struct Args {
    /// Path to the participants file
    ///
    /// One participant per line: name;mnt;usd;eur;max_concurrent
    /// Lines starting with '#' are ignored.
    #[arg(value_name = "FILE", default_value = "data/participants.txt")]
    participants: PathBuf,

    /// Transaction attempts per participant
    #[arg(long, env = "EXCHANGE_TRANSACTIONS", default_value_t = 10)]
    transactions: usize,

    /// Milliseconds between balance reports
    #[arg(long, env = "EXCHANGE_REPORT_INTERVAL_MS", default_value_t = 3000)]
    report_interval_ms: u64,

    /// Milliseconds a trader waits before retrying for a free slot
    #[arg(long, env = "EXCHANGE_BACKOFF_MS", default_value_t = 100)]
    backoff_ms: u64,

    /// Share of attempts traded directly with another participant, in [0, 1]
    #[arg(long, env = "EXCHANGE_PEER_RATIO", default_value_t = 0.25)]
    peer_ratio: f64,

    /// Seed for reproducible runs
    #[arg(long, env = "EXCHANGE_SEED")]
    seed: Option<u64>,
}

impl Args {
    fn trader_config(&self) -> TraderConfig {
        TraderConfig {
            attempts: self.transactions,
            backoff: Duration::from_millis(self.backoff_ms),
            peer_ratio: self.peer_ratio,
            seed: self.seed,
        }
    }

    fn reporter_config(&self) -> ReporterConfig {
        ReporterConfig {
            interval: Duration::from_millis(self.report_interval_ms),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout carries only reports and the final CSV.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,currency_exchange_rs=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_thread_names(true)
        .init();

    let participants = load_participants_from_path(&args.participants).with_context(|| {
        format!(
            "failed to load participants from '{}'",
            args.participants.display()
        )
    })?;
    if participants.is_empty() {
        bail!(
            "no participants loaded from '{}'",
            args.participants.display()
        );
    }

    let exchange = Arc::new(Exchange::with_default_rates());
    let participants = register_all(&exchange, participants)?;

    let reporter = BalanceReporter::new(Arc::clone(&exchange), args.reporter_config())
        .spawn()
        .context("failed to start balance reporter")?;

    let summaries = run_traders(&exchange, &participants, &args.trader_config());
    reporter.stop();

    write_report(&exchange, io::stdout().lock()).context("failed to write final report")?;

    let counts = exchange.transaction_counts();
    info!(
        total = exchange.transaction_count(),
        completed = counts.completed,
        rejected = counts.rejected,
        traders = summaries.len(),
        "all participants completed trading"
    );

    write_balances(&exchange, io::stdout()).context("failed to write final balances")?;
    Ok(())
}

/// Registers every loaded participant and returns the shared handles.
fn register_all(
    exchange: &Exchange,
    participants: Vec<Participant>,
) -> anyhow::Result<Vec<Arc<Participant>>> {
    participants
        .into_iter()
        .map(|participant| -> anyhow::Result<Arc<Participant>> {
            let participant = Arc::new(participant);
            exchange.register_participant(Arc::clone(&participant))?;
            Ok(participant)
        })
        .collect()
}

/// Runs one trader per participant and waits for all of them.
///
/// A trader that panics is logged and left out of the returned summaries.
fn run_traders(
    exchange: &Arc<Exchange>,
    participants: &[Arc<Participant>],
    config: &TraderConfig,
) -> Vec<TradingSummary> {
    thread::scope(|scope| {
        let handles: Vec<_> = participants
            .iter()
            .map(|participant| {
                let trader = ParticipantTrader::new(
                    Arc::clone(participant),
                    Arc::clone(exchange),
                    config.clone(),
                );
                (participant.name(), scope.spawn(move || trader.run()))
            })
            .collect();

        handles
            .into_iter()
            .filter_map(|(name, handle)| match handle.join() {
                Ok(summary) => Some(summary),
                Err(_) => {
                    error!(participant = %name, "trader panicked");
                    None
                }
            })
            .collect()
    })
}

/// Write final participant balances to a CSV writer
///
/// Outputs one row per participant, ordered by id, with amounts rounded to 4 decimal places.
///
/// # CSV Format
///
/// Columns: `id, name, state, mnt, usd, eur, max_concurrent`
///
/// # Example
///
/// ```csv
/// id,name,state,mnt,usd,eur,max_concurrent
/// 1,alice,COMPLETED,600,0.116,1,2
/// ```
///
/// # Errors
///
/// Returns a CSV error if writing fails.
fn write_balances<W: Write>(exchange: &Exchange, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for participant in exchange.participants() {
        wtr.serialize(participant.as_ref())?;
    }

    wtr.flush()?;
    Ok(())
}
