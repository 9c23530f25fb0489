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

//! Per-participant trading driver.
//!
//! A [`ParticipantTrader`] makes a fixed number of random transaction
//! attempts for one participant on a small pool of scoped worker threads.
//! The pool is larger than the participant's slot cap, so the throttle is
//! what bounds the number of trades in flight. A worker that cannot get a
//! slot marks the participant Waiting, sleeps for the configured backoff and
//! polls again.

use crate::config::TraderConfig;
use crate::currency::Currency;
use crate::exchange::Exchange;
use crate::participant::{Participant, TransactionSlot};
use crate::state::ParticipantState;
use crate::transaction::TransactionRequest;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use tracing::{debug, info, warn};

/// Result of one participant's trading run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradingSummary {
    pub participant: String,
    pub successful: usize,
    pub rejected: usize,
}

impl TradingSummary {
    pub fn attempts(&self) -> usize {
        self.successful + self.rejected
    }
}

impl fmt::Display for TradingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Participant {} completed: {} successful, {} rejected",
            self.participant, self.successful, self.rejected
        )
    }
}

/// Attempt bookkeeping shared by one run's workers.
#[derive(Debug)]
struct Progress {
    /// Attempts no worker has picked up yet.
    unclaimed: AtomicUsize,
    /// Attempts not yet finished, including those waiting for a slot.
    unfinished: AtomicUsize,
    successful: AtomicUsize,
    rejected: AtomicUsize,
}

impl Progress {
    fn new(attempts: usize) -> Self {
        Self {
            unclaimed: AtomicUsize::new(attempts),
            unfinished: AtomicUsize::new(attempts),
            successful: AtomicUsize::new(0),
            rejected: AtomicUsize::new(0),
        }
    }

    fn claim(&self) -> bool {
        self.unclaimed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    fn finish(&self, completed: bool) {
        let counter = if completed {
            &self.successful
        } else {
            &self.rejected
        };
        counter.fetch_add(1, Ordering::AcqRel);
        self.unfinished.fetch_sub(1, Ordering::AcqRel);
    }

    fn unfinished(&self) -> usize {
        self.unfinished.load(Ordering::Acquire)
    }
}

/// Drives one participant through its configured number of attempts.
pub struct ParticipantTrader {
    participant: Arc<Participant>,
    exchange: Arc<Exchange>,
    config: TraderConfig,
}

impl ParticipantTrader {
    /// Smallest amount a generated trade is rounded up to.
    const MIN_TRADE: Decimal = dec!(0.01);

    pub fn new(
        participant: Arc<Participant>,
        exchange: Arc<Exchange>,
        config: TraderConfig,
    ) -> Self {
        Self {
            participant,
            exchange,
            config,
        }
    }

    pub fn participant(&self) -> &Participant {
        &self.participant
    }

    /// Runs every attempt to completion and leaves the participant
    /// [`ParticipantState::Completed`].
    pub fn run(&self) -> TradingSummary {
        info!(
            participant = %self.participant.name(),
            attempts = self.config.attempts,
            "started trading"
        );

        let progress = Progress::new(self.config.attempts);
        let workers = self
            .config
            .attempts
            .min(self.participant.max_concurrent_transactions().saturating_mul(2));

        thread::scope(|scope| {
            for worker in 0..workers {
                let progress = &progress;
                let mut rng = self.rng_for(worker);
                scope.spawn(move || {
                    while progress.claim() {
                        let completed = self.attempt(progress, &mut rng);
                        progress.finish(completed);
                        self.participant.handle(progress.unfinished());
                    }
                });
            }
        });

        self.participant.set_state(ParticipantState::Completed);

        let summary = TradingSummary {
            participant: self.participant.name().to_string(),
            successful: progress.successful.load(Ordering::Acquire),
            rejected: progress.rejected.load(Ordering::Acquire),
        };
        info!("{summary}");
        summary
    }

    /// One attempt: wait for a slot, trade, release the slot.
    fn attempt(&self, progress: &Progress, rng: &mut StdRng) -> bool {
        let Some(slot) = self.acquire_slot(progress) else {
            return false;
        };
        let completed = self.trade(rng);
        drop(slot);
        completed
    }

    /// Polls for a transaction slot, backing off between tries.
    ///
    /// Gives up only if the participant has been moved to Completed.
    fn acquire_slot(&self, progress: &Progress) -> Option<TransactionSlot<'_>> {
        loop {
            if let Some(slot) = self.participant.try_start_transaction() {
                return Some(slot);
            }
            if self.participant.state().is_terminal() {
                return None;
            }
            thread::sleep(self.config.backoff);
            self.participant.handle(progress.unfinished());
        }
    }

    /// Builds and submits one random trade. Returns `true` if it completed.
    fn trade(&self, rng: &mut StdRng) -> bool {
        let (from, to) = random_pair(rng);

        let held = self.participant.balance().get(from);
        if held <= Decimal::ZERO {
            debug!(participant = %self.participant.name(), currency = %from, "nothing to sell");
            return false;
        }
        let amount = trade_amount(held, rng);

        let buyer = if rng.random_bool(self.peer_probability()) {
            self.random_peer(rng)
        } else {
            None
        };
        let rate = self.exchange.get_exchange_rate(from, to);

        let mut builder = TransactionRequest::builder()
            .seller(&self.participant)
            .from(from)
            .to(to)
            .amount(amount);
        if let Some(buyer) = buyer.as_deref().filter(|_| rate > Decimal::ZERO) {
            builder = builder.buyer(buyer).rate(rate);
        }

        let request = match builder.build() {
            Ok(request) => request,
            Err(e) => {
                warn!(participant = %self.participant.name(), error = %e, "invalid trade request");
                return false;
            }
        };

        debug!(
            participant = %self.participant.name(),
            %amount,
            %from,
            %to,
            peer = request.is_peer_to_peer(),
            "submitting trade"
        );
        self.exchange.execute_transaction(&request)
    }

    fn random_peer(&self, rng: &mut StdRng) -> Option<Arc<Participant>> {
        let peers: Vec<_> = self
            .exchange
            .participants()
            .into_iter()
            .filter(|peer| peer.id() != self.participant.id())
            .collect();
        peers.choose(rng).cloned()
    }

    fn peer_probability(&self) -> f64 {
        let ratio = self.config.peer_ratio;
        if ratio.is_finite() {
            ratio.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    fn rng_for(&self, worker: usize) -> StdRng {
        match self.config.seed {
            Some(seed) => {
                let participant = u64::from(self.participant.id().0);
                StdRng::seed_from_u64(seed ^ (participant << 32) ^ worker as u64)
            }
            None => StdRng::from_os_rng(),
        }
    }
}

/// Two distinct currencies.
fn random_pair(rng: &mut StdRng) -> (Currency, Currency) {
    let from = rng.random_range(0..Currency::COUNT);
    let offset = rng.random_range(1..Currency::COUNT);
    (
        Currency::ALL[from],
        Currency::ALL[(from + offset) % Currency::COUNT],
    )
}

/// 10% to 40% of `held`, rounded to cents, at least [`ParticipantTrader::MIN_TRADE`].
fn trade_amount(held: Decimal, rng: &mut StdRng) -> Decimal {
    let fraction = Decimal::new(rng.random_range(100..=400), 3);
    held.checked_mul(fraction)
        .unwrap_or(held)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .max(ParticipantTrader::MIN_TRADE)
}
