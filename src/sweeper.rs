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

//! Overdue sweeping.
//!
//! A sweep reclassifies every `Borrowed` record older than the threshold as
//! `Unreturned`. Each record transitions in its own item section, so a sweep
//! interrupted halfway leaves a consistent ledger and the next run picks up
//! where it stopped.

use crate::ledger::{Ledger, SharedClock};
use chrono::TimeDelta;
use crossbeam::channel::{Sender, bounded, select, tick};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepReport {
    /// Active borrows examined.
    pub inspected: usize,
    /// Records moved to `Unreturned`.
    pub marked: usize,
    /// Records that changed underneath the sweep (e.g. returned meanwhile).
    pub failed: usize,
}

pub struct OverdueSweeper {
    ledger: Arc<Ledger>,
    clock: SharedClock,
    threshold: TimeDelta,
}

impl OverdueSweeper {
    pub fn new(ledger: Arc<Ledger>, clock: SharedClock, threshold: TimeDelta) -> Self {
        Self {
            ledger,
            clock,
            threshold,
        }
    }

    pub fn threshold(&self) -> TimeDelta {
        self.threshold
    }

    /// Runs one sweep. Per-record failures are logged and counted, never fatal.
    pub fn sweep(&self) -> SweepReport {
        let now = self.clock.utc();
        let mut report = SweepReport::default();

        for record in self.ledger.active_borrows() {
            report.inspected += 1;
            if now - record.borrowed_at <= self.threshold {
                continue;
            }

            match self
                .ledger
                .with_item(record.item_id, |txn| txn.mark_unreturned(record.id))
            {
                Ok(_) => {
                    report.marked += 1;
                    debug!(record_id = %record.id, user_id = %record.user_id, "marked unreturned");
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(record_id = %record.id, error = %e, "could not mark record unreturned");
                }
            }
        }

        info!(
            inspected = report.inspected,
            marked = report.marked,
            failed = report.failed,
            "overdue sweep finished"
        );
        report
    }

    /// Sweeps every `interval` on a background thread until the handle is
    /// shut down or dropped.
    pub fn spawn(self, interval: Duration) -> io::Result<SweepHandle> {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let thread = thread::Builder::new()
            .name("overdue-sweeper".to_owned())
            .spawn(move || {
                let ticker = tick(interval);
                loop {
                    select! {
                        // Disconnects when the handle drops its sender.
                        recv(stop_rx) -> _ => break,
                        recv(ticker) -> _ => {
                            self.sweep();
                        }
                    }
                }
                debug!("overdue sweeper stopped");
            })?;

        info!(interval_secs = interval.as_secs(), "overdue sweeper started");
        Ok(SweepHandle {
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }
}

/// Owns the background sweeper thread.
pub struct SweepHandle {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl SweepHandle {
    /// Stops the thread and waits for an in-flight sweep to finish.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        drop(self.stop.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("overdue sweeper thread panicked");
            }
        }
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}
