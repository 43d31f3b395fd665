// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic recomputation of `chats_count` and `messages_count`.

use std::time::Duration;

use tally_sequencer::Job;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::executor::JobExecutor;

/// Runs an `UpdateCountsJob` inline every `interval`.
pub struct Reconciler {
    executor: JobExecutor,
    interval: Duration,
}

impl Reconciler {
    pub fn new(executor: JobExecutor, interval: Duration) -> Self {
        Self { executor, interval }
    }

    /// Run until `cancel` fires. The first pass starts one interval in.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "count reconciler running");
        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.interval,
            self.interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.executor.execute(&Job::UpdateCounts).await {
                        warn!(error = %e, "count reconciliation failed");
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }

        info!("count reconciler stopped");
    }
}
