// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The queue consumer loop.
//!
//! Items are popped one at a time from `queue:<name>`. Missing scopes and
//! duplicate numbers are dropped, transient failures are re-queued after an
//! exponential backoff until the retry budget is spent, and everything else
//! lands on the dead list.

use std::time::Duration;

use tally_config::model::WorkerConfig;
use tally_core::TallyError;
use tally_sequencer::{Job, JobKind, Sequencer, WorkDispatcher, WorkItem};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::executor::JobExecutor;

/// Tunables of the consumer loop.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Idle sleep between empty polls, and the base of the retry backoff.
    pub poll_interval: Duration,
    pub max_retries: u32,
}

const MAX_BACKOFF_SHIFT: u32 = 10;

impl WorkerSettings {
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_retries: config.max_retries,
        }
    }

    /// Delay before re-queueing a job that has already failed `attempts` times.
    pub fn retry_delay(&self, attempts: u32) -> Duration {
        self.poll_interval
            .saturating_mul(1u32 << attempts.min(MAX_BACKOFF_SHIFT))
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::from_config(&WorkerConfig::default())
    }
}

/// What happened to one popped item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The job ran to completion.
    Done,
    /// The job can never succeed and was discarded.
    Dropped,
    /// The job failed transiently and was pushed back onto the queue.
    Retried,
    /// The job was moved to the dead list.
    Dead,
}

impl Outcome {
    fn label(self) -> &'static str {
        match self {
            Outcome::Done => "done",
            Outcome::Dropped => "dropped",
            Outcome::Retried => "retried",
            Outcome::Dead => "dead",
        }
    }
}

/// Consumes the job queue until cancelled.
pub struct Worker {
    dispatcher: WorkDispatcher,
    executor: JobExecutor,
    settings: WorkerSettings,
}

impl Worker {
    pub fn new(sequencer: Sequencer, settings: WorkerSettings) -> Self {
        Self {
            dispatcher: sequencer.dispatcher().clone(),
            executor: JobExecutor::new(sequencer),
            settings,
        }
    }

    /// Run until `cancel` fires. The item in hand is finished first.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(queue = %self.dispatcher.queue_key(), "worker running");

        loop {
            if cancel.is_cancelled() {
                break;
            }
            let idle = match self.poll(&cancel).await {
                Ok(Some(_)) => false,
                Ok(None) => true,
                Err(e) => {
                    warn!(error = %e, "failed to poll queue");
                    true
                }
            };
            if idle {
                tokio::select! {
                    _ = tokio::time::sleep(self.settings.poll_interval) => {}
                    _ = cancel.cancelled() => break,
                }
            }
        }

        info!("worker stopped");
    }

    /// Pop and handle one item. `None` when the queue is empty.
    pub async fn process_next(&self) -> Result<Option<Outcome>, TallyError> {
        self.poll(&CancellationToken::new()).await
    }

    async fn poll(&self, cancel: &CancellationToken) -> Result<Option<Outcome>, TallyError> {
        let Some(payload) = self.dispatcher.pop().await? else {
            return Ok(None);
        };
        Ok(Some(self.handle(&payload, cancel).await))
    }

    async fn handle(&self, payload: &str, cancel: &CancellationToken) -> Outcome {
        let item = match WorkItem::from_json(payload) {
            Ok(item) => item,
            Err(e) => {
                error!(error = %e, "undecodable work item, burying");
                if let Err(e) = self.dispatcher.bury_raw(payload).await {
                    error!(error = %e, "failed to bury undecodable work item");
                }
                tally_prometheus::record_job("unknown", Outcome::Dead.label());
                return Outcome::Dead;
            }
        };

        let outcome = match item.job() {
            Ok(job) => self.run_job(&item, &job, cancel).await,
            Err(e) => {
                error!(jid = %item.jid, class = %item.class, error = %e, "malformed job, burying");
                self.bury(&item).await
            }
        };
        tally_prometheus::record_job(&item.class, outcome.label());
        outcome
    }

    async fn run_job(&self, item: &WorkItem, job: &Job, cancel: &CancellationToken) -> Outcome {
        let e = match self.executor.execute(job).await {
            Ok(()) => {
                debug!(jid = %item.jid, class = %item.class, "job done");
                return Outcome::Done;
            }
            Err(e) => e,
        };

        match e {
            TallyError::NotFound { entity } => {
                warn!(jid = %item.jid, class = %item.class, entity, "scope is gone, dropping job");
                Outcome::Dropped
            }
            TallyError::DuplicateNumber { .. } => {
                tally_prometheus::record_duplicate_number(scope_kind(job.kind()));
                error!(
                    jid = %item.jid,
                    class = %item.class,
                    error = %e,
                    "counter and record store disagree: number already persisted, dropping job"
                );
                Outcome::Dropped
            }
            e if e.is_transient() && item.retry && item.attempts() < self.settings.max_retries => {
                let delay = self.settings.retry_delay(item.attempts());
                debug!(jid = %item.jid, ?delay, error = %e, "backing off before re-queue");
                // A cancelled backoff still re-queues, so shutdown never loses the job.
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => {}
                }
                let next = item.requeued();
                match self.dispatcher.push(&next).await {
                    Ok(()) => {
                        warn!(
                            jid = %item.jid,
                            class = %item.class,
                            attempt = next.attempts(),
                            error = %e,
                            "job failed, re-queued"
                        );
                        Outcome::Retried
                    }
                    Err(push_err) => {
                        error!(jid = %item.jid, error = %push_err, "failed to re-queue job");
                        self.bury(item).await
                    }
                }
            }
            e => {
                error!(
                    jid = %item.jid,
                    class = %item.class,
                    attempts = item.attempts(),
                    error = %e,
                    "job failed permanently, burying"
                );
                self.bury(item).await
            }
        }
    }

    async fn bury(&self, item: &WorkItem) -> Outcome {
        if let Err(e) = self.dispatcher.bury(item).await {
            error!(jid = %item.jid, error = %e, "failed to bury job");
        }
        Outcome::Dead
    }
}

fn scope_kind(kind: JobKind) -> &'static str {
    match kind {
        JobKind::CreateChatJob => "chat",
        JobKind::CreateMessageJob => "message",
        JobKind::UpdateCountsJob => "counts",
    }
}
