// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded startup probing of the stores.
//!
//! Each store walks `Disconnected -> Probing -> Ready | FailedFatal`. A
//! probe is retried a fixed number of times with a fixed backoff; the
//! process does not accept traffic until every store is ready.

use std::future::Future;
use std::time::Duration;

use tally_config::model::StartupConfig;
use tally_core::TallyError;
use tally_core::types::HealthStatus;
use tracing::{info, warn};

/// Where a store is in the startup sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Disconnected,
    Probing { attempt: u32 },
    Ready,
    FailedFatal,
}

/// Attempt budget and backoff for one store.
#[derive(Debug, Clone)]
pub struct ProbePolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl ProbePolicy {
    pub fn from_config(config: &StartupConfig) -> Self {
        Self {
            attempts: config.probe_attempts,
            backoff: Duration::from_millis(config.probe_backoff_ms),
        }
    }
}

pub struct Probe {
    name: String,
    policy: ProbePolicy,
    state: Readiness,
}

impl Probe {
    pub fn new(name: impl Into<String>, policy: ProbePolicy) -> Self {
        Self {
            name: name.into(),
            policy,
            state: Readiness::Disconnected,
        }
    }

    pub fn state(&self) -> Readiness {
        self.state
    }

    /// Call `check` until it reports a usable store or the budget runs out.
    ///
    /// `Degraded` counts as ready.
    pub async fn run<F, Fut>(&mut self, mut check: F) -> Result<(), TallyError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<HealthStatus, TallyError>>,
    {
        let mut last_failure = String::from("no probe attempted");

        for attempt in 1..=self.policy.attempts {
            self.state = Readiness::Probing { attempt };
            match check().await {
                Ok(HealthStatus::Unhealthy(reason)) => last_failure = reason,
                Ok(_) => {
                    self.state = Readiness::Ready;
                    info!(store = %self.name, attempt, "store ready");
                    return Ok(());
                }
                Err(e) => last_failure = e.to_string(),
            }

            warn!(
                store = %self.name,
                attempt,
                attempts = self.policy.attempts,
                reason = %last_failure,
                "store not ready"
            );
            if attempt < self.policy.attempts {
                tokio::time::sleep(self.policy.backoff).await;
            }
        }

        self.state = Readiness::FailedFatal;
        Err(TallyError::HealthCheckFailed {
            name: self.name.clone(),
            source: format!(
                "not ready after {} attempts: {last_failure}",
                self.policy.attempts
            )
            .into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(attempts: u32) -> ProbePolicy {
        ProbePolicy {
            attempts,
            backoff: Duration::from_secs(2),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ready_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let mut probe = Probe::new("redis", policy(5));
        assert_eq!(probe.state(), Readiness::Disconnected);

        probe
            .run(|| async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TallyError::CounterStore {
                        source: "connection refused".into(),
                    })
                } else {
                    Ok(HealthStatus::Healthy)
                }
            })
            .await
            .unwrap();

        assert_eq!(probe.state(), Readiness::Ready);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn fails_fatally_when_budget_is_spent() {
        let calls = AtomicU32::new(0);
        let mut probe = Probe::new("sqlite", policy(3));
        let started = tokio::time::Instant::now();

        let err = probe
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(HealthStatus::Unhealthy("down".into()))
            })
            .await
            .unwrap_err();

        assert_eq!(probe.state(), Readiness::FailedFatal);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Backoff between attempts, none after the last.
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(4) && waited < Duration::from_secs(6));
        assert!(err.to_string().contains("sqlite"));
        assert!(err.to_string().contains("down"));
    }

    #[tokio::test]
    async fn degraded_counts_as_ready() {
        let mut probe = Probe::new("redis", policy(1));
        probe
            .run(|| async { Ok(HealthStatus::Degraded("slow".into())) })
            .await
            .unwrap();
        assert_eq!(probe.state(), Readiness::Ready);
    }

    #[test]
    fn policy_follows_config() {
        let policy = ProbePolicy::from_config(&StartupConfig::default());
        assert_eq!(policy.attempts, 30);
        assert_eq!(policy.backoff, Duration::from_secs(2));
    }
}
