// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scope counters on the shared key-value store.

use std::sync::Arc;
use std::time::Duration;

use tally_core::{KeyValueStore, ScopeKey, SequenceNumber, TallyError};

use crate::deadline::bounded;

/// Issues strictly increasing numbers per [`ScopeKey`].
///
/// Atomicity comes from the store's increment primitive, so any number of
/// processes may share one counter. The component never retries: a failed
/// or timed-out call is reported as [`TallyError::CounterUnavailable`] and
/// no number is issued.
#[derive(Clone)]
pub struct ScopeCounter {
    store: Arc<dyn KeyValueStore>,
    timeout: Duration,
}

impl ScopeCounter {
    pub fn new(store: Arc<dyn KeyValueStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Take the next number of `scope`. The first call on a scope returns 1.
    pub async fn increment(&self, scope: &ScopeKey) -> Result<SequenceNumber, TallyError> {
        bounded("counter.incr", self.timeout, self.store.incr(scope.as_str()))
            .await
            .map_err(|e| unavailable(scope, e))
    }

    /// Raise the baseline of `scope` to at least `value`; returns the resulting counter.
    ///
    /// Never lowers the counter, so a reset racing an increment cannot cause
    /// a number to be issued twice.
    pub async fn reset(
        &self,
        scope: &ScopeKey,
        value: SequenceNumber,
    ) -> Result<SequenceNumber, TallyError> {
        bounded("counter.raise", self.timeout, self.store.raise(scope.as_str(), value))
            .await
            .map_err(|e| unavailable(scope, e))
    }

    /// The last number issued for `scope`, zero if none.
    pub async fn current(&self, scope: &ScopeKey) -> Result<SequenceNumber, TallyError> {
        bounded("counter.get", self.timeout, self.store.get(scope.as_str()))
            .await
            .map(|v| v.unwrap_or(0))
            .map_err(|e| unavailable(scope, e))
    }
}

fn unavailable(scope: &ScopeKey, e: TallyError) -> TallyError {
    let source = match e {
        TallyError::CounterStore { source } => source,
        other => Box::new(other),
    };
    TallyError::CounterUnavailable {
        scope: scope.to_string(),
        source,
    }
}
