// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-call deadlines for store operations.

use std::future::Future;
use std::time::{Duration, Instant};

use tally_core::TallyError;

/// Run `call` with a deadline of `limit`.
///
/// An expired deadline becomes [`TallyError::Timeout`] naming `operation`.
/// The latency of every call is recorded under the same name.
pub async fn bounded<T, F>(operation: &'static str, limit: Duration, call: F) -> Result<T, TallyError>
where
    F: Future<Output = Result<T, TallyError>>,
{
    let started = Instant::now();
    let outcome = tokio::time::timeout(limit, call).await;
    tally_prometheus::record_store_call(operation, started.elapsed().as_secs_f64());
    match outcome {
        Ok(result) => result,
        Err(_) => Err(TallyError::Timeout {
            operation: operation.to_string(),
            duration: limit,
        }),
    }
}
