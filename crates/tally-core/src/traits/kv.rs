// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key-value store trait backing scope counters and job queues.

use async_trait::async_trait;

use crate::error::TallyError;
use crate::traits::adapter::PluginAdapter;

/// A shared, low-latency store with atomic integer and list primitives.
///
/// Implementations report failures as [`TallyError::CounterStore`]; callers
/// translate them into scope- or queue-specific errors.
#[async_trait]
pub trait KeyValueStore: PluginAdapter {
    /// Atomically increments `key` and returns the new value. Missing keys start at zero.
    async fn incr(&self, key: &str) -> Result<i64, TallyError>;

    /// Reads the integer at `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<i64>, TallyError>;

    /// Atomically sets `key` to `max(current, floor)` and returns the resulting value.
    async fn raise(&self, key: &str, floor: i64) -> Result<i64, TallyError>;

    /// Pushes `payload` onto the head of `list`; returns the new length.
    async fn lpush(&self, list: &str, payload: &str) -> Result<u64, TallyError>;

    /// Pops from the tail of `list`.
    async fn rpop(&self, list: &str) -> Result<Option<String>, TallyError>;

    /// Length of `list` (zero when missing).
    async fn llen(&self, list: &str) -> Result<u64, TallyError>;
}
