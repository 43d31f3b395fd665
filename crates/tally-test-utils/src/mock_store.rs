// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock key-value store for deterministic failure testing.
//!
//! `MockStore` delegates to a [`MemoryStore`] and can be told to fail
//! increments or list pushes, or to stall every call or only pushes, so
//! tests can exercise the paths where a number was issued but its
//! completion failed or was still in flight.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use tally_core::{AdapterType, HealthStatus, KeyValueStore, PluginAdapter, TallyError};
use tally_kv::MemoryStore;

/// A key-value store with switchable faults.
#[derive(Default)]
pub struct MockStore {
    inner: MemoryStore,
    fail_increments: AtomicBool,
    fail_pushes: AtomicBool,
    stall: Mutex<Option<Duration>>,
    push_stall: Mutex<Option<Duration>>,
    increments: AtomicU64,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `incr` fail until switched off.
    pub fn fail_increments(&self, fail: bool) {
        self.fail_increments.store(fail, Ordering::SeqCst);
    }

    /// Make every `lpush` fail until switched off.
    pub fn fail_pushes(&self, fail: bool) {
        self.fail_pushes.store(fail, Ordering::SeqCst);
    }

    /// Sleep for `delay` before every call, or stop stalling with `None`.
    pub fn stall(&self, delay: Option<Duration>) {
        if let Ok(mut guard) = self.stall.lock() {
            *guard = delay;
        }
    }

    /// Sleep for `delay` before every `lpush` only. Increments stay fast.
    pub fn stall_pushes(&self, delay: Option<Duration>) {
        if let Ok(mut guard) = self.push_stall.lock() {
            *guard = delay;
        }
    }

    /// Number of successful increments so far.
    pub fn increment_count(&self) -> u64 {
        self.increments.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        wait(&self.stall).await;
    }
}

async fn wait(slot: &Mutex<Option<Duration>>) {
    let delay = slot.lock().ok().and_then(|g| *g);
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

fn injected(what: &str) -> TallyError {
    TallyError::CounterStore {
        source: format!("injected {what} failure").into(),
    }
}

#[async_trait]
impl PluginAdapter for MockStore {
    fn name(&self) -> &str {
        "mock"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::CounterStore
    }

    async fn health_check(&self) -> Result<HealthStatus, TallyError> {
        self.pause().await;
        self.inner.health_check().await
    }

    async fn shutdown(&self) -> Result<(), TallyError> {
        self.inner.shutdown().await
    }
}

#[async_trait]
impl KeyValueStore for MockStore {
    async fn incr(&self, key: &str) -> Result<i64, TallyError> {
        self.pause().await;
        if self.fail_increments.load(Ordering::SeqCst) {
            return Err(injected("incr"));
        }
        let value = self.inner.incr(key).await?;
        self.increments.fetch_add(1, Ordering::SeqCst);
        Ok(value)
    }

    async fn get(&self, key: &str) -> Result<Option<i64>, TallyError> {
        self.pause().await;
        self.inner.get(key).await
    }

    async fn raise(&self, key: &str, floor: i64) -> Result<i64, TallyError> {
        self.pause().await;
        self.inner.raise(key, floor).await
    }

    async fn lpush(&self, list: &str, payload: &str) -> Result<u64, TallyError> {
        self.pause().await;
        wait(&self.push_stall).await;
        if self.fail_pushes.load(Ordering::SeqCst) {
            return Err(injected("lpush"));
        }
        self.inner.lpush(list, payload).await
    }

    async fn rpop(&self, list: &str) -> Result<Option<String>, TallyError> {
        self.pause().await;
        self.inner.rpop(list).await
    }

    async fn llen(&self, list: &str) -> Result<u64, TallyError> {
        self.pause().await;
        self.inner.llen(list).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn faults_switch_on_and_off() {
        let store = MockStore::new();
        store.fail_increments(true);
        assert!(store.incr("k").await.is_err());
        store.fail_increments(false);
        assert_eq!(store.incr("k").await.unwrap(), 1);
        assert_eq!(store.increment_count(), 1);

        store.fail_pushes(true);
        assert!(store.lpush("q", "x").await.is_err());
        assert_eq!(store.llen("q").await.unwrap(), 0);
    }
}
