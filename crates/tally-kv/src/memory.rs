// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process key-value store.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use tally_core::{AdapterType, HealthStatus, KeyValueStore, PluginAdapter, TallyError};

/// A [`KeyValueStore`] held in process memory.
///
/// Each operation runs under the shard lock of its key, so increments and
/// raises on one key are atomic with respect to each other. State is lost
/// on restart and invisible to other processes.
#[derive(Default)]
pub struct MemoryStore {
    counters: DashMap<String, i64>,
    lists: DashMap<String, VecDeque<String>>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<(), TallyError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TallyError::CounterStore {
                source: "memory store is shut down".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::CounterStore
    }

    async fn health_check(&self) -> Result<HealthStatus, TallyError> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(HealthStatus::Unhealthy("shut down".to_string()));
        }
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), TallyError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn incr(&self, key: &str) -> Result<i64, TallyError> {
        self.ensure_open()?;
        let mut entry = self.counters.entry(key.to_string()).or_insert(0);
        *entry += 1;
        Ok(*entry)
    }

    async fn get(&self, key: &str) -> Result<Option<i64>, TallyError> {
        self.ensure_open()?;
        Ok(self.counters.get(key).map(|v| *v))
    }

    async fn raise(&self, key: &str, floor: i64) -> Result<i64, TallyError> {
        self.ensure_open()?;
        let mut entry = self.counters.entry(key.to_string()).or_insert(0);
        if floor > *entry {
            *entry = floor;
        }
        Ok(*entry)
    }

    async fn lpush(&self, list: &str, payload: &str) -> Result<u64, TallyError> {
        self.ensure_open()?;
        let mut entry = self.lists.entry(list.to_string()).or_default();
        entry.push_front(payload.to_string());
        Ok(entry.len() as u64)
    }

    async fn rpop(&self, list: &str) -> Result<Option<String>, TallyError> {
        self.ensure_open()?;
        Ok(self.lists.get_mut(list).and_then(|mut l| l.pop_back()))
    }

    async fn llen(&self, list: &str) -> Result<u64, TallyError> {
        self.ensure_open()?;
        Ok(self.lists.get(list).map(|l| l.len() as u64).unwrap_or(0))
    }
}
