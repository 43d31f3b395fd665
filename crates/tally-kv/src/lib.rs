// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key-value store backends for scope counters and job queues.
//!
//! [`RedisStore`] talks to the Redis server shared with the worker pool.
//! [`MemoryStore`] keeps everything in-process and backs tests and
//! single-process development setups.

pub mod memory;
pub mod redis_store;

use std::sync::Arc;

use tally_config::model::{CounterBackend, CounterConfig};
use tally_core::{KeyValueStore, TallyError};

pub use crate::memory::MemoryStore;
pub use crate::redis_store::RedisStore;

/// Build the configured key-value store. No connection is made yet.
pub fn from_config(config: &CounterConfig) -> Result<Arc<dyn KeyValueStore>, TallyError> {
    match config.backend {
        CounterBackend::Redis => Ok(Arc::new(RedisStore::open(&config.url)?)),
        CounterBackend::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_backend_from_config() {
        let config = CounterConfig {
            backend: CounterBackend::Memory,
            ..CounterConfig::default()
        };
        let store = from_config(&config).unwrap();
        assert_eq!(store.name(), "memory");
    }

    #[test]
    fn redis_backend_does_not_connect_eagerly() {
        let config = CounterConfig {
            backend: CounterBackend::Redis,
            url: "redis://127.0.0.1:1/0".to_string(),
            ..CounterConfig::default()
        };
        let store = from_config(&config).unwrap();
        assert_eq!(store.name(), "redis");
    }

    #[test]
    fn malformed_redis_url_is_a_config_error() {
        let config = CounterConfig {
            backend: CounterBackend::Redis,
            url: "not a url".to_string(),
            ..CounterConfig::default()
        };
        assert!(matches!(from_config(&config), Err(TallyError::Config(_))));
    }
}
