// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as valid bind hosts, parseable store URLs, and non-zero limits.

use crate::diagnostic::ConfigError;
use crate::model::{CounterBackend, TallyConfig};

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &TallyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    let host = config.server.host.trim();
    if host.is_empty() {
        fail("server.host must not be empty".to_string());
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            fail(format!(
                "server.host `{host}` is not a valid IP address or hostname"
            ));
        }
    }

    if config.server.port == 0 {
        fail("server.port must be non-zero".to_string());
    }

    if config.server.max_concurrent_requests == 0 {
        fail("server.max_concurrent_requests must be at least 1".to_string());
    }

    if config.counter.backend == CounterBackend::Redis {
        let url = config.counter.url.trim();
        if !(url.starts_with("redis://") || url.starts_with("rediss://")) {
            fail(format!(
                "counter.url `{url}` must start with redis:// or rediss://"
            ));
        } else if url
            .split_once("://")
            .map(|(_, rest)| rest.trim_matches('/').is_empty())
            .unwrap_or(true)
        {
            fail(format!("counter.url `{url}` is missing a host"));
        }
    }

    if config.counter.call_timeout_ms == 0 {
        fail("counter.call_timeout_ms must be non-zero".to_string());
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.storage.call_timeout_ms == 0 {
        fail("storage.call_timeout_ms must be non-zero".to_string());
    }

    let queue = config.dispatch.queue.trim();
    if queue.is_empty() {
        fail("dispatch.queue must not be empty".to_string());
    } else if queue.chars().any(char::is_whitespace) {
        fail(format!("dispatch.queue `{queue}` must not contain whitespace"));
    }

    if config.startup.probe_attempts == 0 {
        fail("startup.probe_attempts must be at least 1".to_string());
    }

    if config.worker.poll_interval_ms == 0 {
        fail("worker.poll_interval_ms must be non-zero".to_string());
    }

    if config.worker.reconcile_interval_secs == 0 {
        fail("worker.reconcile_interval_secs must be non-zero".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
