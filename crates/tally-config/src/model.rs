// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Tally numbering service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};
use strum::Display;

/// Top-level Tally configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TallyConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Counter and queue store settings.
    #[serde(default)]
    pub counter: CounterConfig,

    /// Record store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// How issued numbers are completed (persisted inline or dispatched).
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Startup readiness probing.
    #[serde(default)]
    pub startup: StartupConfig,

    /// Queue consumer settings.
    #[serde(default)]
    pub worker: WorkerConfig,
}

impl TallyConfig {
    /// Render the effective configuration as TOML, as printed by `tally check`.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Upper bound on requests handled at once.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_concurrent_requests: default_max_concurrent_requests(),
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_concurrent_requests() -> usize {
    25
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Which key-value store backs counters and queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CounterBackend {
    /// A Redis server shared with the worker pool.
    #[default]
    Redis,
    /// An in-process store. Counters do not survive restarts and are not
    /// shared between processes.
    Memory,
}

/// Counter store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CounterConfig {
    #[serde(default)]
    pub backend: CounterBackend,

    /// Connection URL, used when `backend = "redis"`.
    #[serde(default = "default_counter_url")]
    pub url: String,

    /// Deadline for a single counter or queue call, in milliseconds.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            backend: CounterBackend::default(),
            url: default_counter_url(),
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

fn default_counter_url() -> String {
    "redis://redis:6379/1".to_string()
}

fn default_call_timeout_ms() -> u64 {
    5000
}

/// Record store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL journal mode.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// Deadline for a single record store call, in milliseconds.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("tally").join("tally.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("tally.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// How a request completes once its number has been issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CompletionMode {
    /// Push a job onto the queue and answer 202.
    #[default]
    Dispatch,
    /// Insert the row inline and answer 201.
    Persist,
}

/// Completion and queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    #[serde(default)]
    pub completion: CompletionMode,

    /// Queue name; jobs land on the list `queue:<name>`.
    #[serde(default = "default_queue")]
    pub queue: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            completion: CompletionMode::default(),
            queue: default_queue(),
        }
    }
}

fn default_queue() -> String {
    "default".to_string()
}

/// Startup readiness probing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StartupConfig {
    /// Health probes per store before giving up.
    #[serde(default = "default_probe_attempts")]
    pub probe_attempts: u32,

    /// Pause between probes, in milliseconds.
    #[serde(default = "default_probe_backoff_ms")]
    pub probe_backoff_ms: u64,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            probe_attempts: default_probe_attempts(),
            probe_backoff_ms: default_probe_backoff_ms(),
        }
    }
}

fn default_probe_attempts() -> u32 {
    30
}

fn default_probe_backoff_ms() -> u64 {
    2000
}

/// Queue consumer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Run the consumer inside `tally serve`.
    #[serde(default = "default_worker_enabled")]
    pub enabled: bool,

    /// Sleep between polls of an empty queue, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Re-queues allowed for a failing job before it is dead-lettered.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Interval of the count reconciler, in seconds.
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: default_worker_enabled(),
            poll_interval_ms: default_poll_interval_ms(),
            max_retries: default_max_retries(),
            reconcile_interval_secs: default_reconcile_interval_secs(),
        }
    }
}

fn default_worker_enabled() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_max_retries() -> u32 {
    5
}

fn default_reconcile_interval_secs() -> u64 {
    60
}
