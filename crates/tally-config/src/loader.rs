// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./tally.toml` > `~/.config/tally/tally.toml` > `/etc/tally/tally.toml`
//! with environment variable overrides via the `TALLY_` prefix, plus the
//! bare `PORT` and `REDIS_URL` variables that container platforms set.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::TallyConfig;

pub(crate) const SYSTEM_CONFIG: &str = "/etc/tally/tally.toml";
pub(crate) const LOCAL_CONFIG: &str = "tally.toml";

/// Config sections reachable through `TALLY_<SECTION>_<KEY>` variables.
const SECTIONS: &[&str] = &["server", "counter", "storage", "dispatch", "startup", "worker"];

pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tally/tally.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/tally/tally.toml` (system-wide)
/// 3. `~/.config/tally/tally.toml` (user XDG config)
/// 4. `./tally.toml` (local directory)
/// 5. `TALLY_*` environment variables
/// 6. `PORT` and `REDIS_URL`
pub fn load_config() -> Result<TallyConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<TallyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TallyConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<TallyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TallyConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .merge(platform_env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(TallyConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
        .merge(platform_env_provider())
}

/// Environment provider mapping `TALLY_SECTION_KEY` to `section.key`.
///
/// Only the section prefix is split off, so `TALLY_WORKER_POLL_INTERVAL_MS`
/// becomes `worker.poll_interval_ms` rather than `worker.poll.interval.ms`.
fn env_provider() -> Env {
    Env::prefixed("TALLY_").map(|key| {
        let key_str = key.as_str();
        for section in SECTIONS {
            if let Some(rest) = key_str
                .strip_prefix(section)
                .and_then(|r| r.strip_prefix('_'))
            {
                return format!("{section}.{rest}").into();
            }
        }
        key_str.to_string().into()
    })
}

/// Record-store connection variables of MySQL-backed deployments. Records
/// live in SQLite at `storage.database_path`, so these have no effect.
pub const IGNORED_STORE_VARS: &[&str] = &[
    "MYSQL_HOST",
    "MYSQL_PORT",
    "MYSQL_USER",
    "MYSQL_PASSWORD",
    "MYSQL_DATABASE",
];

/// The [`IGNORED_STORE_VARS`] that are set in the environment.
pub fn ignored_store_vars() -> Vec<&'static str> {
    IGNORED_STORE_VARS
        .iter()
        .copied()
        .filter(|name| std::env::var_os(name).is_some())
        .collect()
}

/// `PORT` and `REDIS_URL` as set by container platforms.
fn platform_env_provider() -> Env {
    Env::raw().only(&["PORT", "REDIS_URL"]).map(|key| {
        if key.as_str().eq_ignore_ascii_case("PORT") {
            "server.port".into()
        } else {
            "counter.url".into()
        }
    })
}
