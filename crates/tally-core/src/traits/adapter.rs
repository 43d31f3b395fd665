// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base adapter trait that all store adapters must implement.

use async_trait::async_trait;

use crate::error::TallyError;
use crate::types::{AdapterType, HealthStatus};

/// The base trait for all Tally store adapters.
///
/// Provides identity, lifecycle and health check capabilities, which is
/// what startup probing and `/up` are built on.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Returns the human-readable name of this adapter instance.
    fn name(&self) -> &str;

    /// Returns the semantic version of this adapter.
    fn version(&self) -> semver::Version;

    /// Returns the role of this adapter.
    fn adapter_type(&self) -> AdapterType;

    /// Performs a health check and returns the adapter's current status.
    async fn health_check(&self) -> Result<HealthStatus, TallyError>;

    /// Gracefully shuts down the adapter, releasing any held resources.
    async fn shutdown(&self) -> Result<(), TallyError>;
}
