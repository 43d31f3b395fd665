// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Tally service.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A number issued by a scope counter. Positive, unique within its scope.
pub type SequenceNumber = i64;

/// Identifies a numbering domain in the counter store.
///
/// The key names are shared with existing deployments, so both the
/// gateway and any external worker pool agree on where counters live.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeKey(String);

impl ScopeKey {
    /// Counter for chat numbers under the application with `token`.
    pub fn chats_of(token: &str) -> Self {
        Self(format!("application:{token}:chat_counter"))
    }

    /// Counter for message numbers under the chat with row id `chat_id`.
    pub fn messages_of(chat_id: i64) -> Self {
        Self(format!("chat:{chat_id}:message_counter"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A tenant. The token is the external identifier used in URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: i64,
    pub name: String,
    pub token: String,
    pub chats_count: i64,
}

/// A chat row; `number` is unique per application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub application_id: i64,
    pub number: SequenceNumber,
    pub messages_count: i64,
}

/// A message row; `number` is unique per chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub chat_id: i64,
    pub number: SequenceNumber,
    pub body: String,
}

/// Rows touched by a count reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountRefresh {
    pub applications: usize,
    pub chats: usize,
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// Identifies the role an adapter plays.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    RecordStore,
    CounterStore,
}
