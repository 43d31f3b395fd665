// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Tally numbering service.
//!
//! This crate provides the error type, the domain rows (applications, chats,
//! messages), scope keys, and the adapter traits that every store backend
//! implements. Nothing here performs I/O.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::TallyError;
pub use types::{
    AdapterType, Application, Chat, CountRefresh, HealthStatus, Message, ScopeKey, SequenceNumber,
};

pub use traits::{KeyValueStore, PluginAdapter, RecordStore};
