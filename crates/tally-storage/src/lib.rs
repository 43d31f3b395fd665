// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite record store for the Tally numbering service.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and typed operations for
//! applications, chats and messages. Per-scope number uniqueness is enforced
//! by `UNIQUE` constraints, which surface as [`tally_core::TallyError::DuplicateNumber`].

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use adapter::SqliteRecordStore;
pub use database::Database;
