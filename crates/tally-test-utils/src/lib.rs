// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Tally integration tests.
//!
//! Provides a fault-injecting key-value store and a harness that assembles
//! the numbering pipeline over a temp SQLite file, without external services.
//!
//! # Components
//!
//! - [`MockStore`] - In-memory key-value store with switchable failures
//! - [`MockRecords`] - SQLite record store that can simulate an outage
//! - [`TestHarness`] - Record store, key-value store and [`tally_sequencer::Sequencer`] wired together

pub mod harness;
pub mod mock_records;
pub mod mock_store;

pub use harness::TestHarness;
pub use mock_records::MockRecords;
pub use mock_store::MockStore;
