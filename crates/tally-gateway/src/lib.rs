// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP API for the Tally numbering service.
//!
//! Handlers resolve the owning scope, decode the body, and hand the rest
//! to the [`tally_sequencer::Sequencer`]. Creating a chat or message
//! answers `201 Created` when the row was persisted inline and
//! `202 Accepted` when a job was dispatched.

pub mod error;
pub mod handlers;
pub mod server;

pub use error::ApiError;
pub use server::{GatewayState, ServerConfig, router, start_server};
