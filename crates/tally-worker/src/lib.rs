// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background processing for the Tally numbering service.
//!
//! The [`Worker`] pops [`WorkItem`](tally_sequencer::WorkItem)s off the
//! queue and persists the chats and messages they carry. The
//! [`Reconciler`] periodically recomputes the denormalized counts.

pub mod executor;
pub mod reconciler;
pub mod runner;

pub use executor::JobExecutor;
pub use reconciler::Reconciler;
pub use runner::{Outcome, Worker, WorkerSettings};
