// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-scope sequence numbering and reliable hand-off.
//!
//! A [`ScopeCounter`] issues numbers from the shared key-value store. The
//! [`Sequencer`] checks that the owning scope exists, takes the next number,
//! and then either persists the row directly or hands it to the worker pool
//! through the [`WorkDispatcher`]. Numbers are never handed back: a failure
//! after the increment leaves a gap, never a duplicate.

pub mod counter;
pub mod deadline;
pub mod dispatcher;
pub mod ids;
pub mod sequencer;
pub mod work_item;

pub use counter::ScopeCounter;
pub use dispatcher::{DEAD_LIST, WorkDispatcher};
pub use sequencer::{Completion, CompletionStrategy, Issued, Sequencer, SequencerSettings};
pub use work_item::{Job, JobKind, WorkItem};
