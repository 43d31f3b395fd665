// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! Every store backend extends the [`PluginAdapter`] base trait and uses
//! `#[async_trait]` so it can sit behind an `Arc<dyn ...>`.

pub mod adapter;
pub mod kv;
pub mod record;

pub use adapter::PluginAdapter;
pub use kv::KeyValueStore;
pub use record::RecordStore;
