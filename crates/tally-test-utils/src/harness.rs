// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the numbering pipeline over a temp SQLite file
//! and a [`MockStore`], so tests can drive the same code paths as the
//! server without Redis.

use std::sync::Arc;
use std::time::Duration;

use tally_config::model::{CompletionMode, StorageConfig, TallyConfig};
use tally_core::types::Application;
use tally_core::{KeyValueStore, RecordStore, TallyError};
use tally_sequencer::{Sequencer, SequencerSettings, WorkItem};
use tally_storage::SqliteRecordStore;

use crate::mock_records::MockRecords;
use crate::mock_store::MockStore;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    completion: CompletionMode,
    queue: String,
    call_timeout: Duration,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            completion: CompletionMode::Dispatch,
            queue: "default".to_string(),
            call_timeout: Duration::from_secs(5),
        }
    }

    /// Insert rows inline instead of dispatching jobs.
    pub fn persisting(mut self) -> Self {
        self.completion = CompletionMode::Persist;
        self
    }

    pub fn with_queue(mut self, queue: &str) -> Self {
        self.queue = queue.to_string();
        self
    }

    /// Deadline for every store call.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, TallyError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| TallyError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        let mut config = TallyConfig::default();
        config.storage = StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
            call_timeout_ms: self.call_timeout.as_millis() as u64,
        };
        config.counter.call_timeout_ms = self.call_timeout.as_millis() as u64;
        config.dispatch.completion = self.completion;
        config.dispatch.queue = self.queue;

        let records = Arc::new(MockRecords::new(SqliteRecordStore::new(
            config.storage.clone(),
        )));
        records.initialize().await?;
        let kv = Arc::new(MockStore::new());

        let sequencer = Sequencer::new(
            records.clone(),
            kv.clone(),
            SequencerSettings::from_config(&config),
        );

        Ok(TestHarness {
            records,
            kv,
            sequencer,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment over temp storage.
pub struct TestHarness {
    /// SQLite record store (temp DB, cleaned up on drop) with outage switch.
    pub records: Arc<MockRecords>,
    /// Fault-injecting key-value store.
    pub kv: Arc<MockStore>,
    /// The numbering pipeline under test.
    pub sequencer: Sequencer,
    /// Configuration matching the assembled stack.
    pub config: TallyConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A harness with default settings (dispatching completion).
    pub async fn new() -> Result<Self, TallyError> {
        Self::builder().build().await
    }

    /// Create an application through the pipeline.
    pub async fn application(&self, name: &str) -> Result<Application, TallyError> {
        self.sequencer.create_application(Some(name)).await
    }

    /// Pop every item currently queued, oldest first.
    pub async fn drain_queue(&self) -> Result<Vec<WorkItem>, TallyError> {
        let key = self.sequencer.dispatcher().queue_key();
        let mut items = Vec::new();
        while let Some(payload) = self.kv.rpop(&key).await? {
            let item = WorkItem::from_json(&payload)
                .map_err(|e| TallyError::Internal(format!("bad queue payload: {e}")))?;
            items.push(item);
        }
        Ok(items)
    }

    /// Items waiting on the queue.
    pub async fn queue_len(&self) -> Result<u64, TallyError> {
        self.kv.llen(&self.sequencer.dispatcher().queue_key()).await
    }
}
