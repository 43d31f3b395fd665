// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record store wrapper that can simulate an outage.
//!
//! `MockRecords` delegates to a real [`SqliteRecordStore`] over a temp file.
//! While marked unavailable, every row operation fails with
//! [`TallyError::Storage`], which the pipeline treats as transient. Inserts
//! can also be slowed down to hold a completion in flight.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use tally_core::types::{Application, Chat, CountRefresh, HealthStatus, Message};
use tally_core::{AdapterType, PluginAdapter, RecordStore, SequenceNumber, TallyError};
use tally_storage::SqliteRecordStore;

pub struct MockRecords {
    inner: SqliteRecordStore,
    unavailable: AtomicBool,
    insert_stall: Mutex<Option<Duration>>,
}

impl MockRecords {
    pub fn new(inner: SqliteRecordStore) -> Self {
        Self {
            inner,
            unavailable: AtomicBool::new(false),
            insert_stall: Mutex::new(None),
        }
    }

    /// Fail every row operation until switched off.
    pub fn unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }

    /// Sleep for `delay` before every chat or message insert.
    pub fn stall_inserts(&self, delay: Option<Duration>) {
        if let Ok(mut guard) = self.insert_stall.lock() {
            *guard = delay;
        }
    }

    async fn before_insert(&self) {
        let delay = self.insert_stall.lock().ok().and_then(|g| *g);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check(&self) -> Result<&SqliteRecordStore, TallyError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TallyError::Storage {
                source: "injected record store outage".into(),
            });
        }
        Ok(&self.inner)
    }
}

#[async_trait]
impl PluginAdapter for MockRecords {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn version(&self) -> semver::Version {
        self.inner.version()
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::RecordStore
    }

    async fn health_check(&self) -> Result<HealthStatus, TallyError> {
        self.check()?.health_check().await
    }

    async fn shutdown(&self) -> Result<(), TallyError> {
        self.inner.shutdown().await
    }
}

#[async_trait]
impl RecordStore for MockRecords {
    async fn initialize(&self) -> Result<(), TallyError> {
        self.inner.initialize().await
    }

    async fn close(&self) -> Result<(), TallyError> {
        self.inner.close().await
    }

    async fn create_application(&self, name: &str, token: &str) -> Result<Application, TallyError> {
        self.check()?.create_application(name, token).await
    }

    async fn list_applications(&self) -> Result<Vec<Application>, TallyError> {
        self.check()?.list_applications().await
    }

    async fn find_application(&self, token: &str) -> Result<Application, TallyError> {
        self.check()?.find_application(token).await
    }

    async fn rename_application(&self, token: &str, name: &str) -> Result<Application, TallyError> {
        self.check()?.rename_application(token, name).await
    }

    async fn find_chat(&self, token: &str, number: SequenceNumber) -> Result<Chat, TallyError> {
        self.check()?.find_chat(token, number).await
    }

    async fn find_chat_by_id(&self, chat_id: i64) -> Result<Chat, TallyError> {
        self.check()?.find_chat_by_id(chat_id).await
    }

    async fn list_chats(&self, application_id: i64) -> Result<Vec<Chat>, TallyError> {
        self.check()?.list_chats(application_id).await
    }

    async fn max_chat_number(&self, application_id: i64) -> Result<SequenceNumber, TallyError> {
        self.check()?.max_chat_number(application_id).await
    }

    async fn insert_chat(
        &self,
        application_id: i64,
        number: SequenceNumber,
    ) -> Result<i64, TallyError> {
        self.before_insert().await;
        self.check()?.insert_chat(application_id, number).await
    }

    async fn insert_message(
        &self,
        chat_id: i64,
        number: SequenceNumber,
        body: &str,
    ) -> Result<i64, TallyError> {
        self.before_insert().await;
        self.check()?.insert_message(chat_id, number, body).await
    }

    async fn find_message(
        &self,
        chat_id: i64,
        number: SequenceNumber,
    ) -> Result<Message, TallyError> {
        self.check()?.find_message(chat_id, number).await
    }

    async fn list_messages(&self, chat_id: i64) -> Result<Vec<Message>, TallyError> {
        self.check()?.list_messages(chat_id).await
    }

    async fn search_messages(&self, chat_id: i64, query: &str) -> Result<Vec<Message>, TallyError> {
        self.check()?.search_messages(chat_id, query).await
    }

    async fn update_message_body(
        &self,
        chat_id: i64,
        number: SequenceNumber,
        body: &str,
    ) -> Result<Message, TallyError> {
        self.check()?.update_message_body(chat_id, number, body).await
    }

    async fn max_message_number(&self, chat_id: i64) -> Result<SequenceNumber, TallyError> {
        self.check()?.max_message_number(chat_id).await
    }

    async fn refresh_counts(&self) -> Result<CountRefresh, TallyError> {
        self.check()?.refresh_counts().await
    }
}
