// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the RecordStore trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use tally_config::model::StorageConfig;
use tally_core::types::{Application, Chat, CountRefresh, Message, SequenceNumber};
use tally_core::{AdapterType, HealthStatus, PluginAdapter, RecordStore, TallyError};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed record store.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is opened on the first call to
/// [`RecordStore::initialize`].
pub struct SqliteRecordStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteRecordStore {
    /// Create a new store with the given configuration.
    ///
    /// The database connection is not opened until [`RecordStore::initialize`] is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Returns a reference to the underlying Database, or an error if not initialized.
    fn db(&self) -> Result<&Database, TallyError> {
        self.db.get().ok_or_else(|| TallyError::Storage {
            source: "record store not initialized -- call initialize() first".into(),
        })
    }

    async fn checkpoint(&self, db: &Database) -> Result<(), TallyError> {
        if !self.config.wal_mode {
            return Ok(());
        }
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for SqliteRecordStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::RecordStore
    }

    async fn health_check(&self) -> Result<HealthStatus, TallyError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), TallyError> {
        match self.db.get() {
            Some(db) => self.checkpoint(db).await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn initialize(&self) -> Result<(), TallyError> {
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| TallyError::Storage {
            source: "record store already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite record store initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), TallyError> {
        let db = self.db()?;
        self.checkpoint(db).await
    }

    // --- Applications ---

    async fn create_application(&self, name: &str, token: &str) -> Result<Application, TallyError> {
        queries::applications::create_application(self.db()?, name, token).await
    }

    async fn list_applications(&self) -> Result<Vec<Application>, TallyError> {
        queries::applications::list_applications(self.db()?).await
    }

    async fn find_application(&self, token: &str) -> Result<Application, TallyError> {
        queries::applications::find_application(self.db()?, token).await
    }

    async fn rename_application(&self, token: &str, name: &str) -> Result<Application, TallyError> {
        queries::applications::rename_application(self.db()?, token, name).await
    }

    // --- Chats ---

    async fn find_chat(&self, token: &str, number: SequenceNumber) -> Result<Chat, TallyError> {
        queries::chats::find_chat(self.db()?, token, number).await
    }

    async fn find_chat_by_id(&self, chat_id: i64) -> Result<Chat, TallyError> {
        queries::chats::find_chat_by_id(self.db()?, chat_id).await
    }

    async fn list_chats(&self, application_id: i64) -> Result<Vec<Chat>, TallyError> {
        queries::chats::list_chats(self.db()?, application_id).await
    }

    async fn max_chat_number(&self, application_id: i64) -> Result<SequenceNumber, TallyError> {
        queries::chats::max_chat_number(self.db()?, application_id).await
    }

    async fn insert_chat(
        &self,
        application_id: i64,
        number: SequenceNumber,
    ) -> Result<i64, TallyError> {
        queries::chats::insert_chat(self.db()?, application_id, number).await
    }

    // --- Messages ---

    async fn insert_message(
        &self,
        chat_id: i64,
        number: SequenceNumber,
        body: &str,
    ) -> Result<i64, TallyError> {
        queries::messages::insert_message(self.db()?, chat_id, number, body).await
    }

    async fn find_message(
        &self,
        chat_id: i64,
        number: SequenceNumber,
    ) -> Result<Message, TallyError> {
        queries::messages::find_message(self.db()?, chat_id, number).await
    }

    async fn list_messages(&self, chat_id: i64) -> Result<Vec<Message>, TallyError> {
        queries::messages::list_messages(self.db()?, chat_id).await
    }

    async fn search_messages(&self, chat_id: i64, query: &str) -> Result<Vec<Message>, TallyError> {
        queries::messages::search_messages(self.db()?, chat_id, query).await
    }

    async fn update_message_body(
        &self,
        chat_id: i64,
        number: SequenceNumber,
        body: &str,
    ) -> Result<Message, TallyError> {
        queries::messages::update_message_body(self.db()?, chat_id, number, body).await
    }

    async fn max_message_number(&self, chat_id: i64) -> Result<SequenceNumber, TallyError> {
        queries::messages::max_message_number(self.db()?, chat_id).await
    }

    async fn refresh_counts(&self) -> Result<CountRefresh, TallyError> {
        queries::counts::refresh_counts(self.db()?).await
    }
}
