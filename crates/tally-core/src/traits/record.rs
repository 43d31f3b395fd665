// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record store trait for the durable application/chat/message rows.

use async_trait::async_trait;

use crate::error::TallyError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Application, Chat, CountRefresh, Message, SequenceNumber};

/// Transactional source of truth for persisted rows.
///
/// Lookups that miss return [`TallyError::NotFound`]. Inserting a number that
/// already exists in its scope returns [`TallyError::DuplicateNumber`].
#[async_trait]
pub trait RecordStore: PluginAdapter {
    /// Opens connections and applies pending migrations.
    async fn initialize(&self) -> Result<(), TallyError>;

    /// Flushes pending writes and releases connections.
    async fn close(&self) -> Result<(), TallyError>;

    // --- applications ---

    async fn create_application(&self, name: &str, token: &str)
    -> Result<Application, TallyError>;

    async fn list_applications(&self) -> Result<Vec<Application>, TallyError>;

    async fn find_application(&self, token: &str) -> Result<Application, TallyError>;

    async fn rename_application(&self, token: &str, name: &str)
    -> Result<Application, TallyError>;

    // --- chats ---

    async fn find_chat(&self, token: &str, number: SequenceNumber) -> Result<Chat, TallyError>;

    async fn find_chat_by_id(&self, chat_id: i64) -> Result<Chat, TallyError>;

    /// Chats of an application ordered by number.
    async fn list_chats(&self, application_id: i64) -> Result<Vec<Chat>, TallyError>;

    /// Highest persisted chat number for the application, zero when none.
    async fn max_chat_number(&self, application_id: i64) -> Result<SequenceNumber, TallyError>;

    /// Inserts a chat row and returns its id.
    async fn insert_chat(
        &self,
        application_id: i64,
        number: SequenceNumber,
    ) -> Result<i64, TallyError>;

    // --- messages ---

    /// Inserts a message row and returns its id.
    async fn insert_message(
        &self,
        chat_id: i64,
        number: SequenceNumber,
        body: &str,
    ) -> Result<i64, TallyError>;

    async fn find_message(
        &self,
        chat_id: i64,
        number: SequenceNumber,
    ) -> Result<Message, TallyError>;

    /// Messages of a chat ordered by number.
    async fn list_messages(&self, chat_id: i64) -> Result<Vec<Message>, TallyError>;

    /// Case-insensitive substring search over message bodies, ordered by number.
    async fn search_messages(&self, chat_id: i64, query: &str)
    -> Result<Vec<Message>, TallyError>;

    async fn update_message_body(
        &self,
        chat_id: i64,
        number: SequenceNumber,
        body: &str,
    ) -> Result<Message, TallyError>;

    /// Highest persisted message number for the chat, zero when none.
    async fn max_message_number(&self, chat_id: i64) -> Result<SequenceNumber, TallyError>;

    /// Recomputes `chats_count` and `messages_count` from the rows.
    async fn refresh_counts(&self) -> Result<CountRefresh, TallyError>;
}
