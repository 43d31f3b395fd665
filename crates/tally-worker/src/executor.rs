// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Execution of individual jobs against the record store.

use tally_core::{ScopeKey, TallyError};
use tally_sequencer::deadline::bounded;
use tally_sequencer::{Job, Sequencer};
use tracing::{debug, info, warn};

/// Runs decoded jobs. Shares stores and deadlines with the [`Sequencer`].
#[derive(Clone)]
pub struct JobExecutor {
    sequencer: Sequencer,
}

impl JobExecutor {
    pub fn new(sequencer: Sequencer) -> Self {
        Self { sequencer }
    }

    pub async fn execute(&self, job: &Job) -> Result<(), TallyError> {
        match job {
            Job::CreateChat { token, number } => self.create_chat(token, *number).await,
            Job::CreateMessage {
                chat_id,
                number,
                body,
            } => self.create_message(*chat_id, *number, body).await,
            Job::UpdateCounts => self.update_counts().await,
        }
    }

    /// Persist the chat, then start its message counter after any
    /// messages that already exist for it.
    async fn create_chat(&self, token: &str, number: i64) -> Result<(), TallyError> {
        let records = self.sequencer.records();
        let limit = self.sequencer.storage_timeout();

        let application =
            bounded("records.find_application", limit, records.find_application(token)).await?;
        let chat_id = bounded(
            "records.insert_chat",
            limit,
            records.insert_chat(application.id, number),
        )
        .await?;
        let max = bounded(
            "records.max_message_number",
            limit,
            records.max_message_number(chat_id),
        )
        .await?;

        let scope = ScopeKey::messages_of(chat_id);
        if let Err(e) = self.sequencer.counter().reset(&scope, max).await {
            warn!(scope = %scope, error = %e, "could not initialize message counter");
        }
        debug!(token, number, chat_id, "chat persisted");
        Ok(())
    }

    async fn create_message(&self, chat_id: i64, number: i64, body: &str) -> Result<(), TallyError> {
        let records = self.sequencer.records();
        let id = bounded(
            "records.insert_message",
            self.sequencer.storage_timeout(),
            records.insert_message(chat_id, number, body),
        )
        .await?;
        debug!(chat_id, number, id, "message persisted");
        Ok(())
    }

    async fn update_counts(&self) -> Result<(), TallyError> {
        let refreshed = bounded(
            "records.refresh_counts",
            self.sequencer.storage_timeout(),
            self.sequencer.records().refresh_counts(),
        )
        .await?;
        info!(
            applications = refreshed.applications,
            chats = refreshed.chats,
            "counts refreshed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::{KeyValueStore, RecordStore};
    use tally_test_utils::TestHarness;

    #[tokio::test]
    async fn create_chat_persists_and_starts_message_counter() {
        let harness = TestHarness::new().await.unwrap();
        let app = harness.application("acme").await.unwrap();
        let executor = JobExecutor::new(harness.sequencer.clone());

        executor
            .execute(&Job::CreateChat {
                token: app.token.clone(),
                number: 1,
            })
            .await
            .unwrap();

        let chat = harness.records.find_chat(&app.token, 1).await.unwrap();
        let counter = harness
            .kv
            .get(ScopeKey::messages_of(chat.id).as_str())
            .await
            .unwrap();
        assert_eq!(counter, Some(0));
    }

    #[tokio::test]
    async fn create_chat_for_unknown_token_is_not_found() {
        let harness = TestHarness::new().await.unwrap();
        let executor = JobExecutor::new(harness.sequencer.clone());

        let err = executor
            .execute(&Job::CreateChat {
                token: "missing".into(),
                number: 1,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TallyError::NotFound { .. }));
    }

    #[tokio::test]
    async fn create_message_twice_is_a_duplicate() {
        let harness = TestHarness::new().await.unwrap();
        let app = harness.application("acme").await.unwrap();
        let chat_id = harness.records.insert_chat(app.id, 1).await.unwrap();
        let executor = JobExecutor::new(harness.sequencer.clone());
        let job = Job::CreateMessage {
            chat_id,
            number: 1,
            body: "hello".into(),
        };

        executor.execute(&job).await.unwrap();
        let err = executor.execute(&job).await.unwrap_err();
        assert!(matches!(err, TallyError::DuplicateNumber { number: 1, .. }));
    }

    #[tokio::test]
    async fn update_counts_refreshes_denormalized_counts() {
        let harness = TestHarness::new().await.unwrap();
        let app = harness.application("acme").await.unwrap();
        let chat_id = harness.records.insert_chat(app.id, 1).await.unwrap();
        harness.records.insert_message(chat_id, 1, "a").await.unwrap();
        harness.records.insert_message(chat_id, 2, "b").await.unwrap();
        let executor = JobExecutor::new(harness.sequencer.clone());

        executor.execute(&Job::UpdateCounts).await.unwrap();

        let app = harness.records.find_application(&app.token).await.unwrap();
        let chat = harness.records.find_chat_by_id(chat_id).await.unwrap();
        assert_eq!(app.chats_count, 1);
        assert_eq!(chat.messages_count, 2);
    }
}
