// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The numbering pipeline: validate scope, increment, complete.
//!
//! Every create operation follows the same order. The owning scope is
//! looked up in the record store first, then the scope counter is
//! incremented, then the number is completed either by inserting the row
//! ([`CompletionStrategy::PersistDirectly`]) or by dispatching a job
//! ([`CompletionStrategy::DispatchAsync`]). Issued numbers are never
//! returned to the counter; a failed completion leaves a gap.

use std::sync::Arc;
use std::time::Duration;

use tally_config::{CompletionMode, TallyConfig};
use tally_core::types::{Application, Chat, HealthStatus, Message};
use tally_core::{KeyValueStore, PluginAdapter, RecordStore, ScopeKey, SequenceNumber, TallyError};
use tracing::{error, info, warn};

use crate::counter::ScopeCounter;
use crate::deadline::bounded;
use crate::dispatcher::WorkDispatcher;
use crate::ids::new_token;
use crate::work_item::Job;

/// Attempts at generating an unused application token.
const TOKEN_ATTEMPTS: usize = 3;

/// How an issued number becomes a persisted row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStrategy {
    /// Insert the row before responding.
    PersistDirectly,
    /// Push a job for the worker pool and respond immediately.
    DispatchAsync,
}

impl From<CompletionMode> for CompletionStrategy {
    fn from(mode: CompletionMode) -> Self {
        match mode {
            CompletionMode::Persist => CompletionStrategy::PersistDirectly,
            CompletionMode::Dispatch => CompletionStrategy::DispatchAsync,
        }
    }
}

/// What happened to an issued number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The row exists with this id.
    Persisted { id: i64 },
    /// A job carrying the number was queued under this jid.
    Dispatched { jid: String },
}

/// A number issued for a new chat or message, and how it was completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issued {
    pub number: SequenceNumber,
    pub completion: Completion,
}

impl Issued {
    pub fn is_persisted(&self) -> bool {
        matches!(self.completion, Completion::Persisted { .. })
    }
}

/// Tunables of the pipeline.
#[derive(Debug, Clone)]
pub struct SequencerSettings {
    pub strategy: CompletionStrategy,
    pub queue: String,
    pub counter_timeout: Duration,
    pub storage_timeout: Duration,
}

impl SequencerSettings {
    pub fn from_config(config: &TallyConfig) -> Self {
        Self {
            strategy: config.dispatch.completion.into(),
            queue: config.dispatch.queue.clone(),
            counter_timeout: Duration::from_millis(config.counter.call_timeout_ms),
            storage_timeout: Duration::from_millis(config.storage.call_timeout_ms),
        }
    }
}

impl Default for SequencerSettings {
    fn default() -> Self {
        Self::from_config(&TallyConfig::default())
    }
}

/// Shared handle to the numbering pipeline. Cheap to clone.
#[derive(Clone)]
pub struct Sequencer {
    inner: Arc<Inner>,
}

struct Inner {
    records: Arc<dyn RecordStore>,
    kv: Arc<dyn KeyValueStore>,
    counter: ScopeCounter,
    dispatcher: WorkDispatcher,
    strategy: CompletionStrategy,
    counter_timeout: Duration,
    storage_timeout: Duration,
}

impl Sequencer {
    pub fn new(
        records: Arc<dyn RecordStore>,
        kv: Arc<dyn KeyValueStore>,
        settings: SequencerSettings,
    ) -> Self {
        let counter = ScopeCounter::new(kv.clone(), settings.counter_timeout);
        let dispatcher = WorkDispatcher::new(kv.clone(), settings.queue, settings.counter_timeout);
        Self {
            inner: Arc::new(Inner {
                records,
                kv,
                counter,
                dispatcher,
                strategy: settings.strategy,
                counter_timeout: settings.counter_timeout,
                storage_timeout: settings.storage_timeout,
            }),
        }
    }

    pub fn strategy(&self) -> CompletionStrategy {
        self.inner.strategy
    }

    pub fn records(&self) -> &Arc<dyn RecordStore> {
        &self.inner.records
    }

    pub fn counter(&self) -> &ScopeCounter {
        &self.inner.counter
    }

    pub fn dispatcher(&self) -> &WorkDispatcher {
        &self.inner.dispatcher
    }

    /// Deadline applied to record store calls.
    pub fn storage_timeout(&self) -> Duration {
        self.inner.storage_timeout
    }

    // --- Applications ---

    /// Create an application under a fresh token.
    ///
    /// The chat counter of the new token is raised to the highest persisted
    /// chat number so numbering continues after any existing rows.
    pub async fn create_application(&self, name: Option<&str>) -> Result<Application, TallyError> {
        let name = required(name, "Name can't be blank")?;
        let records = &self.inner.records;

        let mut attempt = 0;
        let application = loop {
            attempt += 1;
            let token = new_token();
            match self
                .storage("records.create_application", records.create_application(name, &token))
                .await
            {
                Err(TallyError::Conflict(reason)) if attempt < TOKEN_ATTEMPTS => {
                    warn!(attempt, %reason, "token collision, retrying");
                }
                other => break other?,
            }
        };

        let max = self
            .storage("records.max_chat_number", records.max_chat_number(application.id))
            .await?;
        let scope = ScopeKey::chats_of(&application.token);
        if let Err(e) = self.inner.counter.reset(&scope, max).await {
            warn!(scope = %scope, error = %e, "could not initialize chat counter");
        }

        info!(token = %application.token, "application created");
        Ok(application)
    }

    pub async fn list_applications(&self) -> Result<Vec<Application>, TallyError> {
        self.storage("records.list_applications", self.inner.records.list_applications())
            .await
    }

    pub async fn find_application(&self, token: &str) -> Result<Application, TallyError> {
        self.storage("records.find_application", self.inner.records.find_application(token))
            .await
    }

    pub async fn rename_application(
        &self,
        application: &Application,
        name: Option<&str>,
    ) -> Result<Application, TallyError> {
        let name = required(name, "Name can't be blank")?;
        self.storage(
            "records.rename_application",
            self.inner.records.rename_application(&application.token, name),
        )
        .await
    }

    // --- Chats ---

    /// Issue the next chat number of `application` and complete it.
    pub async fn create_chat(&self, application: &Application) -> Result<Issued, TallyError> {
        let scope = ScopeKey::chats_of(&application.token);
        let number = self.inner.counter.increment(&scope).await?;
        tally_prometheus::record_sequence_issued("chat");

        let this = self.clone();
        let application = application.clone();
        let completion = tokio::spawn(async move {
            let outcome = this.complete_chat(&application, number).await;
            if let Err(e) = &outcome {
                report_gap(&ScopeKey::chats_of(&application.token), "chat", number, e);
            }
            outcome
        })
        .await
        .map_err(|e| TallyError::Internal(format!("chat completion task failed: {e}")))??;

        Ok(Issued { number, completion })
    }

    async fn complete_chat(
        &self,
        application: &Application,
        number: SequenceNumber,
    ) -> Result<Completion, TallyError> {
        match self.inner.strategy {
            CompletionStrategy::PersistDirectly => {
                let id = self
                    .storage(
                        "records.insert_chat",
                        self.inner.records.insert_chat(application.id, number),
                    )
                    .await?;
                let scope = ScopeKey::messages_of(id);
                if let Err(e) = self.inner.counter.reset(&scope, 0).await {
                    warn!(scope = %scope, error = %e, "could not initialize message counter");
                }
                Ok(Completion::Persisted { id })
            }
            CompletionStrategy::DispatchAsync => {
                let job = Job::CreateChat {
                    token: application.token.clone(),
                    number,
                };
                let jid = self.inner.dispatcher.enqueue(&job).await?;
                Ok(Completion::Dispatched { jid })
            }
        }
    }

    pub async fn list_chats(&self, application: &Application) -> Result<Vec<Chat>, TallyError> {
        self.storage("records.list_chats", self.inner.records.list_chats(application.id))
            .await
    }

    pub async fn find_chat(&self, token: &str, number: SequenceNumber) -> Result<Chat, TallyError> {
        self.storage("records.find_chat", self.inner.records.find_chat(token, number))
            .await
    }

    // --- Messages ---

    /// Issue the next message number of `chat` and complete it.
    ///
    /// A blank body is rejected before the counter is touched.
    pub async fn create_message(
        &self,
        chat: &Chat,
        body: Option<&str>,
    ) -> Result<Issued, TallyError> {
        let body = required(body, "Body can't be blank")?.to_string();
        let scope = ScopeKey::messages_of(chat.id);
        let number = self.inner.counter.increment(&scope).await?;
        tally_prometheus::record_sequence_issued("message");

        let this = self.clone();
        let chat_id = chat.id;
        let completion = tokio::spawn(async move {
            let outcome = this.complete_message(chat_id, number, body).await;
            if let Err(e) = &outcome {
                report_gap(&ScopeKey::messages_of(chat_id), "message", number, e);
            }
            outcome
        })
        .await
        .map_err(|e| TallyError::Internal(format!("message completion task failed: {e}")))??;

        Ok(Issued { number, completion })
    }

    async fn complete_message(
        &self,
        chat_id: i64,
        number: SequenceNumber,
        body: String,
    ) -> Result<Completion, TallyError> {
        match self.inner.strategy {
            CompletionStrategy::PersistDirectly => {
                let id = self
                    .storage(
                        "records.insert_message",
                        self.inner.records.insert_message(chat_id, number, &body),
                    )
                    .await?;
                Ok(Completion::Persisted { id })
            }
            CompletionStrategy::DispatchAsync => {
                let job = Job::CreateMessage {
                    chat_id,
                    number,
                    body,
                };
                let jid = self.inner.dispatcher.enqueue(&job).await?;
                Ok(Completion::Dispatched { jid })
            }
        }
    }

    pub async fn list_messages(&self, chat: &Chat) -> Result<Vec<Message>, TallyError> {
        self.storage("records.list_messages", self.inner.records.list_messages(chat.id))
            .await
    }

    pub async fn find_message(
        &self,
        chat: &Chat,
        number: SequenceNumber,
    ) -> Result<Message, TallyError> {
        self.storage(
            "records.find_message",
            self.inner.records.find_message(chat.id, number),
        )
        .await
    }

    /// Messages of `chat` containing `query`, ignoring case.
    pub async fn search_messages(
        &self,
        chat: &Chat,
        query: Option<&str>,
    ) -> Result<Vec<Message>, TallyError> {
        let query = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| TallyError::BadRequest("Query parameter is required".to_string()))?;
        self.storage(
            "records.search_messages",
            self.inner.records.search_messages(chat.id, query),
        )
        .await
    }

    pub async fn update_message(
        &self,
        chat: &Chat,
        number: SequenceNumber,
        body: Option<&str>,
    ) -> Result<Message, TallyError> {
        let body = required(body, "Body can't be blank")?;
        self.storage(
            "records.update_message_body",
            self.inner.records.update_message_body(chat.id, number, body),
        )
        .await
    }

    // --- Health ---

    /// Health of both stores, each bounded by its call deadline.
    pub async fn health(&self) -> Vec<(String, HealthStatus)> {
        let records = &self.inner.records;
        let kv = &self.inner.kv;
        let (record_health, kv_health) = tokio::join!(
            bounded("records.health", self.inner.storage_timeout, records.health_check()),
            bounded("counter.health", self.inner.counter_timeout, kv.health_check()),
        );
        vec![
            (records.name().to_string(), as_status(record_health)),
            (kv.name().to_string(), as_status(kv_health)),
        ]
    }

    async fn storage<T, F>(&self, operation: &'static str, call: F) -> Result<T, TallyError>
    where
        F: std::future::Future<Output = Result<T, TallyError>>,
    {
        bounded(operation, self.inner.storage_timeout, call).await
    }
}

fn as_status(result: Result<HealthStatus, TallyError>) -> HealthStatus {
    result.unwrap_or_else(|e| HealthStatus::Unhealthy(e.to_string()))
}

/// `value` unless it is missing or whitespace-only.
fn required<'a>(value: Option<&'a str>, message: &str) -> Result<&'a str, TallyError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(TallyError::Validation(vec![message.to_string()])),
    }
}

/// Log a number that was issued but not completed.
fn report_gap(scope: &ScopeKey, kind: &'static str, number: SequenceNumber, e: &TallyError) {
    match e {
        TallyError::DuplicateNumber { .. } => {
            tally_prometheus::record_duplicate_number(kind);
            error!(
                scope = %scope,
                number,
                error = %e,
                "counter and record store disagree: number already persisted"
            );
        }
        _ => {
            warn!(scope = %scope, number, error = %e, "issued number left unused");
        }
    }
}
