// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Jobs and their queue wire format.
//!
//! A [`WorkItem`] is the JSON document pushed onto `queue:<name>`. Its layout
//! matches what Sidekiq workers consume, so either side of the queue can be
//! replaced independently.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use tally_core::{SequenceNumber, TallyError};

use crate::ids::new_jid;

/// The job classes understood by the worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum JobKind {
    CreateChatJob,
    CreateMessageJob,
    UpdateCountsJob,
}

/// A unit of deferred work with typed arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// Persist chat `number` under the application with `token`.
    CreateChat {
        token: String,
        number: SequenceNumber,
    },
    /// Persist message `number` with `body` under the chat with id `chat_id`.
    CreateMessage {
        chat_id: i64,
        number: SequenceNumber,
        body: String,
    },
    /// Recompute denormalized counts.
    UpdateCounts,
}

impl Job {
    pub fn kind(&self) -> JobKind {
        match self {
            Job::CreateChat { .. } => JobKind::CreateChatJob,
            Job::CreateMessage { .. } => JobKind::CreateMessageJob,
            Job::UpdateCounts => JobKind::UpdateCountsJob,
        }
    }

    /// Positional arguments as they appear in `args`.
    pub fn args(&self) -> Vec<Value> {
        match self {
            Job::CreateChat { token, number } => vec![token.clone().into(), (*number).into()],
            Job::CreateMessage {
                chat_id,
                number,
                body,
            } => vec![(*chat_id).into(), (*number).into(), body.clone().into()],
            Job::UpdateCounts => Vec::new(),
        }
    }

    /// Rebuild a job from its class name and positional arguments.
    pub fn from_parts(class: &str, args: &[Value]) -> Result<Self, TallyError> {
        let kind: JobKind = class
            .parse()
            .map_err(|_| TallyError::BadRequest(format!("unknown job class `{class}`")))?;
        let bad_args = || TallyError::BadRequest(format!("malformed arguments for {kind}"));
        match (kind, args) {
            (JobKind::CreateChatJob, [token, number]) => Ok(Job::CreateChat {
                token: token.as_str().ok_or_else(bad_args)?.to_string(),
                number: number.as_i64().ok_or_else(bad_args)?,
            }),
            (JobKind::CreateMessageJob, [chat_id, number, body]) => Ok(Job::CreateMessage {
                chat_id: chat_id.as_i64().ok_or_else(bad_args)?,
                number: number.as_i64().ok_or_else(bad_args)?,
                body: body.as_str().ok_or_else(bad_args)?.to_string(),
            }),
            (JobKind::UpdateCountsJob, []) => Ok(Job::UpdateCounts),
            _ => Err(bad_args()),
        }
    }
}

/// A job as it travels through the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub class: String,
    pub args: Vec<Value>,
    pub retry: bool,
    pub queue: String,
    pub jid: String,
    #[serde(deserialize_with = "unix_seconds")]
    pub created_at: i64,
    #[serde(deserialize_with = "unix_seconds")]
    pub enqueued_at: i64,
    /// Times the worker has re-queued this item after a transient failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
}

impl WorkItem {
    /// A fresh item for `job` on `queue`, with a new jid and current timestamps.
    pub fn new(job: &Job, queue: &str) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            class: job.kind().to_string(),
            args: job.args(),
            retry: true,
            queue: queue.to_string(),
            jid: new_jid(),
            created_at: now,
            enqueued_at: now,
            retry_count: None,
        }
    }

    pub fn job(&self) -> Result<Job, TallyError> {
        Job::from_parts(&self.class, &self.args)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    /// Number of re-queues so far.
    pub fn attempts(&self) -> u32 {
        self.retry_count.unwrap_or(0)
    }

    /// The same item prepared for another attempt: same jid, bumped
    /// `retry_count`, fresh `enqueued_at`.
    pub fn requeued(&self) -> Self {
        Self {
            retry_count: Some(self.attempts() + 1),
            enqueued_at: chrono::Utc::now().timestamp(),
            ..self.clone()
        }
    }
}

/// Accepts whole or fractional unix seconds; other producers write floats.
fn unix_seconds<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Whole(i64),
        Fractional(f64),
    }

    Ok(match Seconds::deserialize(deserializer)? {
        Seconds::Whole(s) => s,
        Seconds::Fractional(s) => s as i64,
    })
}
