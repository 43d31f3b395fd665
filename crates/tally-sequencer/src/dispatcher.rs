// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hand-off of jobs to the worker pool.

use std::sync::Arc;
use std::time::Duration;

use tally_core::{KeyValueStore, TallyError};
use tracing::debug;

use crate::deadline::bounded;
use crate::work_item::{Job, WorkItem};

/// List that receives items which exhausted their retries.
pub const DEAD_LIST: &str = "dead";

/// Serializes jobs into [`WorkItem`]s and pushes them onto `queue:<name>`.
///
/// Pushes go to the head of the list and workers pop from the tail, so each
/// queue is FIFO. Delivery is at-least-once.
#[derive(Clone)]
pub struct WorkDispatcher {
    store: Arc<dyn KeyValueStore>,
    queue: String,
    timeout: Duration,
}

impl WorkDispatcher {
    pub fn new(store: Arc<dyn KeyValueStore>, queue: impl Into<String>, timeout: Duration) -> Self {
        Self {
            store,
            queue: queue.into(),
            timeout,
        }
    }

    /// The queue name written into each item.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// The list key the queue lives under.
    pub fn queue_key(&self) -> String {
        format!("queue:{}", self.queue)
    }

    /// Enqueue `job` under a fresh jid and return that jid.
    pub async fn enqueue(&self, job: &Job) -> Result<String, TallyError> {
        let item = WorkItem::new(job, &self.queue);
        self.push(&item).await.inspect_err(|_| {
            tally_prometheus::record_dispatch_failure(&item.class);
        })?;
        debug!(jid = %item.jid, class = %item.class, queue = %self.queue, "job enqueued");
        Ok(item.jid)
    }

    /// Push an already-built item onto this dispatcher's queue.
    pub async fn push(&self, item: &WorkItem) -> Result<(), TallyError> {
        let key = self.queue_key();
        self.push_to(&key, item).await
    }

    /// Push an item onto the dead list.
    pub async fn bury(&self, item: &WorkItem) -> Result<(), TallyError> {
        self.push_to(DEAD_LIST, item).await
    }

    /// Push a payload that could not be decoded onto the dead list as-is.
    pub async fn bury_raw(&self, payload: &str) -> Result<(), TallyError> {
        bounded("dispatch.lpush", self.timeout, self.store.lpush(DEAD_LIST, payload))
            .await
            .map_err(|e| TallyError::Dispatch {
                queue: DEAD_LIST.to_string(),
                message: "failed to bury undecodable payload".to_string(),
                source: Some(Box::new(e)),
            })?;
        Ok(())
    }

    /// Take the oldest payload off this dispatcher's queue.
    pub async fn pop(&self) -> Result<Option<String>, TallyError> {
        let key = self.queue_key();
        bounded("dispatch.rpop", self.timeout, self.store.rpop(&key)).await
    }

    async fn push_to(&self, list: &str, item: &WorkItem) -> Result<(), TallyError> {
        let payload = item.to_json().map_err(|e| TallyError::Dispatch {
            queue: list.to_string(),
            message: format!("failed to serialize {}", item.class),
            source: Some(Box::new(e)),
        })?;
        bounded("dispatch.lpush", self.timeout, self.store.lpush(list, &payload))
            .await
            .map_err(|e| TallyError::Dispatch {
                queue: list.to_string(),
                message: format!("failed to push {} {}", item.class, item.jid),
                source: Some(Box::new(e)),
            })?;
        Ok(())
    }
}
