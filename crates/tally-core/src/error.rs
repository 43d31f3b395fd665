// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Tally numbering service.

use thiserror::Error;

/// The primary error type used across all Tally adapter traits and core operations.
#[derive(Debug, Error)]
pub enum TallyError {
    /// Configuration errors (invalid TOML, bad URLs, out-of-range values).
    #[error("configuration error: {0}")]
    Config(String),

    /// The requested application, chat, or message does not exist.
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    /// The request could not be decoded (malformed JSON, bad path segment).
    #[error("invalid request: {0}")]
    BadRequest(String),

    /// The request decoded but failed field validation.
    #[error("validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    /// Record store errors (connection, query failure, migrations).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Raw failure talking to the counter/queue store.
    #[error("counter store error: {source}")]
    CounterStore {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A sequence number could not be issued for the scope. Nothing was issued.
    #[error("counter unavailable for {scope}: {source}")]
    CounterUnavailable {
        scope: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A work item could not be serialized or pushed onto its queue.
    #[error("dispatch to {queue} failed: {message}")]
    Dispatch {
        queue: String,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A row already holds this number in its scope. Indicates the counter
    /// store and the record store have drifted apart.
    #[error("duplicate number {number} in {scope}")]
    DuplicateNumber { scope: String, number: i64 },

    /// A unique attribute other than a sequence number collided (e.g. a token).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A bounded store call did not finish in time.
    #[error("{operation} timed out after {duration:?}")]
    Timeout {
        operation: String,
        duration: std::time::Duration,
    },

    /// Adapter health check failed.
    #[error("health check failed for {name}: {source}")]
    HealthCheckFailed {
        name: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TallyError {
    /// Whether retrying the same operation later could succeed.
    ///
    /// Store outages and timeouts are transient; missing rows, validation
    /// failures and duplicate numbers are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TallyError::Storage { .. }
                | TallyError::CounterStore { .. }
                | TallyError::CounterUnavailable { .. }
                | TallyError::Dispatch { .. }
                | TallyError::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outages_are_transient() {
        let storage = TallyError::Storage {
            source: Box::new(std::io::Error::other("disk gone")),
        };
        let timeout = TallyError::Timeout {
            operation: "records.insert_chat".into(),
            duration: std::time::Duration::from_secs(5),
        };
        assert!(storage.is_transient());
        assert!(timeout.is_transient());
    }

    #[test]
    fn domain_failures_are_permanent() {
        assert!(!TallyError::NotFound { entity: "Chat" }.is_transient());
        assert!(!TallyError::Validation(vec![]).is_transient());
        assert!(
            !TallyError::DuplicateNumber {
                scope: "chat 1".into(),
                number: 1
            }
            .is_transient()
        );
    }
}
