// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use std::path::Path;

use rusqlite::ErrorCode;
use tally_core::TallyError;
use tokio_rusqlite::Connection;
use tracing::debug;

/// Handle to the single SQLite connection used by the record store.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path`, apply PRAGMAs and run migrations.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, TallyError> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| TallyError::Storage {
                    source: Box::new(e),
                })?;
            }
        }

        let conn = Connection::open(path)
            .await
            .map_err(|e| TallyError::Storage {
                source: Box::new(e),
            })?;

        let journal_mode = if wal_mode { "WAL" } else { "DELETE" };
        conn.call(move |conn| -> Result<Result<(), TallyError>, rusqlite::Error> {
            conn.execute_batch(&format!(
                "PRAGMA journal_mode = {journal_mode};
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;
                 PRAGMA synchronous = NORMAL;"
            ))?;
            Ok(crate::migrations::run_migrations(conn))
        })
        .await
        .map_err(map_tr_err)??;

        debug!(path, journal_mode, "database opened");
        Ok(Self { conn })
    }

    /// The underlying async connection. All query modules go through this.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Close the connection, flushing any pending statements.
    pub async fn close(self) -> Result<(), TallyError> {
        self.conn.close().await.map_err(|e| TallyError::Storage {
            source: Box::new(e),
        })
    }
}

/// Convert a tokio-rusqlite error into [`TallyError::Storage`].
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> TallyError {
    TallyError::Storage {
        source: Box::new(e),
    }
}

/// The kind of constraint a failed statement violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Violation {
    Unique,
    ForeignKey,
    Check,
}

/// Classify a rusqlite error as a constraint violation, if it is one.
pub(crate) fn violation(e: &rusqlite::Error) -> Option<Violation> {
    match e {
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
            match err.extended_code {
                rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => Some(Violation::Unique),
                rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Some(Violation::ForeignKey),
                rusqlite::ffi::SQLITE_CONSTRAINT_CHECK => Some(Violation::Check),
                _ => None,
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("tally.db");
        let db = Database::open(path.to_str().unwrap(), true).await.unwrap();

        let tables: Vec<String> = db
            .connection()
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table'
                     AND name IN ('applications', 'chats', 'messages') ORDER BY name",
                )?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect()
            })
            .await
            .unwrap();
        assert_eq!(tables, vec!["applications", "chats", "messages"]);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopening_skips_applied_migrations() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tally.db");
        let path = path.to_str().unwrap();
        Database::open(path, false).await.unwrap().close().await.unwrap();
        let db = Database::open(path, false).await.unwrap();
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tally.db");
        let db = Database::open(path.to_str().unwrap(), true).await.unwrap();

        let kind = db
            .connection()
            .call(|conn| -> Result<Option<Violation>, rusqlite::Error> {
                let err = conn
                    .execute("INSERT INTO chats (application_id, number) VALUES (999, 1)", [])
                    .unwrap_err();
                Ok(violation(&err))
            })
            .await
            .unwrap();
        assert_eq!(kind, Some(Violation::ForeignKey));
    }
}
