// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat operations.

use rusqlite::{OptionalExtension, params};
use tally_core::{SequenceNumber, TallyError};

use crate::database::{Database, Violation, map_tr_err, violation};
use crate::models::{CHAT_COLUMNS, Chat, chat_from_row};

/// Insert a chat under `application_id` with the issued `number`.
///
/// Returns the new chat id. A number already taken in the application
/// yields [`TallyError::DuplicateNumber`]; a missing application yields
/// [`TallyError::NotFound`].
pub async fn insert_chat(
    db: &Database,
    application_id: i64,
    number: SequenceNumber,
) -> Result<i64, TallyError> {
    db.connection()
        .call(move |conn| {
            match conn.execute(
                "INSERT INTO chats (application_id, number) VALUES (?1, ?2)",
                params![application_id, number],
            ) {
                Ok(_) => Ok(Ok(conn.last_insert_rowid())),
                Err(e) => match violation(&e) {
                    Some(Violation::Unique) => Ok(Err(TallyError::DuplicateNumber {
                        scope: format!("chats of application {application_id}"),
                        number,
                    })),
                    Some(Violation::ForeignKey) => Ok(Err(TallyError::NotFound {
                        entity: "Application",
                    })),
                    _ => Err(e),
                },
            }
        })
        .await
        .map_err(map_tr_err)?
}

/// Look up a chat by application token and chat number.
///
/// Distinguishes a missing application from a missing chat.
pub async fn find_chat(
    db: &Database,
    token: &str,
    number: SequenceNumber,
) -> Result<Chat, TallyError> {
    let token = token.to_string();
    db.connection()
        .call(move |conn| {
            let application_id: Option<i64> = conn
                .query_row(
                    "SELECT id FROM applications WHERE token = ?1",
                    params![token],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(application_id) = application_id else {
                return Ok(Err(TallyError::NotFound {
                    entity: "Application",
                }));
            };
            let chat = conn
                .query_row(
                    &format!(
                        "SELECT {CHAT_COLUMNS} FROM chats WHERE application_id = ?1 AND number = ?2"
                    ),
                    params![application_id, number],
                    chat_from_row,
                )
                .optional()?;
            Ok(chat.ok_or(TallyError::NotFound { entity: "Chat" }))
        })
        .await
        .map_err(map_tr_err)?
}

/// Look up a chat by row id.
pub async fn find_chat_by_id(db: &Database, chat_id: i64) -> Result<Chat, TallyError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {CHAT_COLUMNS} FROM chats WHERE id = ?1"),
                params![chat_id],
                chat_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)?
        .ok_or(TallyError::NotFound { entity: "Chat" })
}

/// Chats of an application ordered by number.
pub async fn list_chats(db: &Database, application_id: i64) -> Result<Vec<Chat>, TallyError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CHAT_COLUMNS} FROM chats WHERE application_id = ?1 ORDER BY number ASC"
            ))?;
            let rows = stmt.query_map(params![application_id], chat_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Highest persisted chat number of an application, zero when it has none.
pub async fn max_chat_number(
    db: &Database,
    application_id: i64,
) -> Result<SequenceNumber, TallyError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COALESCE(MAX(number), 0) FROM chats WHERE application_id = ?1",
                params![application_id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}
