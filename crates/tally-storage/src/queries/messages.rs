// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message operations.

use rusqlite::{OptionalExtension, params};
use tally_core::{SequenceNumber, TallyError};

use crate::database::{Database, Violation, map_tr_err, violation};
use crate::models::{MESSAGE_COLUMNS, Message, message_from_row};

fn blank_body() -> TallyError {
    TallyError::Validation(vec!["Body can't be blank".to_string()])
}

/// Insert a message under `chat_id` with the issued `number`.
///
/// Returns the new message id. A number already taken in the chat yields
/// [`TallyError::DuplicateNumber`]; a missing chat yields [`TallyError::NotFound`].
pub async fn insert_message(
    db: &Database,
    chat_id: i64,
    number: SequenceNumber,
    body: &str,
) -> Result<i64, TallyError> {
    let body = body.to_string();
    db.connection()
        .call(move |conn| {
            match conn.execute(
                "INSERT INTO messages (chat_id, number, body) VALUES (?1, ?2, ?3)",
                params![chat_id, number, body],
            ) {
                Ok(_) => Ok(Ok(conn.last_insert_rowid())),
                Err(e) => match violation(&e) {
                    Some(Violation::Unique) => Ok(Err(TallyError::DuplicateNumber {
                        scope: format!("messages of chat {chat_id}"),
                        number,
                    })),
                    Some(Violation::ForeignKey) => {
                        Ok(Err(TallyError::NotFound { entity: "Chat" }))
                    }
                    Some(Violation::Check) => Ok(Err(blank_body())),
                    None => Err(e),
                },
            }
        })
        .await
        .map_err(map_tr_err)?
}

/// Look up a message by chat id and number.
pub async fn find_message(
    db: &Database,
    chat_id: i64,
    number: SequenceNumber,
) -> Result<Message, TallyError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE chat_id = ?1 AND number = ?2"),
                params![chat_id, number],
                message_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)?
        .ok_or(TallyError::NotFound { entity: "Message" })
}

/// Messages of a chat ordered by number.
pub async fn list_messages(db: &Database, chat_id: i64) -> Result<Vec<Message>, TallyError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE chat_id = ?1 ORDER BY number ASC"
            ))?;
            let rows = stmt.query_map(params![chat_id], message_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Messages of a chat whose body contains `query`, ignoring ASCII case.
///
/// Uses `instr` rather than `LIKE` so `%` and `_` in the query match literally.
pub async fn search_messages(
    db: &Database,
    chat_id: i64,
    query: &str,
) -> Result<Vec<Message>, TallyError> {
    let query = query.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE chat_id = ?1 AND instr(lower(body), lower(?2)) > 0
                 ORDER BY number ASC"
            ))?;
            let rows = stmt.query_map(params![chat_id, query], message_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Replace the body of an existing message.
pub async fn update_message_body(
    db: &Database,
    chat_id: i64,
    number: SequenceNumber,
    body: &str,
) -> Result<Message, TallyError> {
    let body = body.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "UPDATE messages
                 SET body = ?3, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE chat_id = ?1 AND number = ?2
                 RETURNING {MESSAGE_COLUMNS}"
            );
            match conn
                .query_row(&sql, params![chat_id, number, body], message_from_row)
                .optional()
            {
                Ok(Some(message)) => Ok(Ok(message)),
                Ok(None) => Ok(Err(TallyError::NotFound { entity: "Message" })),
                Err(e) if violation(&e) == Some(Violation::Check) => Ok(Err(blank_body())),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)?
}

/// Highest persisted message number of a chat, zero when it has none.
pub async fn max_message_number(
    db: &Database,
    chat_id: i64,
) -> Result<SequenceNumber, TallyError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COALESCE(MAX(number), 0) FROM messages WHERE chat_id = ?1",
                params![chat_id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::applications::create_application;
    use crate::queries::chats::insert_chat;
    use tempfile::tempdir;

    async fn setup_db_with_chat() -> (Database, i64, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap(), true).await.unwrap();
        let app = create_application(&db, "App", "tok").await.unwrap();
        let chat_id = insert_chat(&db, app.id, 1).await.unwrap();
        (db, chat_id, dir)
    }

    #[tokio::test]
    async fn insert_and_list_in_number_order() {
        let (db, chat_id, _dir) = setup_db_with_chat().await;
        insert_message(&db, chat_id, 2, "second").await.unwrap();
        insert_message(&db, chat_id, 1, "first").await.unwrap();

        let messages = list_messages(&db, chat_id).await.unwrap();
        let bodies: Vec<_> = messages.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["first", "second"]);
        assert_eq!(max_message_number(&db, chat_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn duplicate_number_in_same_chat_is_rejected() {
        let (db, chat_id, _dir) = setup_db_with_chat().await;
        insert_message(&db, chat_id, 1, "hello").await.unwrap();
        let err = insert_message(&db, chat_id, 1, "again").await.unwrap_err();
        assert!(matches!(err, TallyError::DuplicateNumber { number: 1, .. }));
    }

    #[tokio::test]
    async fn insert_into_missing_chat_is_not_found() {
        let (db, _chat_id, _dir) = setup_db_with_chat().await;
        let err = insert_message(&db, 4242, 1, "hello").await.unwrap_err();
        assert!(matches!(err, TallyError::NotFound { entity: "Chat" }));
    }

    #[tokio::test]
    async fn whitespace_body_is_rejected() {
        let (db, chat_id, _dir) = setup_db_with_chat().await;
        let err = insert_message(&db, chat_id, 1, " \t ").await.unwrap_err();
        assert!(matches!(err, TallyError::Validation(_)));
    }

    #[tokio::test]
    async fn search_is_case_insensitive_and_literal() {
        let (db, chat_id, _dir) = setup_db_with_chat().await;
        insert_message(&db, chat_id, 1, "Hello World").await.unwrap();
        insert_message(&db, chat_id, 2, "goodbye").await.unwrap();
        insert_message(&db, chat_id, 3, "100% hello").await.unwrap();

        let hits = search_messages(&db, chat_id, "HELLO").await.unwrap();
        let numbers: Vec<_> = hits.iter().map(|m| m.number).collect();
        assert_eq!(numbers, vec![1, 3]);

        let hits = search_messages(&db, chat_id, "%").await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn update_body_and_missing_message() {
        let (db, chat_id, _dir) = setup_db_with_chat().await;
        insert_message(&db, chat_id, 1, "draft").await.unwrap();

        let updated = update_message_body(&db, chat_id, 1, "final").await.unwrap();
        assert_eq!(updated.body, "final");
        assert_eq!(find_message(&db, chat_id, 1).await.unwrap().body, "final");

        let err = update_message_body(&db, chat_id, 9, "x").await.unwrap_err();
        assert!(matches!(err, TallyError::NotFound { entity: "Message" }));

        let err = update_message_body(&db, chat_id, 1, "").await.unwrap_err();
        assert!(matches!(err, TallyError::Validation(_)));
    }
}
