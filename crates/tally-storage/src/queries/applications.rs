// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Application operations.

use rusqlite::{OptionalExtension, params};
use tally_core::TallyError;

use crate::database::{Database, Violation, map_tr_err, violation};
use crate::models::{APPLICATION_COLUMNS, Application, application_from_row};

/// Insert a new application with a zero chat count.
pub async fn create_application(
    db: &Database,
    name: &str,
    token: &str,
) -> Result<Application, TallyError> {
    let name = name.to_string();
    let token = token.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "INSERT INTO applications (name, token) VALUES (?1, ?2)
                 RETURNING {APPLICATION_COLUMNS}"
            );
            match conn.query_row(&sql, params![name, token], application_from_row) {
                Ok(app) => Ok(Ok(app)),
                Err(e) => match violation(&e) {
                    Some(Violation::Unique) => Ok(Err(TallyError::Conflict(format!(
                        "application token {token} is already taken"
                    )))),
                    Some(Violation::Check) => Ok(Err(TallyError::Validation(vec![
                        "Name can't be blank".to_string(),
                    ]))),
                    _ => Err(e),
                },
            }
        })
        .await
        .map_err(map_tr_err)?
}

/// All applications in creation order.
pub async fn list_applications(db: &Database) -> Result<Vec<Application>, TallyError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {APPLICATION_COLUMNS} FROM applications ORDER BY id ASC"
            ))?;
            let rows = stmt.query_map([], application_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Look up an application by its external token.
pub async fn find_application(db: &Database, token: &str) -> Result<Application, TallyError> {
    let token = token.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {APPLICATION_COLUMNS} FROM applications WHERE token = ?1"),
                params![token],
                application_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)?
        .ok_or(TallyError::NotFound {
            entity: "Application",
        })
}

/// Change an application's name.
pub async fn rename_application(
    db: &Database,
    token: &str,
    name: &str,
) -> Result<Application, TallyError> {
    let token = token.to_string();
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "UPDATE applications
                 SET name = ?2, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE token = ?1
                 RETURNING {APPLICATION_COLUMNS}"
            );
            match conn
                .query_row(&sql, params![token, name], application_from_row)
                .optional()
            {
                Ok(Some(app)) => Ok(Ok(app)),
                Ok(None) => Ok(Err(TallyError::NotFound {
                    entity: "Application",
                })),
                Err(e) if violation(&e) == Some(Violation::Check) => Ok(Err(
                    TallyError::Validation(vec!["Name can't be blank".to_string()]),
                )),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap(), true).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn create_and_find_application() {
        let (db, _dir) = setup_db().await;
        let created = create_application(&db, "Support", "0123456789abcdef0123")
            .await
            .unwrap();
        assert_eq!(created.name, "Support");
        assert_eq!(created.chats_count, 0);

        let found = find_application(&db, "0123456789abcdef0123").await.unwrap();
        assert_eq!(found, created);
    }

    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let (db, _dir) = setup_db().await;
        let err = find_application(&db, "nope").await.unwrap_err();
        assert!(matches!(err, TallyError::NotFound { entity: "Application" }));
    }

    #[tokio::test]
    async fn duplicate_token_is_a_conflict() {
        let (db, _dir) = setup_db().await;
        create_application(&db, "One", "tok").await.unwrap();
        let err = create_application(&db, "Two", "tok").await.unwrap_err();
        assert!(matches!(err, TallyError::Conflict(_)));
    }

    #[tokio::test]
    async fn blank_name_is_rejected_by_the_schema() {
        let (db, _dir) = setup_db().await;
        let err = create_application(&db, "   ", "tok").await.unwrap_err();
        assert!(matches!(err, TallyError::Validation(_)));
    }

    #[tokio::test]
    async fn rename_and_list() {
        let (db, _dir) = setup_db().await;
        create_application(&db, "Old", "a").await.unwrap();
        create_application(&db, "Other", "b").await.unwrap();

        let renamed = rename_application(&db, "a", "New").await.unwrap();
        assert_eq!(renamed.name, "New");

        let all = list_applications(&db).await.unwrap();
        let names: Vec<_> = all.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["New", "Other"]);

        let err = rename_application(&db, "missing", "x").await.unwrap_err();
        assert!(matches!(err, TallyError::NotFound { .. }));
    }
}
