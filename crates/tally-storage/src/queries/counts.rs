// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Denormalized count maintenance.

use tally_core::TallyError;
use tally_core::types::CountRefresh;

use crate::database::{Database, map_tr_err};

/// Recompute `applications.chats_count` and `chats.messages_count` from the rows.
///
/// Only rows whose stored count differs are touched; the returned totals
/// say how many were corrected.
pub async fn refresh_counts(db: &Database) -> Result<CountRefresh, TallyError> {
    db.connection()
        .call(|conn| {
            let tx = conn.transaction()?;
            let applications = tx.execute(
                "UPDATE applications
                 SET chats_count = (SELECT COUNT(*) FROM chats WHERE chats.application_id = applications.id),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE chats_count != (SELECT COUNT(*) FROM chats WHERE chats.application_id = applications.id)",
                [],
            )?;
            let chats = tx.execute(
                "UPDATE chats
                 SET messages_count = (SELECT COUNT(*) FROM messages WHERE messages.chat_id = chats.id),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE messages_count != (SELECT COUNT(*) FROM messages WHERE messages.chat_id = chats.id)",
                [],
            )?;
            tx.commit()?;
            Ok(CountRefresh {
                applications,
                chats,
            })
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::applications::{create_application, find_application};
    use crate::queries::chats::{find_chat, insert_chat};
    use crate::queries::messages::insert_message;
    use tempfile::tempdir;

    #[tokio::test]
    async fn counts_follow_rows() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap(), true).await.unwrap();

        let app = create_application(&db, "App", "tok").await.unwrap();
        let chat_id = insert_chat(&db, app.id, 1).await.unwrap();
        insert_chat(&db, app.id, 2).await.unwrap();
        insert_message(&db, chat_id, 1, "a").await.unwrap();
        insert_message(&db, chat_id, 2, "b").await.unwrap();
        insert_message(&db, chat_id, 3, "c").await.unwrap();

        let refresh = refresh_counts(&db).await.unwrap();
        assert_eq!(refresh, CountRefresh { applications: 1, chats: 1 });
        assert_eq!(find_application(&db, "tok").await.unwrap().chats_count, 2);
        assert_eq!(find_chat(&db, "tok", 1).await.unwrap().messages_count, 3);

        let again = refresh_counts(&db).await.unwrap();
        assert_eq!(again, CountRefresh::default());
    }
}
