// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row mapping for storage entities.
//!
//! The canonical types are defined in `tally-core::types`; this module maps
//! SQL rows onto them. Column order must match the `*_COLUMNS` constants.

use rusqlite::Row;

pub use tally_core::types::{Application, Chat, Message};

pub(crate) const APPLICATION_COLUMNS: &str = "id, name, token, chats_count";
pub(crate) const CHAT_COLUMNS: &str = "id, application_id, number, messages_count";
pub(crate) const MESSAGE_COLUMNS: &str = "id, chat_id, number, body";

pub(crate) fn application_from_row(row: &Row<'_>) -> rusqlite::Result<Application> {
    Ok(Application {
        id: row.get(0)?,
        name: row.get(1)?,
        token: row.get(2)?,
        chats_count: row.get(3)?,
    })
}

pub(crate) fn chat_from_row(row: &Row<'_>) -> rusqlite::Result<Chat> {
    Ok(Chat {
        id: row.get(0)?,
        application_id: row.get(1)?,
        number: row.get(2)?,
        messages_count: row.get(3)?,
    })
}

pub(crate) fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        number: row.get(2)?,
        body: row.get(3)?,
    })
}
