use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

use crate::db::schema::messages;

/// A persisted chat message. Rows are immutable; snowflake IDs make
/// `ORDER BY id` equal to append order within a channel.
#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = messages)]
pub struct Message {
    pub id: i64,
    pub channel_id: String,
    /// Caller-declared sender identity, stamped by the session.
    pub client_id: String,
    pub body: String,
    /// Open string; "text" and "system" are the recognized values.
    pub kind: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = messages)]
pub struct NewMessage<'a> {
    pub id: i64,
    pub channel_id: &'a str,
    pub client_id: &'a str,
    pub body: &'a str,
    pub kind: &'a str,
    pub created_at: DateTime<Utc>,
}
