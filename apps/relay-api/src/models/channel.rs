use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::channels;

#[derive(Debug, Clone, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = channels)]
pub struct Channel {
    pub id: String,
    pub server_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = channels)]
pub struct NewChannel<'a> {
    pub id: &'a str,
    pub server_id: &'a str,
    pub name: &'a str,
    pub created_at: DateTime<Utc>,
}
