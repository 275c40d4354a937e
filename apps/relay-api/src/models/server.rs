use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::servers;

#[derive(Debug, Clone, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = servers)]
pub struct Server {
    pub id: String,
    pub name: String,
    /// Icon letter or URL shown in client sidebars.
    pub icon: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = servers)]
pub struct NewServer<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub icon: &'a str,
    pub created_at: DateTime<Utc>,
}
