//! The persistence boundary for servers, channels, and messages.
//!
//! The relay core only ever talks to storage through [`ChatStore`]: append a
//! message, list a channel's history, list servers/channels. Backed by
//! Postgres in production and an in-memory map in tests.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, OptionalExtension};

use relay_common::id::{prefix, prefixed_ulid};
use relay_common::SnowflakeGenerator;

use crate::db::pool::DbPool;
use crate::db::schema::{channels, messages, servers};
use crate::models::channel::{Channel, NewChannel};
use crate::models::message::{Message, NewMessage};
use crate::models::server::{NewServer, Server};

/// A storage operation that could not be completed.
#[derive(Debug)]
pub enum StoreError {
    /// The referenced server does not exist.
    UnknownServer(String),
    /// The referenced channel does not exist.
    UnknownChannel(String),
    /// The backing database rejected or failed the operation.
    Database(diesel::result::Error),
    /// No connection could be checked out of the pool.
    Pool(diesel_async::pooled_connection::deadpool::PoolError),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::UnknownServer(id) => write!(f, "server {id} does not exist"),
            StoreError::UnknownChannel(id) => write!(f, "channel {id} does not exist"),
            StoreError::Database(err) => write!(f, "database error: {err}"),
            StoreError::Pool(err) => write!(f, "connection pool error: {err}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Database(err) => Some(err),
            StoreError::Pool(err) => Some(err),
            _ => None,
        }
    }
}

impl From<diesel::result::Error> for StoreError {
    fn from(err: diesel::result::Error) -> Self {
        StoreError::Database(err)
    }
}

impl From<diesel_async::pooled_connection::deadpool::PoolError> for StoreError {
    fn from(err: diesel_async::pooled_connection::deadpool::PoolError) -> Self {
        StoreError::Pool(err)
    }
}

/// Narrow storage interface consumed by the relay core and the listing
/// endpoints.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Durably record one message and return the stored row, ID assigned.
    /// Fails with [`StoreError::UnknownChannel`] if the channel is missing.
    async fn append_message(
        &self,
        channel_id: &str,
        client_id: &str,
        body: &str,
        kind: &str,
    ) -> Result<Message, StoreError>;

    /// Full history of one channel in append order. Empty if the channel has
    /// no history.
    async fn list_messages(&self, channel_id: &str) -> Result<Vec<Message>, StoreError>;

    async fn list_channels(&self, server_id: &str) -> Result<Vec<Channel>, StoreError>;

    async fn list_servers(&self) -> Result<Vec<Server>, StoreError>;
}

// ---------------------------------------------------------------------------
// Postgres implementation
// ---------------------------------------------------------------------------

pub struct PgStore {
    db: DbPool,
    snowflake: SnowflakeGenerator,
}

impl PgStore {
    pub fn new(db: DbPool, worker_id: u16) -> Self {
        Self {
            db,
            snowflake: SnowflakeGenerator::new(worker_id),
        }
    }

    /// Create the demo servers and channels when the servers table is empty.
    pub async fn seed_if_empty(&self) -> Result<(), StoreError> {
        let mut conn = self.db.get().await?;

        let existing: i64 =
            diesel_async::RunQueryDsl::get_result(servers::table.count(), &mut conn).await?;
        if existing > 0 {
            return Ok(());
        }

        let defaults = [
            ("Gaming Hub", "G", ["general", "valorant", "minecraft"]),
            ("Coding Zone", "C", ["general", "python", "flutter"]),
        ];

        let now = Utc::now();
        for (name, icon, channel_names) in defaults {
            let server_id = prefixed_ulid(prefix::SERVER);
            diesel_async::RunQueryDsl::execute(
                diesel::insert_into(servers::table).values(NewServer {
                    id: &server_id,
                    name,
                    icon,
                    created_at: now,
                }),
                &mut conn,
            )
            .await?;

            for channel_name in channel_names {
                let channel_id = prefixed_ulid(prefix::CHANNEL);
                diesel_async::RunQueryDsl::execute(
                    diesel::insert_into(channels::table).values(NewChannel {
                        id: &channel_id,
                        server_id: &server_id,
                        name: channel_name,
                        created_at: now,
                    }),
                    &mut conn,
                )
                .await?;
            }
        }

        tracing::info!("seeded default servers and channels");
        Ok(())
    }
}

#[async_trait]
impl ChatStore for PgStore {
    async fn append_message(
        &self,
        channel_id: &str,
        client_id: &str,
        body: &str,
        kind: &str,
    ) -> Result<Message, StoreError> {
        let mut conn = self.db.get().await?;

        let id = self.snowflake.generate();
        diesel_async::RunQueryDsl::get_result(
            diesel::insert_into(messages::table)
                .values(NewMessage {
                    id,
                    channel_id,
                    client_id,
                    body,
                    kind,
                    created_at: Utc::now(),
                })
                .returning(Message::as_returning()),
            &mut conn,
        )
        .await
        .map_err(|err| match err {
            diesel::result::Error::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                StoreError::UnknownChannel(channel_id.to_string())
            }
            other => StoreError::Database(other),
        })
    }

    async fn list_messages(&self, channel_id: &str) -> Result<Vec<Message>, StoreError> {
        let mut conn = self.db.get().await?;

        let rows = diesel_async::RunQueryDsl::load(
            messages::table
                .filter(messages::channel_id.eq(channel_id))
                .order(messages::id.asc())
                .select(Message::as_select()),
            &mut conn,
        )
        .await?;

        Ok(rows)
    }

    async fn list_channels(&self, server_id: &str) -> Result<Vec<Channel>, StoreError> {
        let mut conn = self.db.get().await?;

        diesel_async::RunQueryDsl::get_result::<String>(
            servers::table.find(server_id).select(servers::id),
            &mut conn,
        )
        .await
        .optional()?
        .ok_or_else(|| StoreError::UnknownServer(server_id.to_string()))?;

        let rows = diesel_async::RunQueryDsl::load(
            channels::table
                .filter(channels::server_id.eq(server_id))
                .order(channels::id.asc())
                .select(Channel::as_select()),
            &mut conn,
        )
        .await?;

        Ok(rows)
    }

    async fn list_servers(&self) -> Result<Vec<Server>, StoreError> {
        let mut conn = self.db.get().await?;

        let rows = diesel_async::RunQueryDsl::load(
            servers::table.order(servers::id.asc()).select(Server::as_select()),
            &mut conn,
        )
        .await?;

        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation (tests and local development)
// ---------------------------------------------------------------------------

pub struct MemoryStore {
    servers: Mutex<Vec<Server>>,
    channels: Mutex<Vec<Channel>>,
    messages: Mutex<Vec<Message>>,
    next_message_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            servers: Mutex::new(Vec::new()),
            channels: Mutex::new(Vec::new()),
            messages: Mutex::new(Vec::new()),
            next_message_id: AtomicI64::new(1),
        }
    }

    pub fn add_server(&self, name: &str, icon: &str) -> Server {
        let server = Server {
            id: prefixed_ulid(prefix::SERVER),
            name: name.to_string(),
            icon: icon.to_string(),
            created_at: Utc::now(),
        };
        self.servers.lock().unwrap().push(server.clone());
        server
    }

    pub fn add_channel(&self, server_id: &str, name: &str) -> Channel {
        let channel = Channel {
            id: prefixed_ulid(prefix::CHANNEL),
            server_id: server_id.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        self.channels.lock().unwrap().push(channel.clone());
        channel
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn append_message(
        &self,
        channel_id: &str,
        client_id: &str,
        body: &str,
        kind: &str,
    ) -> Result<Message, StoreError> {
        let known = self
            .channels
            .lock()
            .unwrap()
            .iter()
            .any(|c| c.id == channel_id);
        if !known {
            return Err(StoreError::UnknownChannel(channel_id.to_string()));
        }

        let message = Message {
            id: self.next_message_id.fetch_add(1, Ordering::SeqCst),
            channel_id: channel_id.to_string(),
            client_id: client_id.to_string(),
            body: body.to_string(),
            kind: kind.to_string(),
            created_at: Utc::now(),
        };
        self.messages.lock().unwrap().push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, channel_id: &str) -> Result<Vec<Message>, StoreError> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.channel_id == channel_id)
            .cloned()
            .collect())
    }

    async fn list_channels(&self, server_id: &str) -> Result<Vec<Channel>, StoreError> {
        let known = self
            .servers
            .lock()
            .unwrap()
            .iter()
            .any(|s| s.id == server_id);
        if !known {
            return Err(StoreError::UnknownServer(server_id.to_string()));
        }

        Ok(self
            .channels
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.server_id == server_id)
            .cloned()
            .collect())
    }

    async fn list_servers(&self) -> Result<Vec<Server>, StoreError> {
        Ok(self.servers.lock().unwrap().clone())
    }
}
