//! Per-connection session lifecycle: join with history replay, the relay
//! loop, and teardown.
//!
//! A session moves through three states. Joining registers the connection
//! and replays history; the relay loop persists and fans out inbound frames
//! one at a time; teardown deregisters and announces the departure. There is
//! no reconnection: a new connection is a new session.

use std::fmt;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitStream;
use futures_util::StreamExt;

use crate::db::store::StoreError;
use crate::AppState;

use super::frames::{InboundFrame, OutboundFrame};
use super::registry::{Connection, DeliveryError};

/// The session's transport stopped being usable.
#[derive(Debug)]
pub enum TransportError {
    /// A frame arrived that doesn't parse as the inbound shape.
    Malformed(serde_json::Error),
    /// The underlying socket read failed.
    Read(axum::Error),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Malformed(err) => write!(f, "malformed inbound frame: {err}"),
            TransportError::Read(err) => write!(f, "socket read failed: {err}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// A failure while bringing the session up.
#[derive(Debug)]
pub enum JoinError {
    Persistence(StoreError),
    Delivery(DeliveryError),
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinError::Persistence(err) => write!(f, "history fetch failed: {err}"),
            JoinError::Delivery(err) => write!(f, "history replay failed: {err}"),
        }
    }
}

impl std::error::Error for JoinError {}

impl From<StoreError> for JoinError {
    fn from(err: StoreError) -> Self {
        JoinError::Persistence(err)
    }
}

impl From<DeliveryError> for JoinError {
    fn from(err: DeliveryError) -> Self {
        JoinError::Delivery(err)
    }
}

/// State for one client's connection to one channel.
pub struct RelaySession {
    pub channel_id: String,
    pub client_id: String,
    pub connection: Connection,
}

impl RelaySession {
    pub fn new(channel_id: String, client_id: String, connection: Connection) -> Self {
        Self {
            channel_id,
            client_id,
            connection,
        }
    }

    /// Register with the registry and queue the channel's full history, in
    /// persistence order, ahead of any live traffic.
    ///
    /// Runs under the channel's publish lock, so no append can interleave:
    /// every message is either in the replayed prefix or delivered live after
    /// it, never both and never neither.
    pub async fn join(&self, state: &AppState) -> Result<(), JoinError> {
        let _publish = state.registry.publish_lock(&self.channel_id).await;

        state
            .registry
            .register(&self.channel_id, self.connection.clone());

        let history = state.store.list_messages(&self.channel_id).await?;
        let replayed = history.len();
        for message in &history {
            let frame = OutboundFrame::from_message(message);
            self.connection.deliver(frame.encode()).await?;
        }

        tracing::debug!(
            channel_id = %self.channel_id,
            client_id = %self.client_id,
            replayed,
            "history replay queued"
        );
        Ok(())
    }

    /// The relay loop: process inbound frames until the transport goes away.
    /// Returns Ok on an orderly close.
    pub async fn run(
        &self,
        state: &AppState,
        ws_rx: &mut SplitStream<WebSocket>,
    ) -> Result<(), TransportError> {
        while let Some(next) = ws_rx.next().await {
            let msg = next.map_err(TransportError::Read)?;

            let text = match msg {
                Message::Text(text) => text,
                Message::Close(_) => return Ok(()),
                Message::Ping(_) | Message::Pong(_) => continue,
                _ => continue,
            };

            let frame: InboundFrame =
                serde_json::from_str(&text).map_err(TransportError::Malformed)?;
            self.relay(state, frame).await;
        }
        Ok(())
    }

    /// Persist one inbound frame, stamped with this session's client_id, then
    /// fan it out. The channel's publish lock is held across both steps so
    /// the append sequence equals the broadcast sequence.
    ///
    /// A failed append drops the frame and keeps the session alive; nothing
    /// is broadcast that was not durably recorded first, and the sender gets
    /// no error frame.
    async fn relay(&self, state: &AppState, frame: InboundFrame) {
        let _publish = state.registry.publish_lock(&self.channel_id).await;

        match state
            .store
            .append_message(&self.channel_id, &self.client_id, &frame.message, &frame.kind)
            .await
        {
            Ok(message) => {
                state
                    .broadcaster
                    .broadcast(&self.channel_id, &OutboundFrame::from_message(&message))
                    .await;
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    channel_id = %self.channel_id,
                    client_id = %self.client_id,
                    "append failed; inbound frame dropped"
                );
            }
        }
    }

    /// Deregister, then announce the departure to whoever is left. The notice
    /// is best-effort and never persisted. The session is done afterwards.
    pub async fn close(&self, state: &AppState) {
        state
            .registry
            .deregister(&self.channel_id, self.connection.id());

        let _publish = state.registry.publish_lock(&self.channel_id).await;
        state
            .broadcaster
            .broadcast(&self.channel_id, &OutboundFrame::departure(&self.client_id))
            .await;
    }
}
