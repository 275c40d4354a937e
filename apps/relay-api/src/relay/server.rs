//! WebSocket upgrade route and per-connection task wiring.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::AppState;

use super::registry::Connection;
use super::session::RelaySession;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws/{channel_id}/{client_id}", get(ws_upgrade))
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Path((channel_id, client_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state, channel_id, client_id))
}

async fn handle_connection(
    socket: WebSocket,
    state: AppState,
    channel_id: String,
    client_id: String,
) {
    let (ws_tx, mut ws_rx) = socket.split();

    let (connection, outbound) = Connection::open(&client_id);
    let writer = tokio::spawn(forward_outbound(outbound, ws_tx));

    let session = RelaySession::new(channel_id, client_id, connection);

    tracing::info!(
        connection_id = session.connection.id(),
        channel_id = %session.channel_id,
        client_id = %session.client_id,
        "relay session established"
    );

    if let Err(err) = session.join(&state).await {
        tracing::warn!(
            error = %err,
            channel_id = %session.channel_id,
            client_id = %session.client_id,
            "join failed; closing session"
        );
        state
            .registry
            .deregister(&session.channel_id, session.connection.id());
        writer.abort();
        return;
    }

    match session.run(&state, &mut ws_rx).await {
        Ok(()) => tracing::info!(
            channel_id = %session.channel_id,
            client_id = %session.client_id,
            "relay session closed"
        ),
        Err(err) => tracing::debug!(
            error = %err,
            channel_id = %session.channel_id,
            client_id = %session.client_id,
            "relay session ended on transport error"
        ),
    }

    session.close(&state).await;

    // The session held the last queue sender; once it drops, the writer
    // drains whatever is in flight and exits.
    drop(session);
    let _ = writer.await;
}

/// Drains a connection's frame queue into the socket. Exits when the queue
/// closes or the peer stops accepting writes.
async fn forward_outbound(
    mut frames: mpsc::Receiver<String>,
    mut ws_tx: SplitSink<WebSocket, Message>,
) {
    while let Some(text) = frames.recv().await {
        if ws_tx.send(Message::Text(text.into())).await.is_err() {
            break;
        }
    }
    let _ = ws_tx.close().await;
}
