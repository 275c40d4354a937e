mod common;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::time;
use tokio_tungstenite::tungstenite;

use relay_api::db::store::{ChatStore, MemoryStore, StoreError};
use relay_api::models::channel::Channel;
use relay_api::models::message::Message;
use relay_api::models::server::Server;
use relay_api::AppState;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Helper: start an actual TCP server for WebSocket testing.
/// The server runs in the background.
async fn start_ws_server(state: AppState) -> SocketAddr {
    let app = common::test_app(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

async fn connect(addr: SocketAddr, channel_id: &str, client_id: &str) -> WsStream {
    let url = format!("ws://{addr}/ws/{channel_id}/{client_id}");
    let (ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");
    ws
}

/// Wait until the channel has at least `count` registered members. Joining
/// happens server-side after the HTTP upgrade completes, so tests must not
/// assume a freshly connected client is registered yet.
async fn wait_for_members(state: &AppState, channel_id: &str, count: usize) {
    let deadline = time::Instant::now() + Duration::from_secs(5);
    while state.registry.member_count(channel_id) < count {
        assert!(
            time::Instant::now() < deadline,
            "timed out waiting for {count} members in {channel_id}"
        );
        time::sleep(Duration::from_millis(10)).await;
    }
}

async fn send_frame(ws: &mut WsStream, message: &str, kind: &str) {
    let frame = serde_json::json!({ "message": message, "type": kind });
    ws.send(tungstenite::Message::Text(frame.to_string().into()))
        .await
        .expect("send frame");
}

async fn recv_frame(ws: &mut WsStream) -> serde_json::Value {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for frame")
            .expect("stream ended")
            .expect("ws read error");
        if let tungstenite::Message::Text(text) = msg {
            return serde_json::from_str(&text).expect("parse frame");
        }
    }
}

async fn expect_no_frame(ws: &mut WsStream) {
    let got = time::timeout(Duration::from_millis(300), ws.next()).await;
    assert!(got.is_err(), "expected no frame, got {got:?}");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn message_reaches_sender_and_peers() {
    let (state, _store, seeded) = common::test_state();
    let addr = start_ws_server(state.clone()).await;
    let channel = &seeded.channel_id;

    let mut a = connect(addr, channel, "A").await;
    wait_for_members(&state, channel, 1).await;
    let mut b = connect(addr, channel, "B").await;
    wait_for_members(&state, channel, 2).await;

    send_frame(&mut a, "hi", "text").await;

    let expected = serde_json::json!({ "client_id": "A", "message": "hi", "type": "text" });
    assert_eq!(recv_frame(&mut a).await, expected);
    assert_eq!(recv_frame(&mut b).await, expected);
}

#[tokio::test]
async fn joiner_replays_history_before_live_traffic() {
    let (state, _store, seeded) = common::test_state();
    let addr = start_ws_server(state.clone()).await;
    let channel = &seeded.channel_id;

    let mut a = connect(addr, channel, "A").await;
    wait_for_members(&state, channel, 1).await;
    send_frame(&mut a, "hi", "text").await;
    // A's own echo confirms the message was persisted and broadcast.
    recv_frame(&mut a).await;

    let mut b = connect(addr, channel, "B").await;
    wait_for_members(&state, channel, 2).await;

    // B's first frame is the replayed history, before anything live.
    assert_eq!(
        recv_frame(&mut b).await,
        serde_json::json!({ "client_id": "A", "message": "hi", "type": "text" })
    );

    send_frame(&mut a, "fresh", "text").await;
    assert_eq!(
        recv_frame(&mut b).await,
        serde_json::json!({ "client_id": "A", "message": "fresh", "type": "text" })
    );
}

#[tokio::test]
async fn replay_preserves_append_order() {
    let (state, _store, seeded) = common::test_state();
    let addr = start_ws_server(state.clone()).await;
    let channel = &seeded.channel_id;

    let mut a = connect(addr, channel, "A").await;
    wait_for_members(&state, channel, 1).await;
    for body in ["one", "two", "three"] {
        send_frame(&mut a, body, "text").await;
        recv_frame(&mut a).await;
    }

    let mut c = connect(addr, channel, "C").await;
    for body in ["one", "two", "three"] {
        let frame = recv_frame(&mut c).await;
        assert_eq!(frame["message"], body);
        assert_eq!(frame["client_id"], "A");
    }
}

#[tokio::test]
async fn departure_notice_reaches_remaining_members() {
    let (state, _store, seeded) = common::test_state();
    let addr = start_ws_server(state.clone()).await;
    let channel = &seeded.channel_id;

    let mut a = connect(addr, channel, "A").await;
    wait_for_members(&state, channel, 1).await;
    let mut b = connect(addr, channel, "B").await;
    wait_for_members(&state, channel, 2).await;

    a.close(None).await.expect("close");

    assert_eq!(
        recv_frame(&mut b).await,
        serde_json::json!({ "client_id": "A", "message": "left the chat", "type": "system" })
    );
    assert_eq!(state.registry.member_count(channel), 1);
}

#[tokio::test]
async fn messages_to_an_unknown_channel_are_dropped() {
    let (state, store, _seeded) = common::test_state();
    let addr = start_ws_server(state.clone()).await;

    // Joining a channel that was never created works; history is empty.
    let mut a = connect(addr, "ch_missing", "A").await;
    wait_for_members(&state, "ch_missing", 1).await;

    // Appends fail against the missing channel, so nothing comes back, but
    // the session stays up.
    send_frame(&mut a, "void", "text").await;
    expect_no_frame(&mut a).await;
    assert_eq!(state.registry.member_count("ch_missing"), 1);
    assert!(store.list_messages("ch_missing").await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Persistence failure injection
// ---------------------------------------------------------------------------

/// Store wrapper that fails the next append on demand.
struct FlakyStore {
    inner: MemoryStore,
    fail_next_append: AtomicBool,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_next_append: AtomicBool::new(false),
        }
    }
}

#[async_trait::async_trait]
impl ChatStore for FlakyStore {
    async fn append_message(
        &self,
        channel_id: &str,
        client_id: &str,
        body: &str,
        kind: &str,
    ) -> Result<Message, StoreError> {
        if self.fail_next_append.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Database(diesel::result::Error::NotFound));
        }
        self.inner
            .append_message(channel_id, client_id, body, kind)
            .await
    }

    async fn list_messages(&self, channel_id: &str) -> Result<Vec<Message>, StoreError> {
        self.inner.list_messages(channel_id).await
    }

    async fn list_channels(&self, server_id: &str) -> Result<Vec<Channel>, StoreError> {
        self.inner.list_channels(server_id).await
    }

    async fn list_servers(&self) -> Result<Vec<Server>, StoreError> {
        self.inner.list_servers().await
    }
}

#[tokio::test]
async fn failed_append_is_dropped_and_the_session_recovers() {
    let store = Arc::new(FlakyStore::new());
    let server = store.inner.add_server("Gaming Hub", "G");
    let channel = store.inner.add_channel(&server.id, "general").id;

    let state = common::state_with_store(store.clone());
    let addr = start_ws_server(state.clone()).await;

    let mut a = connect(addr, &channel, "A").await;
    wait_for_members(&state, &channel, 1).await;
    let mut b = connect(addr, &channel, "B").await;
    wait_for_members(&state, &channel, 2).await;

    // This append fails: no broadcast, no persisted row, no error frame.
    store.fail_next_append.store(true, Ordering::SeqCst);
    send_frame(&mut a, "lost", "text").await;
    expect_no_frame(&mut a).await;
    expect_no_frame(&mut b).await;

    // The session is still ACTIVE; the next message flows normally.
    send_frame(&mut a, "kept", "text").await;
    let expected = serde_json::json!({ "client_id": "A", "message": "kept", "type": "text" });
    assert_eq!(recv_frame(&mut a).await, expected);
    assert_eq!(recv_frame(&mut b).await, expected);

    let history = store.list_messages(&channel).await.unwrap();
    let bodies: Vec<&str> = history.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, ["kept"]);
}
