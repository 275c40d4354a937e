#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;

use relay_api::config::Config;
use relay_api::db::store::{ChatStore, MemoryStore};
use relay_api::relay::broadcast::Broadcaster;
use relay_api::relay::registry::ChannelRegistry;
use relay_api::AppState;

/// IDs created by `test_state`'s seeding.
pub struct Seeded {
    pub server_id: String,
    pub channel_id: String,
}

/// Build a test AppState backed by the in-memory store, with one server and
/// one channel seeded.
pub fn test_state() -> (AppState, Arc<MemoryStore>, Seeded) {
    let store = Arc::new(MemoryStore::new());
    let server = store.add_server("Gaming Hub", "G");
    let channel = store.add_channel(&server.id, "general");

    let state = state_with_store(store.clone());
    let seeded = Seeded {
        server_id: server.id,
        channel_id: channel.id,
    };
    (state, store, seeded)
}

/// Build a test AppState around any store implementation.
pub fn state_with_store(store: Arc<dyn ChatStore>) -> AppState {
    let registry = Arc::new(ChannelRegistry::new());
    let broadcaster = Broadcaster::new(registry.clone());
    AppState {
        store,
        registry,
        broadcaster,
        config: Arc::new(Config {
            database_url: "postgres://unused-in-tests".to_string(),
            port: 0,
            worker_id: 0,
        }),
    }
}

/// Build the full application router wired to the given state.
pub fn test_app(state: AppState) -> Router {
    relay_api::routes::router().with_state(state)
}
