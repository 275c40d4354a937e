pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod relay;
pub mod routes;

use std::sync::Arc;

use config::Config;
use db::store::ChatStore;
use relay::broadcast::Broadcaster;
use relay::registry::ChannelRegistry;

/// Shared application state available to all route handlers. Everything the
/// relay core touches is injected here; there are no process-wide statics.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ChatStore>,
    pub registry: Arc<ChannelRegistry>,
    pub broadcaster: Broadcaster,
    pub config: Arc<Config>,
}
