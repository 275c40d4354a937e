//! Fan-out of one frame to every live connection in a channel.

use std::sync::Arc;

use super::frames::OutboundFrame;
use super::registry::ChannelRegistry;

/// Delivers frames to a channel's live set. Cloneable; lives in AppState.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<ChannelRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<ChannelRegistry>) -> Self {
        Self { registry }
    }

    /// Deliver `frame` to every connection registered for the channel at call
    /// time, in registration order. Nothing is surfaced to the caller: a
    /// recipient whose queue is gone is logged, skipped, and deregistered
    /// before this call returns, and delivery to the rest continues.
    ///
    /// Callers needing ordering against other publishes on the same channel
    /// hold the registry's publish lock across append + broadcast.
    pub async fn broadcast(&self, channel_id: &str, frame: &OutboundFrame) {
        let text = frame.encode();

        let mut failed = Vec::new();
        for connection in self.registry.snapshot(channel_id) {
            if connection.deliver(text.clone()).await.is_err() {
                tracing::warn!(
                    channel_id,
                    connection_id = connection.id(),
                    client_id = connection.client_id(),
                    "frame delivery failed; deregistering connection"
                );
                failed.push(connection);
            }
        }

        for connection in failed {
            self.registry.deregister(channel_id, connection.id());
        }
    }
}
