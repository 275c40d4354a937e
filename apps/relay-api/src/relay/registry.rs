//! In-memory registry of live connections per channel.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::{mpsc, OwnedMutexGuard};

use relay_common::id::{prefix, prefixed_ulid};

/// Frames queued per connection before backpressure applies to publishers.
const OUTBOUND_BUFFER: usize = 256;

/// A send to a connection whose session has gone away.
#[derive(Debug)]
pub struct DeliveryError;

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection closed")
    }
}

impl std::error::Error for DeliveryError {}

/// Handle to one live connection: its identity plus the frame queue its
/// writer task drains. Clones share the same queue.
#[derive(Clone)]
pub struct Connection {
    id: Arc<str>,
    client_id: Arc<str>,
    frames: mpsc::Sender<String>,
}

impl Connection {
    /// Create a handle and the receiving end for the connection's writer task.
    pub fn open(client_id: &str) -> (Self, mpsc::Receiver<String>) {
        let (frames, rx) = mpsc::channel(OUTBOUND_BUFFER);
        let connection = Self {
            id: prefixed_ulid(prefix::CONNECTION).into(),
            client_id: client_id.into(),
            frames,
        };
        (connection, rx)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Queue one serialized frame. Deliveries are FIFO per connection: a full
    /// queue waits for the writer to drain, a dropped receiver errors.
    pub async fn deliver(&self, frame: String) -> Result<(), DeliveryError> {
        self.frames.send(frame).await.map_err(|_| DeliveryError)
    }
}

struct ChannelTopic {
    /// Serializes append-then-broadcast (and join replay) for one channel.
    publish: Arc<tokio::sync::Mutex<()>>,
    members: Mutex<Vec<Connection>>,
}

impl ChannelTopic {
    fn new() -> Self {
        Self {
            publish: Arc::new(tokio::sync::Mutex::new(())),
            members: Mutex::new(Vec::new()),
        }
    }
}

/// Maps a channel ID to its set of live connections.
///
/// Uses `DashMap` for shard-level concurrency and `parking_lot::Mutex` per
/// member list, so joins and leaves on different channels never contend.
pub struct ChannelRegistry {
    channels: DashMap<String, Arc<ChannelTopic>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    fn topic(&self, channel_id: &str) -> Arc<ChannelTopic> {
        self.channels
            .entry(channel_id.to_string())
            .or_insert_with(|| Arc::new(ChannelTopic::new()))
            .clone()
    }

    /// Add a connection to the channel's live set. Always succeeds; a client
    /// may hold several sessions, each with its own handle.
    pub fn register(&self, channel_id: &str, connection: Connection) {
        self.topic(channel_id).members.lock().push(connection);
    }

    /// Remove a connection from the channel's live set. No-op when already
    /// absent, since the disconnect path and the broadcast failure path race.
    pub fn deregister(&self, channel_id: &str, connection_id: &str) {
        if let Some(topic) = self.channels.get(channel_id) {
            topic.members.lock().retain(|c| c.id() != connection_id);
        }
    }

    /// Point-in-time copy of the channel's live set. Registry mutations after
    /// the call do not affect an in-flight iteration over the copy.
    pub fn snapshot(&self, channel_id: &str) -> Vec<Connection> {
        self.channels
            .get(channel_id)
            .map(|topic| topic.members.lock().clone())
            .unwrap_or_default()
    }

    /// The channel's publish lock. Held across append + broadcast so the
    /// persisted sequence equals the delivered sequence, and across join
    /// replay so a joiner sees a consistent history prefix. Each channel has
    /// its own lock; channels never block each other.
    pub async fn publish_lock(&self, channel_id: &str) -> OwnedMutexGuard<()> {
        let publish = self.topic(channel_id).publish.clone();
        publish.lock_owned().await
    }

    pub fn member_count(&self, channel_id: &str) -> usize {
        self.channels
            .get(channel_id)
            .map(|topic| topic.members.lock().len())
            .unwrap_or(0)
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
