//! Fan-out of presence diffs to topic subscribers.

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::domain::presence::{PresenceEvent, TopicId};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Delivery seam between the tracker and whoever listens to a topic.
pub trait PresenceBroadcaster: Send + Sync {
    /// Deliver `event` to current subscribers of its topic and return how many
    /// received it.
    fn publish(&self, event: PresenceEvent) -> usize;

    /// Start receiving every event published for `topic` from now on.
    fn subscribe(&self, topic: &TopicId) -> broadcast::Receiver<PresenceEvent>;

    /// Drop channels nobody listens to any more; returns how many went.
    fn prune(&self) -> usize;
}

/// Single-process broadcaster backed by one tokio broadcast channel per topic.
#[derive(Debug)]
pub struct InMemoryBroadcaster {
    channels: DashMap<TopicId, broadcast::Sender<PresenceEvent>>,
    capacity: usize,
}

impl InMemoryBroadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn topic_count(&self) -> usize {
        self.channels.len()
    }
}

impl Default for InMemoryBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl PresenceBroadcaster for InMemoryBroadcaster {
    fn publish(&self, event: PresenceEvent) -> usize {
        match self.channels.get(&event.topic) {
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        }
    }

    fn subscribe(&self, topic: &TopicId) -> broadcast::Receiver<PresenceEvent> {
        self.channels
            .entry(topic.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    fn prune(&self) -> usize {
        let before = self.channels.len();
        self.channels
            .retain(|_, sender| sender.receiver_count() > 0);
        before.saturating_sub(self.channels.len())
    }
}
