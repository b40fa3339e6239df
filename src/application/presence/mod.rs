//! Presence tracking: who is currently looking at which post.

mod broadcast;
mod lease;
mod subscription;
mod tracker;

pub use broadcast::{DEFAULT_CHANNEL_CAPACITY, InMemoryBroadcaster, PresenceBroadcaster};
pub use lease::PresenceLease;
pub use subscription::PresenceSubscription;
pub use tracker::PresenceTracker;
