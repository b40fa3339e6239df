//! Per-topic member registry.
//!
//! Every mutation of a topic happens while holding that topic's map entry, and
//! the resulting diff is published before the entry is released. Subscribers
//! therefore observe diffs for one topic in the order they were applied, and a
//! subscription opened under the same entry lock sees a snapshot that is
//! consistent with the diffs that follow it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use metrics::{counter, gauge};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::domain::presence::{MemberId, PresenceEvent, PresenceMap, TopicId};

use super::broadcast::PresenceBroadcaster;
use super::lease::PresenceLease;
use super::subscription::PresenceSubscription;

const METRIC_MEMBERS: &str = "quire_presence_members";
const METRIC_EVENTS_TOTAL: &str = "quire_presence_events_total";
const METRIC_SWEPT_TOTAL: &str = "quire_presence_swept_total";

#[derive(Debug)]
struct MemberEntry {
    meta: Value,
    /// Identifies the `track` call that created this entry.
    generation: u64,
    last_seen: Instant,
}

#[derive(Debug, Default)]
struct TopicState {
    members: BTreeMap<MemberId, MemberEntry>,
}

impl TopicState {
    fn presence_map(&self) -> PresenceMap {
        self.members
            .iter()
            .map(|(member, entry)| (member.clone(), entry.meta.clone()))
            .collect()
    }
}

pub(super) struct TrackerInner {
    topics: DashMap<TopicId, TopicState>,
    broadcaster: Arc<dyn PresenceBroadcaster>,
    generation: AtomicU64,
}

impl TrackerInner {
    fn publish(&self, event: PresenceEvent) {
        counter!(METRIC_EVENTS_TOTAL).increment(1);
        let delivered = self.broadcaster.publish(event);
        debug!(delivered, "Presence diff published");
    }

    /// Remove `member` from `topic` if `accept` approves the current entry.
    /// Emits the leave diff and drops the topic once it is empty.
    fn remove_where(
        &self,
        topic: &TopicId,
        member: &MemberId,
        accept: impl FnOnce(&MemberEntry) -> bool,
    ) -> bool {
        let Entry::Occupied(mut occupied) = self.topics.entry(topic.clone()) else {
            return false;
        };

        let state = occupied.get_mut();
        if !state.members.get(member).is_some_and(accept) {
            return false;
        }
        let Some(entry) = state.members.remove(member) else {
            return false;
        };
        gauge!(METRIC_MEMBERS).decrement(1.0);
        self.publish(PresenceEvent::leave(topic.clone(), member.clone(), entry.meta));

        if state.members.is_empty() {
            occupied.remove();
        }
        true
    }

    /// Register a receiver and read the membership under the topic entry, so
    /// the snapshot and the diffs that follow it line up exactly.
    pub(super) fn open(
        &self,
        topic: &TopicId,
    ) -> (PresenceEvent, broadcast::Receiver<PresenceEvent>) {
        let entry = self.topics.entry(topic.clone());
        let receiver = self.broadcaster.subscribe(topic);
        let members = match &entry {
            Entry::Occupied(occupied) => occupied.get().presence_map(),
            Entry::Vacant(_) => PresenceMap::new(),
        };
        drop(entry);

        (PresenceEvent::snapshot(topic.clone(), members), receiver)
    }

    pub(super) fn release(&self, topic: &TopicId, member: &MemberId, generation: u64) -> bool {
        self.remove_where(topic, member, |entry| entry.generation == generation)
    }

    pub(super) fn touch(&self, topic: &TopicId, member: &MemberId, generation: u64) -> bool {
        let Some(mut state) = self.topics.get_mut(topic) else {
            return false;
        };
        match state.members.get_mut(member) {
            Some(entry) if entry.generation == generation => {
                entry.last_seen = Instant::now();
                true
            }
            _ => false,
        }
    }
}

/// Handle to the registry; clones share state.
#[derive(Clone)]
pub struct PresenceTracker {
    inner: Arc<TrackerInner>,
}

impl PresenceTracker {
    pub fn new(broadcaster: Arc<dyn PresenceBroadcaster>) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                topics: DashMap::new(),
                broadcaster,
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn broadcaster(&self) -> &Arc<dyn PresenceBroadcaster> {
        &self.inner.broadcaster
    }

    /// Register `member` under `topic` and broadcast the join.
    ///
    /// Tracking a member that is already present replaces its metadata and
    /// broadcasts a join carrying the new value; any lease from the earlier
    /// call stops owning the entry. Dropping the returned lease untracks the
    /// member.
    pub fn track(&self, topic: &TopicId, member: &MemberId, meta: Value) -> PresenceLease {
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let mut state = self.inner.topics.entry(topic.clone()).or_default();

        let previous = state.members.insert(
            member.clone(),
            MemberEntry {
                meta: meta.clone(),
                generation,
                last_seen: Instant::now(),
            },
        );
        if previous.is_none() {
            gauge!(METRIC_MEMBERS).increment(1.0);
        }
        debug!(
            topic = %topic,
            member = %member,
            replaced = previous.is_some(),
            "Presence member tracked"
        );
        self.inner
            .publish(PresenceEvent::join(topic.clone(), member.clone(), meta));
        drop(state);

        PresenceLease::new(
            Arc::downgrade(&self.inner),
            topic.clone(),
            member.clone(),
            generation,
        )
    }

    /// Remove `member` from `topic` and broadcast the leave. Returns false when
    /// the member was not present.
    pub fn untrack(&self, topic: &TopicId, member: &MemberId) -> bool {
        let removed = self.inner.remove_where(topic, member, |_| true);
        if removed {
            debug!(topic = %topic, member = %member, "Presence member untracked");
        }
        removed
    }

    /// Current members of `topic`; empty for unknown topics.
    pub fn list(&self, topic: &TopicId) -> PresenceMap {
        self.inner
            .topics
            .get(topic)
            .map(|state| state.presence_map())
            .unwrap_or_default()
    }

    /// Open a subscription whose first item is the full current membership,
    /// followed by every diff applied after it.
    pub fn subscribe(&self, topic: &TopicId) -> PresenceSubscription {
        let (snapshot, receiver) = self.inner.open(topic);
        PresenceSubscription::new(
            Arc::downgrade(&self.inner),
            topic.clone(),
            snapshot,
            receiver,
        )
    }

    /// Remove members whose last heartbeat is at least `ttl` old. Returns the
    /// number removed.
    pub fn sweep(&self, ttl: Duration) -> usize {
        let stale: Vec<(TopicId, MemberId, u64)> = self
            .inner
            .topics
            .iter()
            .flat_map(|state| {
                let topic = state.key().clone();
                state
                    .value()
                    .members
                    .iter()
                    .filter(|(_, entry)| entry.last_seen.elapsed() >= ttl)
                    .map(|(member, entry)| (topic.clone(), member.clone(), entry.generation))
                    .collect::<Vec<_>>()
            })
            .collect();

        let swept = stale
            .into_iter()
            .filter(|(topic, member, generation)| {
                self.inner.remove_where(topic, member, |entry| {
                    entry.generation == *generation && entry.last_seen.elapsed() >= ttl
                })
            })
            .count();

        if swept > 0 {
            counter!(METRIC_SWEPT_TOTAL).increment(swept as u64);
            info!(swept, ttl_ms = ttl.as_millis() as u64, "Swept stale presence members");
        }
        swept
    }

    pub fn topic_count(&self) -> usize {
        self.inner.topics.len()
    }

    pub fn member_count(&self) -> usize {
        self.inner
            .topics
            .iter()
            .map(|state| state.members.len())
            .sum()
    }
}
