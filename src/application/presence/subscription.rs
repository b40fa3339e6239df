use std::sync::Weak;

use async_stream::stream;
use futures::Stream;
use metrics::counter;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

use crate::domain::presence::{PresenceEvent, TopicId};

use super::tracker::TrackerInner;

const METRIC_LAGGED_TOTAL: &str = "quire_presence_lagged_total";

/// A topic subscription: the membership snapshot taken at subscribe time,
/// then every later diff in publication order.
pub struct PresenceSubscription {
    tracker: Weak<TrackerInner>,
    topic: TopicId,
    pending: Option<PresenceEvent>,
    receiver: broadcast::Receiver<PresenceEvent>,
}

impl PresenceSubscription {
    pub(super) fn new(
        tracker: Weak<TrackerInner>,
        topic: TopicId,
        initial: PresenceEvent,
        receiver: broadcast::Receiver<PresenceEvent>,
    ) -> Self {
        Self {
            tracker,
            topic,
            pending: Some(initial),
            receiver,
        }
    }

    pub fn topic(&self) -> &TopicId {
        &self.topic
    }

    /// Next event, or `None` once the topic channel or the tracker is gone.
    ///
    /// A subscriber that falls more than the channel capacity behind has lost
    /// diffs. It is resubscribed and handed a fresh full snapshot, which
    /// replaces its view; the retained backlog is discarded.
    pub async fn next(&mut self) -> Option<PresenceEvent> {
        if let Some(pending) = self.pending.take() {
            return Some(pending);
        }

        match self.receiver.recv().await {
            Ok(event) => Some(event),
            Err(RecvError::Lagged(skipped)) => {
                counter!(METRIC_LAGGED_TOTAL).increment(skipped);
                warn!(topic = %self.topic, skipped, "Presence subscriber lagged; resyncing");
                self.resync()
            }
            Err(RecvError::Closed) => None,
        }
    }

    fn resync(&mut self) -> Option<PresenceEvent> {
        let tracker = self.tracker.upgrade()?;
        let (snapshot, receiver) = tracker.open(&self.topic);
        self.receiver = receiver;
        Some(snapshot)
    }

    pub fn into_stream(mut self) -> impl Stream<Item = PresenceEvent> + Send + 'static {
        stream! {
            while let Some(event) = self.next().await {
                yield event;
            }
        }
    }
}
