use std::sync::Weak;

use crate::domain::presence::{MemberId, TopicId};

use super::tracker::TrackerInner;

/// Ownership of one tracked membership. Dropping it untracks the member,
/// unless a later `track` for the same member has since taken over.
pub struct PresenceLease {
    tracker: Weak<TrackerInner>,
    topic: TopicId,
    member: MemberId,
    generation: u64,
}

impl PresenceLease {
    pub(super) fn new(
        tracker: Weak<TrackerInner>,
        topic: TopicId,
        member: MemberId,
        generation: u64,
    ) -> Self {
        Self {
            tracker,
            topic,
            member,
            generation,
        }
    }

    pub fn topic(&self) -> &TopicId {
        &self.topic
    }

    pub fn member(&self) -> &MemberId {
        &self.member
    }

    /// Refresh the liveness timestamp. Returns false once this lease no longer
    /// owns a live entry (swept, untracked or superseded).
    pub fn touch(&self) -> bool {
        self.tracker
            .upgrade()
            .is_some_and(|inner| inner.touch(&self.topic, &self.member, self.generation))
    }
}

impl Drop for PresenceLease {
    fn drop(&mut self) {
        if let Some(inner) = self.tracker.upgrade() {
            inner.release(&self.topic, &self.member, self.generation);
        }
    }
}
