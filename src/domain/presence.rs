//! Presence identifiers and the diff event broadcast to topic subscribers.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::error::DomainError;
use super::posts::ContentKind;

/// Presence scope; one per post.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicId(String);

impl TopicId {
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::validation("presence topic must not be empty"));
        }
        Ok(Self(value))
    }

    /// Topic for a post, qualified by kind because ids only need to be unique
    /// within one kind.
    pub fn for_post(kind: ContentKind, post_id: &str) -> Self {
        Self(format!("{kind}:{post_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque per-connection identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(String);

impl MemberId {
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::validation("presence member id must not be empty"));
        }
        Ok(Self(value))
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type PresenceMap = BTreeMap<MemberId, Value>;

/// A membership diff. Full-membership snapshots use the same shape with every
/// current member listed under `joins` and `full` set; they replace whatever
/// view the receiver held instead of being merged into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceEvent {
    pub topic: TopicId,
    pub joins: PresenceMap,
    pub leaves: PresenceMap,
    #[serde(default, skip_serializing_if = "is_false")]
    pub full: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl PresenceEvent {
    pub fn join(topic: TopicId, member: MemberId, meta: Value) -> Self {
        Self {
            topic,
            joins: BTreeMap::from([(member, meta)]),
            leaves: PresenceMap::new(),
            full: false,
        }
    }

    pub fn leave(topic: TopicId, member: MemberId, meta: Value) -> Self {
        Self {
            topic,
            joins: PresenceMap::new(),
            leaves: BTreeMap::from([(member, meta)]),
            full: false,
        }
    }

    pub fn snapshot(topic: TopicId, members: PresenceMap) -> Self {
        Self {
            topic,
            joins: members,
            leaves: PresenceMap::new(),
            full: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty() && self.leaves.is_empty()
    }
}

/// Apply a diff to a locally held membership view.
pub fn apply_event(view: &mut PresenceMap, event: &PresenceEvent) {
    if event.full {
        view.clear();
    }
    for member in event.leaves.keys() {
        view.remove(member);
    }
    for (member, meta) in &event.joins {
        view.insert(member.clone(), meta.clone());
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn topic_for_post_is_kind_qualified() {
        let topic = TopicId::for_post(ContentKind::Note, "2021-01-01-hello");
        assert_eq!(topic.as_str(), "note:2021-01-01-hello");
    }

    #[test]
    fn blank_ids_are_rejected() {
        assert!(TopicId::parse("  ").is_err());
        assert!(MemberId::parse("").is_err());
    }

    #[test]
    fn event_serializes_as_diff() {
        let topic = TopicId::parse("article:x").expect("topic");
        let member = MemberId::parse("a").expect("member");
        let event = PresenceEvent::join(topic, member, json!({"id": "a"}));

        let value = serde_json::to_value(&event).expect("json");
        assert_eq!(
            value,
            json!({"topic": "article:x", "joins": {"a": {"id": "a"}}, "leaves": {}})
        );
    }

    #[test]
    fn apply_event_tracks_membership() {
        let topic = TopicId::parse("t").expect("topic");
        let a = MemberId::parse("a").expect("member");
        let b = MemberId::parse("b").expect("member");
        let mut view = PresenceMap::new();

        apply_event(&mut view, &PresenceEvent::join(topic.clone(), a.clone(), json!({})));
        apply_event(&mut view, &PresenceEvent::join(topic.clone(), b.clone(), json!({})));
        apply_event(&mut view, &PresenceEvent::leave(topic, a, json!({})));

        assert_eq!(view.len(), 1);
        assert!(view.contains_key(&b));
    }

    #[test]
    fn full_snapshot_replaces_the_view() {
        let topic = TopicId::parse("t").expect("topic");
        let a = MemberId::parse("a").expect("member");
        let b = MemberId::parse("b").expect("member");
        let mut view = PresenceMap::from([(a, json!({}))]);

        let snapshot = PresenceEvent::snapshot(topic, PresenceMap::from([(b.clone(), json!({}))]));
        apply_event(&mut view, &snapshot);

        assert_eq!(view.keys().collect::<Vec<_>>(), vec![&b]);
        assert_eq!(serde_json::to_value(&snapshot).expect("json")["full"], json!(true));
    }
}
