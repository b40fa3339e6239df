//! Read-side queries over the current content snapshot.

use std::sync::Arc;

use thiserror::Error;

use crate::domain::posts::{ContentKind, Post, normalize_tag};

use super::snapshot::{ContentSnapshot, MonthCount, SnapshotSummary, TagCount};
use super::store::ContentStore;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("{kind} `{id}` not found")]
    NotFound { kind: ContentKind, id: String },
}

/// Cheap-to-clone query facade shared by every request handler.
///
/// Each call resolves against whatever snapshot is current when it starts, so
/// a concurrent reload never produces a mix of old and new content within one
/// call.
#[derive(Clone)]
pub struct ContentRepository {
    store: Arc<ContentStore>,
}

impl ContentRepository {
    pub fn new(store: Arc<ContentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<ContentStore> {
        &self.store
    }

    pub fn snapshot(&self) -> Arc<ContentSnapshot> {
        self.store.snapshot()
    }

    /// Public lookup; unpublished posts are indistinguishable from missing ones.
    pub fn get_by_id(&self, kind: ContentKind, id: &str) -> Result<Arc<Post>, LookupError> {
        self.get_published_by_id(kind, id)
    }

    pub fn get_published_by_id(
        &self,
        kind: ContentKind,
        id: &str,
    ) -> Result<Arc<Post>, LookupError> {
        self.snapshot()
            .collection(kind)
            .get_published(id)
            .cloned()
            .ok_or_else(|| not_found(kind, id))
    }

    /// Lookup that also returns drafts, for author previews.
    pub fn get_preview_by_id(
        &self,
        kind: ContentKind,
        id: &str,
    ) -> Result<Arc<Post>, LookupError> {
        self.snapshot()
            .collection(kind)
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(kind, id))
    }

    /// Published posts of one kind, newest first.
    pub fn list_published(&self, kind: ContentKind) -> Vec<Arc<Post>> {
        self.snapshot().collection(kind).published().to_vec()
    }

    /// Published posts of one kind carrying `tag`, newest first. The tag is
    /// matched after normalisation; unknown tags yield an empty list.
    pub fn get_by_tag(&self, kind: ContentKind, tag: &str) -> Vec<Arc<Post>> {
        let Some(tag) = normalize_tag(tag) else {
            return Vec::new();
        };
        self.snapshot()
            .collection(kind)
            .published_with_tag(&tag)
            .cloned()
            .collect()
    }

    pub fn tag_counts(&self, kind: ContentKind) -> Vec<TagCount> {
        self.snapshot().collection(kind).tag_counts()
    }

    pub fn month_counts(&self, kind: ContentKind) -> Vec<MonthCount> {
        self.snapshot().collection(kind).month_counts()
    }

    pub fn summary(&self) -> SnapshotSummary {
        self.snapshot().summary()
    }
}

fn not_found(kind: ContentKind, id: &str) -> LookupError {
    LookupError::NotFound {
        kind,
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use crate::application::content::source::MemorySource;
    use crate::domain::frontmatter::{ContentUnit, ParseOptions};

    use super::*;

    fn repository(units: Vec<ContentUnit>) -> ContentRepository {
        let source = Arc::new(MemorySource::new(units));
        let store = ContentStore::open(source, ParseOptions::default()).expect("open");
        ContentRepository::new(Arc::new(store))
    }

    fn article(date: &str, title: &str, tags: &str, published: bool) -> ContentUnit {
        ContentUnit::new(
            ContentKind::Article,
            format!("posts/{date}-{title}.md"),
            format!(
                "---\ntitle: {title}\ndescription: d\ntags: {tags}\npublished: {published}\n---\nbody"
            ),
        )
    }

    #[test]
    fn drafts_are_hidden_from_public_lookup_but_previewable() {
        let repo = repository(vec![article("2021-01-01", "draft", "go", false)]);

        assert_eq!(
            repo.get_by_id(ContentKind::Article, "2021-01-01-draft"),
            Err(LookupError::NotFound {
                kind: ContentKind::Article,
                id: "2021-01-01-draft".to_string()
            })
        );
        assert!(repo.get_preview_by_id(ContentKind::Article, "2021-01-01-draft").is_ok());
        assert!(repo.get_by_tag(ContentKind::Article, "go").is_empty());
    }

    #[test]
    fn tag_lookup_normalises_input() {
        let repo = repository(vec![
            article("2021-01-01", "one", "go", true),
            article("2021-02-01", "two", "go, rust", true),
        ]);

        let ids: Vec<String> = repo
            .get_by_tag(ContentKind::Article, "  GO ")
            .iter()
            .map(|post| post.id.clone())
            .collect();
        assert_eq!(ids, vec!["2021-02-01-two", "2021-01-01-one"]);
        assert!(repo.get_by_tag(ContentKind::Article, "missing").is_empty());
        assert!(repo.get_by_tag(ContentKind::Article, "   ").is_empty());
        assert!(repo.get_by_tag(ContentKind::Note, "go").is_empty());
    }
}
