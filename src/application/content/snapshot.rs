//! Immutable, fully indexed view of all content.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::domain::frontmatter::{ContentUnit, ParseError, ParseOptions, parse_unit};
use crate::domain::posts::{ContentKind, Post, month_key_for, month_label_for};

use super::source::SourceError;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("failed to parse `{}`: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
    #[error(
        "duplicate {kind} id `{id}` produced by `{}` and `{}`",
        first.display(),
        second.display()
    )]
    DuplicateId {
        kind: ContentKind,
        id: String,
        first: PathBuf,
        second: PathBuf,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthCount {
    pub key: String,
    pub label: String,
    pub count: usize,
}

/// Newest first; same-day posts fall back to id order so rebuilds are stable.
fn newest_first(a: &Arc<Post>, b: &Arc<Post>) -> Ordering {
    b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id))
}

/// Indexes for one content kind.
#[derive(Debug, Default)]
pub struct Collection {
    by_id: HashMap<String, Arc<Post>>,
    /// Every post carrying the tag, published or not, newest first.
    by_tag: HashMap<String, Vec<Arc<Post>>>,
    published: Vec<Arc<Post>>,
}

impl Collection {
    fn build(kind: ContentKind, parsed: Vec<(PathBuf, Post)>) -> Result<Self, ContentError> {
        let mut by_id: HashMap<String, Arc<Post>> = HashMap::with_capacity(parsed.len());
        let mut origins: HashMap<String, PathBuf> = HashMap::with_capacity(parsed.len());

        for (path, post) in parsed {
            if let Some(first) = origins.get(&post.id) {
                return Err(ContentError::DuplicateId {
                    kind,
                    id: post.id,
                    first: first.clone(),
                    second: path,
                });
            }
            origins.insert(post.id.clone(), path);
            by_id.insert(post.id.clone(), Arc::new(post));
        }

        let mut by_tag: HashMap<String, Vec<Arc<Post>>> = HashMap::new();
        for post in by_id.values() {
            for tag in &post.tags {
                by_tag.entry(tag.clone()).or_default().push(Arc::clone(post));
            }
        }
        for posts in by_tag.values_mut() {
            posts.sort_by(newest_first);
        }

        let mut published: Vec<Arc<Post>> = by_id
            .values()
            .filter(|post| post.published)
            .cloned()
            .collect();
        published.sort_by(newest_first);

        Ok(Self {
            by_id,
            by_tag,
            published,
        })
    }

    /// Lookup regardless of publication state.
    pub fn get(&self, id: &str) -> Option<&Arc<Post>> {
        self.by_id.get(id)
    }

    pub fn get_published(&self, id: &str) -> Option<&Arc<Post>> {
        self.get(id).filter(|post| post.published)
    }

    pub fn published(&self) -> &[Arc<Post>] {
        &self.published
    }

    /// Published posts carrying an already-normalised tag.
    pub fn published_with_tag(&self, tag: &str) -> impl Iterator<Item = &Arc<Post>> {
        self.by_tag
            .get(tag)
            .into_iter()
            .flatten()
            .filter(|post| post.published)
    }

    pub fn tag_counts(&self) -> Vec<TagCount> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for post in &self.published {
            for tag in &post.tags {
                *counts.entry(tag.as_str()).or_insert(0) += 1;
            }
        }
        counts
            .into_iter()
            .map(|(tag, count)| TagCount {
                tag: tag.to_string(),
                count,
            })
            .collect()
    }

    pub fn month_counts(&self) -> Vec<MonthCount> {
        let mut map: BTreeMap<String, (String, usize)> = BTreeMap::new();
        for post in &self.published {
            map.entry(month_key_for(post.date))
                .and_modify(|entry| entry.1 += 1)
                .or_insert_with(|| (month_label_for(post.date), 1));
        }

        map.into_iter()
            .rev()
            .map(|(key, (label, count))| MonthCount { key, label, count })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotSummary {
    pub version: u64,
    /// RFC 3339 timestamp.
    pub built_at: String,
    pub articles: usize,
    pub published_articles: usize,
    pub notes: usize,
    pub published_notes: usize,
}

/// Every post of every kind plus the derived indexes, built in one go.
#[derive(Debug)]
pub struct ContentSnapshot {
    version: u64,
    built_at: OffsetDateTime,
    articles: Collection,
    notes: Collection,
}

impl ContentSnapshot {
    /// Parse every unit and build the indexes. A single bad unit fails the
    /// whole build.
    pub fn build(
        units: &[ContentUnit],
        options: &ParseOptions,
        version: u64,
    ) -> Result<Self, ContentError> {
        let mut articles = Vec::new();
        let mut notes = Vec::new();

        for unit in units {
            let post = parse_unit(unit, options).map_err(|source| ContentError::Parse {
                path: unit.path.clone(),
                source,
            })?;
            match unit.kind {
                ContentKind::Article => articles.push((unit.path.clone(), post)),
                ContentKind::Note => notes.push((unit.path.clone(), post)),
            }
        }

        Ok(Self {
            version,
            built_at: OffsetDateTime::now_utc(),
            articles: Collection::build(ContentKind::Article, articles)?,
            notes: Collection::build(ContentKind::Note, notes)?,
        })
    }

    pub fn empty(version: u64) -> Self {
        Self {
            version,
            built_at: OffsetDateTime::now_utc(),
            articles: Collection::default(),
            notes: Collection::default(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn built_at(&self) -> OffsetDateTime {
        self.built_at
    }

    pub fn collection(&self, kind: ContentKind) -> &Collection {
        match kind {
            ContentKind::Article => &self.articles,
            ContentKind::Note => &self.notes,
        }
    }

    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary {
            version: self.version,
            built_at: self.built_at.format(&Rfc3339).unwrap_or_default(),
            articles: self.articles.len(),
            published_articles: self.articles.published().len(),
            notes: self.notes.len(),
            published_notes: self.notes.published().len(),
        }
    }
}
