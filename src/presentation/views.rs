//! JSON view models returned by the HTTP layer.

use std::sync::Arc;

use serde::Serialize;

use crate::application::content::{MonthCount, SnapshotSummary, TagCount};
use crate::domain::posts::{ContentKind, Post, format_human_date, format_iso_date};
use crate::domain::presence::{PresenceMap, TopicId};

/// Public path of a post.
pub fn post_path(kind: ContentKind, id: &str) -> String {
    format!("/{}/{id}", kind.directory())
}

#[derive(Debug, Clone, Serialize)]
pub struct PostSummaryView {
    pub id: String,
    pub kind: ContentKind,
    pub title: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    pub date: String,
    pub date_display: String,
    pub reading_time: u32,
    pub path: String,
}

impl From<&Post> for PostSummaryView {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id.clone(),
            kind: post.kind(),
            title: post.title.clone(),
            description: post.description.clone(),
            category: post.category.clone(),
            tags: post.tags.clone(),
            date: format_iso_date(post.date),
            date_display: format_human_date(post.date),
            reading_time: post.reading_time,
            path: post_path(post.kind(), &post.id),
        }
    }
}

fn summaries(posts: &[Arc<Post>]) -> Vec<PostSummaryView> {
    posts.iter().map(|post| PostSummaryView::from(post.as_ref())).collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct PostDetailView {
    #[serde(flatten)]
    pub summary: PostSummaryView,
    pub published: bool,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discussion_url: Option<String>,
    pub related: Vec<PostSummaryView>,
}

impl PostDetailView {
    pub fn new(post: &Post, related: &[Arc<Post>]) -> Self {
        Self {
            summary: PostSummaryView::from(post),
            published: post.published,
            body: post.body.clone(),
            original_url: post.original_url().map(|url| url.to_string()),
            discussion_url: post.discussion_url().map(|url| url.to_string()),
            related: summaries(related),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PostListView {
    pub kind: ContentKind,
    pub count: usize,
    pub posts: Vec<PostSummaryView>,
}

impl PostListView {
    pub fn new(kind: ContentKind, posts: &[Arc<Post>]) -> Self {
        Self {
            kind,
            count: posts.len(),
            posts: summaries(posts),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaggedPostsView {
    pub tag: String,
    #[serde(flatten)]
    pub list: PostListView,
}

#[derive(Debug, Clone, Serialize)]
pub struct TagIndexView {
    pub tags: Vec<TagCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveView {
    pub months: Vec<MonthCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewersView {
    pub topic: TopicId,
    pub count: usize,
    pub members: PresenceMap,
}

impl ViewersView {
    pub fn new(topic: TopicId, members: PresenceMap) -> Self {
        Self {
            topic,
            count: members.len(),
            members,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PresenceStatsView {
    pub topics: usize,
    pub members: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthView {
    pub status: &'static str,
    pub content: SnapshotSummary,
    pub presence: PresenceStatsView,
}
