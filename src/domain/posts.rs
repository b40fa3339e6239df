//! Post values shared by the content store, the query engine and the HTTP views.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::{Date, format_description::FormatItem, macros::format_description};
use url::Url;

pub const ISO_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month padding:zero]-[day padding:zero]");
pub const COMPACT_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[year][month padding:zero][day padding:zero]");
pub const HUMAN_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[month repr:long] [day padding:none], [year]");
pub const MONTH_KEY_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month padding:zero]");
pub const MONTH_LABEL_FORMAT: &[FormatItem<'static>] =
    format_description!("[month repr:long] [year]");

pub const DEFAULT_WORDS_PER_MINUTE: u32 = 200;

/// The two families of content. Ids are only unique within one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Article,
    Note,
}

impl ContentKind {
    pub const ALL: [ContentKind; 2] = [ContentKind::Article, ContentKind::Note];

    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Article => "article",
            ContentKind::Note => "note",
        }
    }

    /// Directory below the content root holding units of this kind.
    pub fn directory(self) -> &'static str {
        match self {
            ContentKind::Article => "posts",
            ContentKind::Note => "notes",
        }
    }

    pub fn from_directory(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.directory() == name)
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Links an article may point at: where it was first published and where it
/// is being discussed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalLinks {
    pub original_url: Option<Url>,
    pub discussion_url: Option<Url>,
}

/// Kind-specific payload carried by a [`Post`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostVariant {
    Article(ExternalLinks),
    Note,
}

/// A parsed post. Never mutated once it has been placed in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub category: String,
    /// Normalised tags in declaration order.
    pub tags: Vec<String>,
    pub date: Date,
    pub published: bool,
    /// Estimated minutes, always at least one.
    pub reading_time: u32,
    pub variant: PostVariant,
}

impl Post {
    pub fn kind(&self) -> ContentKind {
        match self.variant {
            PostVariant::Article(_) => ContentKind::Article,
            PostVariant::Note => ContentKind::Note,
        }
    }

    pub fn original_url(&self) -> Option<&Url> {
        match &self.variant {
            PostVariant::Article(links) => links.original_url.as_ref(),
            PostVariant::Note => None,
        }
    }

    pub fn discussion_url(&self) -> Option<&Url> {
        match &self.variant {
            PostVariant::Article(links) => links.discussion_url.as_ref(),
            PostVariant::Note => None,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|candidate| candidate == tag)
    }
}

/// Estimate reading time in whole minutes, rounding up and never below one.
pub fn reading_time(body: &str, words_per_minute: u32) -> u32 {
    let words = body.split_whitespace().count() as u64;
    let per_minute = u64::from(words_per_minute.max(1));
    let minutes = words.div_ceil(per_minute).max(1);
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

/// Trim and lower-case a tag; empty tags are dropped.
pub fn normalize_tag(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_lowercase())
}

/// Normalise tags while keeping the first occurrence of each in order.
pub fn normalize_tags<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.into_iter().filter_map(|tag| normalize_tag(tag.as_ref())) {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

pub fn month_key_for(date: Date) -> String {
    date.format(MONTH_KEY_FORMAT)
        .unwrap_or_else(|_| format!("{}-{:02}", date.year(), u8::from(date.month())))
}

pub fn month_label_for(date: Date) -> String {
    date.format(MONTH_LABEL_FORMAT)
        .unwrap_or_else(|_| month_key_for(date))
}

pub fn format_iso_date(date: Date) -> String {
    date.format(ISO_DATE_FORMAT)
        .unwrap_or_else(|_| date.to_string())
}

pub fn format_human_date(date: Date) -> String {
    date.format(HUMAN_DATE_FORMAT)
        .unwrap_or_else(|_| format_iso_date(date))
}
