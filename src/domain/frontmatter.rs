//! Frontmatter parsing: one raw content unit in, one [`Post`] out.
//!
//! A unit starts with a metadata block delimited either by `---` (YAML) or
//! `+++` (TOML), followed by the body. The calendar date is not read from the
//! metadata: it is taken from the unit's storage path, either the file name or
//! one of its parent directories, written as `YYYY-MM-DD` or `YYYYMMDD`.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use time::Date;
use url::Url;

use super::posts::{
    COMPACT_DATE_FORMAT, ContentKind, DEFAULT_WORDS_PER_MINUTE, ExternalLinks, ISO_DATE_FORMAT,
    Post, PostVariant, normalize_tags, reading_time,
};
use super::slug::{SlugError, dated_slug};

const NOTE_EXCERPT_CHARS: usize = 160;
pub const DEFAULT_CATEGORY: &str = "general";

/// One raw content unit as read from the content source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentUnit {
    pub kind: ContentKind,
    /// Storage path, used for the date token and for error reporting.
    pub path: PathBuf,
    pub raw: String,
}

impl ContentUnit {
    pub fn new(kind: ContentKind, path: impl Into<PathBuf>, raw: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            raw: raw.into(),
        }
    }
}

/// Values injected into the parser from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    pub words_per_minute: u32,
    pub default_category: String,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            words_per_minute: DEFAULT_WORDS_PER_MINUTE,
            default_category: DEFAULT_CATEGORY.to_string(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("content unit does not start with a `---` or `+++` metadata block")]
    MissingFrontmatter,
    #[error("metadata block opened with `{delimiter}` is never closed")]
    UnterminatedFrontmatter { delimiter: &'static str },
    #[error("invalid YAML metadata: {0}")]
    Yaml(String),
    #[error("invalid TOML metadata: {0}")]
    Toml(String),
    #[error("required field `{field}` is missing or empty")]
    MissingField { field: &'static str },
    #[error("`published` and `draft` disagree about publication state")]
    ConflictingPublication,
    #[error("field `{field}` is not an absolute URL: {reason}")]
    InvalidUrl { field: &'static str, reason: String },
    #[error("no date token (YYYY-MM-DD or YYYYMMDD) found in `{path}`")]
    MissingDate { path: String },
    #[error("date token `{token}` is not a valid calendar date")]
    InvalidDate { token: String },
    #[error(transparent)]
    Slug(#[from] SlugError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockFormat {
    Yaml,
    Toml,
}

impl BlockFormat {
    fn delimiter(self) -> &'static str {
        match self {
            BlockFormat::Yaml => "---",
            BlockFormat::Toml => "+++",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawFrontmatter {
    title: Option<String>,
    description: Option<String>,
    category: Option<String>,
    tags: Option<RawTags>,
    published: Option<bool>,
    draft: Option<bool>,
    original_url: Option<String>,
    discussion_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTags {
    One(RawTag),
    List(Vec<RawTag>),
}

/// A single tag as written; bare numbers and booleans are read as text.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTag {
    Text(String),
    Integer(i64),
    Float(f64),
    Flag(bool),
}

impl RawTag {
    fn into_text(self) -> String {
        match self {
            RawTag::Text(value) => value,
            RawTag::Integer(value) => value.to_string(),
            RawTag::Float(value) => value.to_string(),
            RawTag::Flag(value) => value.to_string(),
        }
    }
}

impl RawTags {
    fn into_tags(self) -> Vec<String> {
        match self {
            RawTags::One(RawTag::Text(value)) => normalize_tags(value.split(',')),
            RawTags::One(tag) => normalize_tags([tag.into_text()]),
            RawTags::List(values) => normalize_tags(values.into_iter().map(RawTag::into_text)),
        }
    }
}

/// Parse one unit into a post.
pub fn parse_unit(unit: &ContentUnit, options: &ParseOptions) -> Result<Post, ParseError> {
    let date = date_from_path(&unit.path)?;
    let (format, header, body) = split_frontmatter(&unit.raw)?;
    let raw = parse_header(format, header)?;

    let title = required(raw.title, "title")?;
    let description = match (unit.kind, non_empty(raw.description)) {
        (_, Some(description)) => description,
        (ContentKind::Note, None) => excerpt(body, NOTE_EXCERPT_CHARS),
        (ContentKind::Article, None) => {
            return Err(ParseError::MissingField {
                field: "description",
            });
        }
    };
    let category =
        non_empty(raw.category).unwrap_or_else(|| options.default_category.clone());
    let tags = raw.tags.map(RawTags::into_tags).unwrap_or_default();
    let published = resolve_published(raw.published, raw.draft)?;

    let variant = match unit.kind {
        ContentKind::Article => PostVariant::Article(ExternalLinks {
            original_url: parse_url(raw.original_url, "original_url")?,
            discussion_url: parse_url(raw.discussion_url, "discussion_url")?,
        }),
        ContentKind::Note => PostVariant::Note,
    };

    let body = body.trim_start_matches(['\r', '\n']).to_string();

    Ok(Post {
        id: dated_slug(date, &title)?,
        reading_time: reading_time(&body, options.words_per_minute),
        title,
        description,
        body,
        category,
        tags,
        date,
        published,
        variant,
    })
}

/// Locate the date token for a unit, checking the file name first and then
/// each parent directory from the closest outwards.
pub fn date_from_path(path: &Path) -> Result<Date, ParseError> {
    let stem = path.file_stem().and_then(|stem| stem.to_str());
    let parents = path
        .parent()
        .into_iter()
        .flat_map(Path::ancestors)
        .filter_map(|ancestor| ancestor.file_name().and_then(|name| name.to_str()));

    for candidate in stem.into_iter().chain(parents) {
        if let Some(date) = parse_date_token(candidate)? {
            return Ok(date);
        }
    }

    Err(ParseError::MissingDate {
        path: path.display().to_string(),
    })
}

fn parse_date_token(segment: &str) -> Result<Option<Date>, ParseError> {
    let (token, format) = if let Some(token) = leading_token(segment, 10, is_iso_token) {
        (token, ISO_DATE_FORMAT)
    } else if let Some(token) = leading_token(segment, 8, |t| t.bytes().all(|b| b.is_ascii_digit())) {
        (token, COMPACT_DATE_FORMAT)
    } else {
        return Ok(None);
    };

    Date::parse(token, format)
        .map(Some)
        .map_err(|_| ParseError::InvalidDate {
            token: token.to_string(),
        })
}

fn leading_token(segment: &str, len: usize, accept: impl Fn(&str) -> bool) -> Option<&str> {
    let token = segment.get(..len)?;
    let boundary = segment[len..]
        .chars()
        .next()
        .is_none_or(|next| !next.is_ascii_digit());
    (boundary && accept(token)).then_some(token)
}

fn is_iso_token(token: &str) -> bool {
    token.bytes().enumerate().all(|(index, byte)| match index {
        4 | 7 => byte == b'-',
        _ => byte.is_ascii_digit(),
    })
}

fn split_frontmatter(raw: &str) -> Result<(BlockFormat, &str, &str), ParseError> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let (first, rest) = raw.split_once('\n').unwrap_or((raw, ""));
    let format = match first.trim_end() {
        "---" => BlockFormat::Yaml,
        "+++" => BlockFormat::Toml,
        _ => return Err(ParseError::MissingFrontmatter),
    };
    let delimiter = format.delimiter();

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == delimiter {
            return Ok((format, &rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }

    Err(ParseError::UnterminatedFrontmatter { delimiter })
}

fn parse_header(format: BlockFormat, header: &str) -> Result<RawFrontmatter, ParseError> {
    if header.trim().is_empty() {
        return Ok(RawFrontmatter::default());
    }
    match format {
        BlockFormat::Yaml => {
            serde_yaml::from_str(header).map_err(|err| ParseError::Yaml(err.to_string()))
        }
        BlockFormat::Toml => toml::from_str(header).map_err(|err| ParseError::Toml(err.to_string())),
    }
}

/// A unit is published only when explicitly marked so, through either key.
fn resolve_published(published: Option<bool>, draft: Option<bool>) -> Result<bool, ParseError> {
    match (published, draft) {
        (Some(published), Some(draft)) if published == draft => {
            Err(ParseError::ConflictingPublication)
        }
        (Some(published), _) => Ok(published),
        (None, Some(draft)) => Ok(!draft),
        (None, None) => Ok(false),
    }
}

fn parse_url(value: Option<String>, field: &'static str) -> Result<Option<Url>, ParseError> {
    match non_empty(value) {
        Some(value) => Url::parse(&value)
            .map(Some)
            .map_err(|err| ParseError::InvalidUrl {
                field,
                reason: err.to_string(),
            }),
        None => Ok(None),
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ParseError> {
    non_empty(value).ok_or(ParseError::MissingField { field })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn excerpt(body: &str, max_chars: usize) -> String {
    let flattened = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() <= max_chars {
        return flattened;
    }

    let cut: String = flattened.chars().take(max_chars).collect();
    let trimmed = match cut.rfind(' ') {
        Some(index) if index > 0 => &cut[..index],
        _ => cut.as_str(),
    };
    format!("{trimmed}…")
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    fn article(path: &str, raw: &str) -> Result<Post, ParseError> {
        parse_unit(
            &ContentUnit::new(ContentKind::Article, path, raw),
            &ParseOptions::default(),
        )
    }

    #[test]
    fn parses_yaml_article() {
        let post = article(
            "posts/2021-02-01-ownership.md",
            "---\ntitle: Ownership Explained\ndescription: Borrowing without tears\ntags: Rust, go, rust\npublished: true\noriginal_url: https://example.com/ownership\n---\n\nBody text here.\n",
        )
        .expect("valid unit");

        assert_eq!(post.id, "2021-02-01-ownership-explained");
        assert_eq!(post.date, date!(2021 - 02 - 01));
        assert_eq!(post.tags, vec!["rust", "go"]);
        assert_eq!(post.category, DEFAULT_CATEGORY);
        assert!(post.published);
        assert_eq!(post.reading_time, 1);
        assert_eq!(post.body, "Body text here.\n");
        assert_eq!(
            post.original_url().map(Url::as_str),
            Some("https://example.com/ownership")
        );
        assert_eq!(post.discussion_url(), None);
    }

    #[test]
    fn parses_toml_article_with_tag_list() {
        let post = article(
            "posts/20210101-hello.md",
            "+++\ntitle = \"Hello\"\ndescription = \"First\"\ncategory = \"meta\"\ntags = [\"Go\", \" Web \"]\ndraft = false\n+++\nHi\n",
        )
        .expect("valid unit");

        assert_eq!(post.date, date!(2021 - 01 - 01));
        assert_eq!(post.category, "meta");
        assert_eq!(post.tags, vec!["go", "web"]);
        assert!(post.published);
    }

    #[test]
    fn numeric_tags_are_read_as_text() {
        let post = article(
            "posts/2021-01-01-a.md",
            "---\ntitle: A\ndescription: d\ntags: 2021\n---\n",
        )
        .expect("scalar number");
        assert_eq!(post.tags, vec!["2021"]);

        let post = article(
            "posts/2021-01-01-a.md",
            "---\ntitle: A\ndescription: d\ntags: [Rust, 2021]\n---\n",
        )
        .expect("mixed list");
        assert_eq!(post.tags, vec!["rust", "2021"]);

        let post = article(
            "posts/2021-01-01-a.md",
            "+++\ntitle = \"A\"\ndescription = \"d\"\ntags = [2021, \"go\"]\n+++\n",
        )
        .expect("toml mixed list");
        assert_eq!(post.tags, vec!["2021", "go"]);
    }

    #[test]
    fn missing_publication_flag_defaults_to_draft() {
        let post = article(
            "posts/2021-01-01-x.md",
            "---\ntitle: X\ndescription: Y\n---\nbody",
        )
        .expect("valid unit");
        assert!(!post.published);
    }

    #[test]
    fn conflicting_publication_flags_fail() {
        let err = article(
            "posts/2021-01-01-x.md",
            "---\ntitle: X\ndescription: Y\npublished: true\ndraft: true\n---\n",
        )
        .expect_err("contradiction");
        assert_eq!(err, ParseError::ConflictingPublication);
    }

    #[test]
    fn date_can_come_from_parent_directory() {
        let date = date_from_path(Path::new("posts/2020-12-24/christmas.md")).expect("date");
        assert_eq!(date, date!(2020 - 12 - 24));
    }

    #[test]
    fn invalid_calendar_date_is_fatal() {
        let err = article(
            "posts/2021-02-30-nope.md",
            "---\ntitle: X\ndescription: Y\n---\n",
        )
        .expect_err("invalid date");
        assert_eq!(
            err,
            ParseError::InvalidDate {
                token: "2021-02-30".to_string()
            }
        );
    }

    #[test]
    fn missing_date_token_is_fatal() {
        let err = article("posts/hello.md", "---\ntitle: X\ndescription: Y\n---\n")
            .expect_err("no date");
        assert!(matches!(err, ParseError::MissingDate { .. }));
    }

    #[test]
    fn longer_digit_runs_are_not_dates() {
        let err = date_from_path(Path::new("posts/202101011.md")).expect_err("not a token");
        assert!(matches!(err, ParseError::MissingDate { .. }));
    }

    #[test]
    fn article_requires_description() {
        let err = article("posts/2021-01-01-x.md", "---\ntitle: X\n---\n").expect_err("no desc");
        assert_eq!(
            err,
            ParseError::MissingField {
                field: "description"
            }
        );
    }

    #[test]
    fn note_description_defaults_to_excerpt() {
        let post = parse_unit(
            &ContentUnit::new(
                ContentKind::Note,
                "notes/2022-03-04-quick.md",
                "---\ntitle: Quick thought\npublished: true\n---\nShort   note\nbody.",
            ),
            &ParseOptions::default(),
        )
        .expect("valid note");

        assert_eq!(post.description, "Short note body.");
        assert_eq!(post.kind(), ContentKind::Note);
    }

    #[test]
    fn rejects_unit_without_metadata_block() {
        let err = article("posts/2021-01-01-x.md", "just a body").expect_err("no block");
        assert_eq!(err, ParseError::MissingFrontmatter);
    }

    #[test]
    fn rejects_unterminated_block() {
        let err = article("posts/2021-01-01-x.md", "+++\ntitle = \"X\"\n").expect_err("open");
        assert_eq!(err, ParseError::UnterminatedFrontmatter { delimiter: "+++" });
    }

    #[test]
    fn rejects_relative_urls() {
        let err = article(
            "posts/2021-01-01-x.md",
            "---\ntitle: X\ndescription: Y\ndiscussion_url: /comments\n---\n",
        )
        .expect_err("relative url");
        assert!(matches!(
            err,
            ParseError::InvalidUrl {
                field: "discussion_url",
                ..
            }
        ));
    }

    #[test]
    fn excerpt_cuts_on_word_boundary() {
        assert_eq!(excerpt("one two three", 9), "one two…");
    }
}
