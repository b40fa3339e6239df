//! Utilities for generating deterministic, human-friendly post identifiers.
//!
//! ASCII slugification comes from the `slug` crate; Chinese titles are
//! transliterated through `pinyin` first so “基线对齐” becomes `ji-xian-dui-qi`.
//! Post ids prefix the slug with the post's calendar date, which keeps them
//! stable across rebuilds and unique as long as two posts of the same kind do
//! not share both a day and a title.

use pinyin::{Pinyin, ToPinyin};
use slug::slugify;
use thiserror::Error;
use time::Date;

use super::posts::ISO_DATE_FORMAT;

/// Errors that can occur while generating a slug.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
}

/// Derive a base slug from the provided human-readable text.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let transliterated = transliterate_to_ascii(input);
    let candidate = slugify(&transliterated);

    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    Ok(candidate)
}

/// Build the stable post id `YYYY-MM-DD-<slug>` from a date and a title.
pub fn dated_slug(date: Date, title: &str) -> Result<String, SlugError> {
    let slug = derive_slug(title)?;
    let prefix = date
        .format(ISO_DATE_FORMAT)
        .unwrap_or_else(|_| date.to_string());
    Ok(format!("{prefix}-{slug}"))
}

fn transliterate_to_ascii(input: &str) -> String {
    let mut output = String::with_capacity(input.len());

    for ch in input.chars() {
        if ch.is_ascii() {
            output.push(ch);
            continue;
        }

        match ch.to_pinyin() {
            Some(py) => append_pinyin(&mut output, py),
            None if ch.is_whitespace() => output.push(' '),
            // Left for slugify to filter.
            None => output.push(ch),
        }
    }

    output
}

fn append_pinyin(buffer: &mut String, pinyin: Pinyin) {
    if !buffer.is_empty() && !buffer.ends_with(' ') {
        buffer.push(' ');
    }
    buffer.push_str(pinyin.plain());
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    #[test]
    fn derive_slug_transliterates_chinese() {
        let slug = derive_slug("Rust 基础教程").expect("slug");
        assert_eq!(slug, "rust-ji-chu-jiao-cheng");
    }

    #[test]
    fn derive_slug_rejects_blank_titles() {
        assert_eq!(derive_slug("   "), Err(SlugError::EmptyInput));
    }

    #[test]
    fn derive_slug_rejects_symbol_only_titles() {
        let err = derive_slug("!!!").expect_err("no slug characters");
        assert!(matches!(err, SlugError::Unrepresentable { .. }));
    }

    #[test]
    fn dated_slug_prefixes_iso_date() {
        let id = dated_slug(date!(2021 - 02 - 01), "Ownership, Explained!").expect("id");
        assert_eq!(id, "2021-02-01-ownership-explained");
    }
}
