#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use quire::application::content::{ContentRepository, ContentSource, ContentStore};
use quire::domain::frontmatter::ParseOptions;
use quire::infra::source::FsContentSource;
use tempfile::TempDir;

pub const FIRST_ID: &str = "2021-01-01-go";
pub const SECOND_ID: &str = "2021-02-01-go-and-rust";
pub const DRAFT_ID: &str = "2021-03-01-unfinished";
pub const NOTE_ID: &str = "2021-01-15-quick-thought";

pub fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().expect("parent directory")).expect("create directories");
    fs::write(path, contents).expect("write content unit");
}

/// Two published go articles, one draft and one note.
pub fn content_dir() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    write(
        dir.path(),
        "posts/2021-01-01-go.md",
        "---\ntitle: Go\ndescription: Getting going\ntags: go\npublished: true\n---\nFirst post body.\n",
    );
    write(
        dir.path(),
        "posts/2021-02-01-go-and-rust.md",
        "---\ntitle: Go and Rust\ndescription: Two languages\ntags: go, rust\npublished: true\ndiscussion_url: https://forum.example.com/t/42\n---\nSecond post body.\n",
    );
    write(
        dir.path(),
        "posts/2021-03-01/index.md",
        "+++\ntitle = \"Unfinished\"\ndescription = \"Not yet\"\ntags = [\"go\"]\ndraft = true\n+++\nDraft body.\n",
    );
    write(
        dir.path(),
        "notes/2021-01-15-quick-thought.md",
        "---\ntitle: Quick thought\ntags: go\npublished: true\n---\nNotes have no required description.\n",
    );
    dir
}

pub fn open_repository(root: &Path) -> ContentRepository {
    let source: Arc<dyn ContentSource> = Arc::new(FsContentSource::new(root));
    let store = ContentStore::open(source, ParseOptions::default()).expect("content store");
    ContentRepository::new(Arc::new(store))
}
