//! Filesystem content source.
//!
//! Layout below the root:
//!
//! ```text
//! posts/2021-01-01-hello.md       article
//! posts/2021-02-01/index.md       article, date from the directory
//! notes/20210305-quick.md         note
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::application::content::{ContentSource, SourceError};
use crate::domain::frontmatter::ContentUnit;
use crate::domain::posts::ContentKind;

const UNIT_EXTENSION: &str = "md";

#[derive(Debug, Clone)]
pub struct FsContentSource {
    root: PathBuf,
}

impl FsContentSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn load_kind(&self, kind: ContentKind, units: &mut Vec<ContentUnit>) -> Result<(), SourceError> {
        let dir = self.root.join(kind.directory());
        if !dir.is_dir() {
            debug!(kind = %kind, dir = %dir.display(), "Content directory absent; skipping");
            return Ok(());
        }

        for entry in WalkDir::new(&dir).sort_by_file_name() {
            let entry = entry.map_err(|err| {
                let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| dir.clone());
                SourceError::io(path, err.into())
            })?;
            if !entry.file_type().is_file() || !is_unit(entry.path()) {
                continue;
            }

            let raw = fs::read_to_string(entry.path())
                .map_err(|err| SourceError::io(entry.path(), err))?;
            // Relative so a dated root directory is never mistaken for the unit's date.
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .unwrap_or(entry.path())
                .to_path_buf();
            units.push(ContentUnit::new(kind, relative, raw));
        }
        Ok(())
    }
}

fn is_unit(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'));
    !hidden && path.extension().and_then(|ext| ext.to_str()) == Some(UNIT_EXTENSION)
}

impl ContentSource for FsContentSource {
    fn describe(&self) -> String {
        self.root().display().to_string()
    }

    fn load(&self) -> Result<Vec<ContentUnit>, SourceError> {
        let root = self.root();
        if !root.is_dir() {
            return Err(SourceError::MissingRoot {
                path: root.to_path_buf(),
            });
        }

        let mut units = Vec::new();
        for kind in ContentKind::ALL {
            self.load_kind(kind, &mut units)?;
        }
        debug!(root = %root.display(), units = units.len(), "Content units loaded");
        Ok(units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, contents).expect("write");
    }

    #[test]
    fn loads_units_of_both_kinds_with_relative_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "posts/2021-01-01-a.md", "a");
        write(dir.path(), "posts/2021-02-01/index.md", "b");
        write(dir.path(), "posts/README.txt", "ignored");
        write(dir.path(), "posts/.2021-01-01-hidden.md", "ignored");
        write(dir.path(), "notes/20210305-n.md", "n");

        let units = FsContentSource::new(dir.path()).load().expect("load");

        let seen: Vec<(ContentKind, PathBuf)> = units
            .iter()
            .map(|unit| (unit.kind, unit.path.clone()))
            .collect();
        assert_eq!(
            seen,
            vec![
                (ContentKind::Article, PathBuf::from("posts/2021-01-01-a.md")),
                (ContentKind::Article, PathBuf::from("posts/2021-02-01/index.md")),
                (ContentKind::Note, PathBuf::from("notes/20210305-n.md")),
            ]
        );
    }

    #[test]
    fn missing_kind_directories_are_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "notes/20210305-n.md", "n");
        let units = FsContentSource::new(dir.path()).load().expect("load");
        assert_eq!(units.len(), 1);
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope");
        let err = FsContentSource::new(&missing)
            .load()
            .expect_err("missing root");
        assert!(matches!(err, SourceError::MissingRoot { ref path } if *path == missing));
    }

    #[test]
    fn describe_names_the_root() {
        let source = FsContentSource::new("site/content");
        assert_eq!(source.root(), Path::new("site/content"));
        assert_eq!(source.describe(), Path::new("site/content").display().to_string());
    }
}
