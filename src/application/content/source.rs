//! Where content units come from.
//!
//! The store only needs "give me every unit right now"; the filesystem
//! implementation lives in `infra::source`, the in-memory one below backs
//! tests and embedded use.

use std::path::PathBuf;
use std::sync::RwLock;

use thiserror::Error;

use crate::domain::frontmatter::ContentUnit;
use crate::util::lock::{rw_read, rw_write};

const SOURCE: &str = "application::content::source";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("content root `{}` does not exist or is not a directory", path.display())]
    MissingRoot { path: PathBuf },
    #[error("failed to read `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SourceError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub trait ContentSource: Send + Sync {
    /// Human-readable description used in logs.
    fn describe(&self) -> String;

    /// Read every unit currently available.
    fn load(&self) -> Result<Vec<ContentUnit>, SourceError>;
}

/// A source backed by a vector that can be swapped at runtime.
#[derive(Debug, Default)]
pub struct MemorySource {
    units: RwLock<Vec<ContentUnit>>,
}

impl MemorySource {
    pub fn new(units: Vec<ContentUnit>) -> Self {
        Self {
            units: RwLock::new(units),
        }
    }

    /// Replace the units returned by subsequent loads.
    pub fn replace(&self, units: Vec<ContentUnit>) {
        *rw_write(&self.units, SOURCE, "replace") = units;
    }
}

impl ContentSource for MemorySource {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn load(&self) -> Result<Vec<ContentUnit>, SourceError> {
        Ok(rw_read(&self.units, SOURCE, "load").clone())
    }
}
