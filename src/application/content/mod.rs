//! Content repository: source loading, snapshot building and queries.

mod query;
mod related;
mod snapshot;
mod source;
mod store;

pub use query::{ContentRepository, LookupError};
pub use related::RELATED_LIMIT;
pub use snapshot::{
    Collection, ContentError, ContentSnapshot, MonthCount, SnapshotSummary, TagCount,
};
pub use source::{ContentSource, MemorySource, SourceError};
pub use store::ContentStore;
