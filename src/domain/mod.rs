//! Domain layer types and invariants.

pub mod error;
pub mod frontmatter;
pub mod posts;
pub mod presence;
pub mod slug;
