//! "You might also like" selection.

use std::sync::Arc;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::domain::posts::Post;

use super::query::ContentRepository;

pub const RELATED_LIMIT: usize = 2;

impl ContentRepository {
    /// Up to [`RELATED_LIMIT`] published posts of the same kind sharing one
    /// randomly chosen tag with `post`, in random order. Posts without tags
    /// get no suggestions.
    pub fn related(&self, post: &Post) -> Vec<Arc<Post>> {
        self.related_with(post, &mut rand::thread_rng())
    }

    /// [`ContentRepository::related`] with an injected random source.
    pub fn related_with<R: Rng + ?Sized>(&self, post: &Post, rng: &mut R) -> Vec<Arc<Post>> {
        let Some(tag) = post.tags.choose(rng) else {
            return Vec::new();
        };

        let mut candidates: Vec<Arc<Post>> = self
            .get_by_tag(post.kind(), tag)
            .into_iter()
            .filter(|candidate| candidate.id != post.id)
            .collect();
        candidates.shuffle(rng);
        candidates.truncate(RELATED_LIMIT);
        candidates
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use crate::application::content::source::MemorySource;
    use crate::application::content::store::ContentStore;
    use crate::domain::frontmatter::{ContentUnit, ParseOptions};
    use crate::domain::posts::ContentKind;

    use super::*;

    fn unit(kind: ContentKind, date: &str, title: &str, tags: &str, published: bool) -> ContentUnit {
        ContentUnit::new(
            kind,
            format!("{}/{date}-{title}.md", kind.directory()),
            format!(
                "---\ntitle: {title}\ndescription: d\ntags: {tags}\npublished: {published}\n---\nbody"
            ),
        )
    }

    fn repository(units: Vec<ContentUnit>) -> ContentRepository {
        let store = ContentStore::open(Arc::new(MemorySource::new(units)), ParseOptions::default())
            .expect("open");
        ContentRepository::new(Arc::new(store))
    }

    #[test]
    fn related_excludes_self_drafts_and_other_kinds() {
        let repo = repository(vec![
            unit(ContentKind::Article, "2021-01-01", "a", "go", true),
            unit(ContentKind::Article, "2021-01-02", "b", "go", true),
            unit(ContentKind::Article, "2021-01-03", "c", "go", false),
            unit(ContentKind::Note, "2021-01-04", "d", "go", true),
        ]);
        let post = repo
            .get_by_id(ContentKind::Article, "2021-01-01-a")
            .expect("post");

        for seed in 0..16 {
            let related = repo.related_with(&post, &mut StdRng::seed_from_u64(seed));
            let ids: Vec<&str> = related.iter().map(|p| p.id.as_str()).collect();
            assert_eq!(ids, vec!["2021-01-02-b"]);
        }
    }

    #[test]
    fn related_is_capped_and_shares_a_tag() {
        let repo = repository(vec![
            unit(ContentKind::Article, "2021-01-01", "a", "go, rust", true),
            unit(ContentKind::Article, "2021-01-02", "b", "go", true),
            unit(ContentKind::Article, "2021-01-03", "c", "go, rust", true),
            unit(ContentKind::Article, "2021-01-04", "d", "rust", true),
            unit(ContentKind::Article, "2021-01-05", "e", "go", true),
        ]);
        let post = repo
            .get_by_id(ContentKind::Article, "2021-01-01-a")
            .expect("post");

        for seed in 0..32 {
            let related = repo.related_with(&post, &mut StdRng::seed_from_u64(seed));
            assert!(related.len() <= RELATED_LIMIT);
            assert!(!related.is_empty());
            assert!(related.iter().all(|p| p.id != post.id));
            assert!(
                related
                    .iter()
                    .all(|p| p.tags.iter().any(|tag| post.has_tag(tag)))
            );
        }
    }

    #[test]
    fn untagged_posts_have_no_related() {
        let repo = repository(vec![
            unit(ContentKind::Article, "2021-01-01", "a", "", true),
            unit(ContentKind::Article, "2021-01-02", "b", "go", true),
        ]);
        let post = repo
            .get_by_id(ContentKind::Article, "2021-01-01-a")
            .expect("post");
        assert!(repo.related(&post).is_empty());
    }
}
