//! Holder of the current [`ContentSnapshot`].
//!
//! Readers take a reference-counted snapshot without locking and keep using
//! it for as long as they need; a reload builds a complete replacement off to
//! the side and swaps it in with a single pointer store. A failed reload
//! leaves the previous snapshot in place.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use arc_swap::ArcSwap;
use metrics::{counter, gauge, histogram};
use tracing::{error, info, instrument};

use crate::domain::frontmatter::ParseOptions;
use crate::domain::posts::ContentKind;
use crate::util::lock::mutex_lock;

use super::snapshot::{ContentError, ContentSnapshot};
use super::source::ContentSource;

const SOURCE: &str = "application::content::store";

const METRIC_RELOAD_TOTAL: &str = "quire_content_reload_total";
const METRIC_RELOAD_FAILED_TOTAL: &str = "quire_content_reload_failed_total";
const METRIC_RELOAD_MS: &str = "quire_content_reload_ms";
const METRIC_POSTS: &str = "quire_content_posts";

pub struct ContentStore {
    source: Arc<dyn ContentSource>,
    options: ParseOptions,
    current: ArcSwap<ContentSnapshot>,
    /// Serialises reloads so versions are handed out in order.
    reload_lock: Mutex<()>,
}

impl ContentStore {
    /// Build the initial snapshot. Any parse failure here is fatal to the
    /// caller; there is nothing to fall back on yet.
    #[instrument(skip_all, fields(source = %source.describe()))]
    pub fn open(
        source: Arc<dyn ContentSource>,
        options: ParseOptions,
    ) -> Result<Self, ContentError> {
        let snapshot = build(source.as_ref(), &options, 1)?;
        record_sizes(&snapshot);
        info!(
            version = snapshot.version(),
            articles = snapshot.collection(ContentKind::Article).len(),
            notes = snapshot.collection(ContentKind::Note).len(),
            "Content snapshot loaded"
        );

        Ok(Self {
            source,
            options,
            current: ArcSwap::from_pointee(snapshot),
            reload_lock: Mutex::new(()),
        })
    }

    /// The snapshot readers should use right now.
    pub fn snapshot(&self) -> Arc<ContentSnapshot> {
        self.current.load_full()
    }

    /// Rebuild from the source and swap the result in. On error the previous
    /// snapshot stays current and the error is returned.
    #[instrument(skip(self), fields(source = %self.source.describe()))]
    pub fn reload(&self) -> Result<Arc<ContentSnapshot>, ContentError> {
        let _guard = mutex_lock(&self.reload_lock, SOURCE, "reload");
        let started_at = Instant::now();
        let next_version = self.current.load().version() + 1;

        match build(self.source.as_ref(), &self.options, next_version) {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.current.store(Arc::clone(&snapshot));
                counter!(METRIC_RELOAD_TOTAL).increment(1);
                histogram!(METRIC_RELOAD_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
                record_sizes(&snapshot);
                info!(
                    version = snapshot.version(),
                    articles = snapshot.collection(ContentKind::Article).len(),
                    notes = snapshot.collection(ContentKind::Note).len(),
                    "Content snapshot reloaded"
                );
                Ok(snapshot)
            }
            Err(err) => {
                counter!(METRIC_RELOAD_FAILED_TOTAL).increment(1);
                error!(
                    error = %err,
                    kept_version = next_version - 1,
                    "Content reload failed; keeping previous snapshot"
                );
                Err(err)
            }
        }
    }
}

fn build(
    source: &dyn ContentSource,
    options: &ParseOptions,
    version: u64,
) -> Result<ContentSnapshot, ContentError> {
    let units = source.load()?;
    ContentSnapshot::build(&units, options, version)
}

fn record_sizes(snapshot: &ContentSnapshot) {
    for kind in ContentKind::ALL {
        gauge!(METRIC_POSTS, "kind" => kind.as_str())
            .set(snapshot.collection(kind).published().len() as f64);
    }
}

#[cfg(test)]
mod tests {
    use crate::application::content::source::MemorySource;
    use crate::domain::frontmatter::ContentUnit;

    use super::*;

    fn good(title: &str) -> ContentUnit {
        ContentUnit::new(
            ContentKind::Article,
            format!("posts/2021-01-01-{title}.md"),
            format!("---\ntitle: {title}\ndescription: d\npublished: true\n---\nbody"),
        )
    }

    fn bad() -> ContentUnit {
        ContentUnit::new(ContentKind::Article, "posts/2021-01-02-bad.md", "---\ntitle: x\n")
    }

    #[test]
    fn open_fails_fast_on_bad_content() {
        let source = Arc::new(MemorySource::new(vec![good("a"), bad()]));
        assert!(ContentStore::open(source, ParseOptions::default()).is_err());
    }

    #[test]
    fn reload_bumps_version_and_swaps_snapshot() {
        let source = Arc::new(MemorySource::new(vec![good("a")]));
        let store = ContentStore::open(source.clone(), ParseOptions::default()).expect("open");
        let before = store.snapshot();

        source.replace(vec![good("a"), good("b")]);
        let after = store.reload().expect("reload");

        assert_eq!(before.version(), 1);
        assert_eq!(after.version(), 2);
        assert_eq!(before.collection(ContentKind::Article).len(), 1);
        assert_eq!(store.snapshot().collection(ContentKind::Article).len(), 2);
    }

    #[test]
    fn failed_reload_keeps_last_known_good() {
        let source = Arc::new(MemorySource::new(vec![good("a")]));
        let store = ContentStore::open(source.clone(), ParseOptions::default()).expect("open");

        source.replace(vec![good("a"), bad()]);
        assert!(store.reload().is_err());

        let current = store.snapshot();
        assert_eq!(current.version(), 1);
        assert!(current.collection(ContentKind::Article).get("2021-01-01-a").is_some());

        source.replace(vec![good("a")]);
        assert_eq!(store.reload().expect("recovered").version(), 2);
    }
}
