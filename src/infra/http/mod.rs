mod admin;
mod middleware;
mod public;

pub use admin::build_admin_router;
pub use middleware::{REQUEST_ID_HEADER, RequestContext};
pub use public::build_router;

use std::sync::Arc;
use std::time::Duration;

use crate::{
    application::{content::ContentRepository, presence::PresenceTracker},
    config::SiteSettings,
};

/// Shared by the public and admin routers.
#[derive(Clone)]
pub struct HttpState {
    pub content: ContentRepository,
    pub presence: PresenceTracker,
    pub site: Arc<SiteSettings>,
    /// Lease refresh cadence for presence streams.
    pub heartbeat: Duration,
}
