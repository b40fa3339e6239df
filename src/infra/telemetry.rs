use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "quire_content_reload_total",
            Unit::Count,
            "Total number of successful content reloads."
        );
        describe_counter!(
            "quire_content_reload_failed_total",
            Unit::Count,
            "Total number of content reloads that kept the previous snapshot."
        );
        describe_histogram!(
            "quire_content_reload_ms",
            Unit::Milliseconds,
            "Content reload latency in milliseconds."
        );
        describe_gauge!(
            "quire_content_posts",
            Unit::Count,
            "Published posts in the current snapshot, by kind."
        );
        describe_gauge!(
            "quire_presence_members",
            Unit::Count,
            "Members currently tracked across all topics."
        );
        describe_counter!(
            "quire_presence_events_total",
            Unit::Count,
            "Total number of presence diffs published."
        );
        describe_counter!(
            "quire_presence_swept_total",
            Unit::Count,
            "Total number of members removed for missing heartbeats."
        );
        describe_counter!(
            "quire_presence_lagged_total",
            Unit::Count,
            "Total number of presence diffs dropped for slow subscribers."
        );
    });
}
