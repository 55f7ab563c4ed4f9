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
            "microblog_post_refresh_total",
            Unit::Count,
            "Total number of post index snapshots published."
        );
        describe_counter!(
            "microblog_post_refresh_failed_total",
            Unit::Count,
            "Total number of post index refresh passes that were aborted."
        );
        describe_histogram!(
            "microblog_post_refresh_ms",
            Unit::Milliseconds,
            "Post index refresh latency in milliseconds."
        );
        describe_gauge!(
            "microblog_post_index_size",
            Unit::Count,
            "Number of posts in the live index snapshot."
        );
        describe_counter!(
            "microblog_sessions_created_total",
            Unit::Count,
            "Total number of login sessions opened."
        );
        describe_counter!(
            "microblog_sessions_expired_total",
            Unit::Count,
            "Total number of sessions evicted by the sweep."
        );
        describe_gauge!(
            "microblog_sessions_active",
            Unit::Count,
            "Current number of live sessions."
        );
    });
}
