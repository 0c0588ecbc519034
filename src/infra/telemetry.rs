use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::cache::{
    METRIC_CACHE_HIT, METRIC_CACHE_MISS, METRIC_CACHE_RECOMPUTE, METRIC_CACHE_RECOMPUTE_FAILED,
    METRIC_CACHE_RECOMPUTE_MS, METRIC_CACHE_STALE_SERVED,
};
use crate::config::{LogFormat, LoggingSettings};
use crate::store::{METRIC_STORE_CONFLICT, METRIC_STORE_RETRY};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
///
/// Embedders that install their own subscriber can skip this and still get
/// the engine's events; metric descriptions are registered either way via
/// [`describe_metrics`].
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

/// Register descriptions for every metric the engine emits.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_CACHE_HIT,
            Unit::Count,
            "Total number of fresh trend-cache hits."
        );
        describe_counter!(
            METRIC_CACHE_MISS,
            Unit::Count,
            "Total number of trend-cache lookups that found no value."
        );
        describe_counter!(
            METRIC_CACHE_STALE_SERVED,
            Unit::Count,
            "Total number of expired values served while a recomputation was in flight."
        );
        describe_counter!(
            METRIC_CACHE_RECOMPUTE,
            Unit::Count,
            "Total number of recomputations started."
        );
        describe_counter!(
            METRIC_CACHE_RECOMPUTE_FAILED,
            Unit::Count,
            "Total number of recomputations that failed."
        );
        describe_histogram!(
            METRIC_CACHE_RECOMPUTE_MS,
            Unit::Milliseconds,
            "Recomputation latency in milliseconds."
        );
        describe_counter!(
            METRIC_STORE_CONFLICT,
            Unit::Count,
            "Total number of transactional commits lost to a concurrent writer."
        );
        describe_counter!(
            METRIC_STORE_RETRY,
            Unit::Count,
            "Total number of transactional units re-run after a conflict."
        );
    });
}
