//! Lightweight metrics helpers for Junction.
//!
//! Thin wrappers over the `metrics` crate macros. No exporter is embedded; the
//! application installs whichever recorder it wants and these calls become
//! no-ops when none is installed.
//!
//! Provided metrics:
//! * `junction_dispatch_total` (counter, labels: method, outcome)
//! * `junction_upstream_duration_seconds` (histogram, label: route)
//! * `junction_route_table_size` (gauge)
//! * `junction_hook_errors_total` (counter, labels: hook, stage)
use std::{sync::Once, time::Instant};

use metrics::{
    Unit, counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram,
};

pub const JUNCTION_DISPATCH_TOTAL: &str = "junction_dispatch_total";
pub const JUNCTION_UPSTREAM_DURATION_SECONDS: &str = "junction_upstream_duration_seconds";
pub const JUNCTION_ROUTE_TABLE_SIZE: &str = "junction_route_table_size";
pub const JUNCTION_HOOK_ERRORS_TOTAL: &str = "junction_hook_errors_total";

static DESCRIBE: Once = Once::new();

/// Register metric descriptions with the installed recorder.
///
/// Call after installing a recorder; repeated calls are ignored.
pub fn describe_metrics() {
    DESCRIBE.call_once(|| {
        describe_counter!(
            JUNCTION_DISPATCH_TOTAL,
            Unit::Count,
            "Total number of requests dispatched, by outcome."
        );
        describe_histogram!(
            JUNCTION_UPSTREAM_DURATION_SECONDS,
            Unit::Seconds,
            "Latency of requests forwarded to upstream targets."
        );
        describe_gauge!(
            JUNCTION_ROUTE_TABLE_SIZE,
            "Number of routes in the active route table."
        );
        describe_counter!(
            JUNCTION_HOOK_ERRORS_TOTAL,
            Unit::Count,
            "Dispatch hook failures that were logged and ignored."
        );
    });
}

/// Count a finished dispatch.
pub fn record_dispatch(method: &str, outcome: &str) {
    counter!(
        JUNCTION_DISPATCH_TOTAL,
        "method" => method.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

pub fn record_upstream_duration(route: &str, duration: std::time::Duration) {
    histogram!(JUNCTION_UPSTREAM_DURATION_SECONDS, "route" => route.to_string())
        .record(duration.as_secs_f64());
}

pub fn set_route_table_size(count: usize) {
    gauge!(JUNCTION_ROUTE_TABLE_SIZE).set(count as f64);
}

pub fn increment_hook_errors(hook: &str, stage: &'static str) {
    counter!(
        JUNCTION_HOOK_ERRORS_TOTAL,
        "hook" => hook.to_string(),
        "stage" => stage
    )
    .increment(1);
}

/// RAII helper measuring upstream call duration, recorded on drop so early
/// returns and timeouts are still measured.
pub struct UpstreamTimer {
    start: Instant,
    route: String,
}

impl UpstreamTimer {
    pub fn new(route: &str) -> Self {
        Self {
            start: Instant::now(),
            route: route.to_string(),
        }
    }
}

impl Drop for UpstreamTimer {
    fn drop(&mut self) {
        record_upstream_duration(&self.route, self.start.elapsed());
    }
}
