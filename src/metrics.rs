use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

use crate::session::SessionState;

/// Install the Prometheus recorder
///
/// Fails if a recorder is already installed for this process.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    init_metric_descriptions();

    Ok(handle)
}

/// Initialize metric descriptions (can be called multiple times safely)
fn init_metric_descriptions() {
    describe_counter!(
        "offerte_calculations_total",
        "Total number of cost calculations"
    );
    describe_histogram!(
        "offerte_calculation_duration_seconds",
        "Cost calculation duration in seconds"
    );
    describe_counter!(
        "offerte_session_transitions_total",
        "Pricing events that changed a quote session"
    );
    describe_gauge!(
        "offerte_open_sessions",
        "Number of open quote sessions"
    );
    describe_counter!(
        "offerte_snapshot_writes_total",
        "Quote snapshot writes by outcome"
    );
    describe_histogram!(
        "offerte_snapshot_write_duration_seconds",
        "Quote snapshot write duration in seconds"
    );
    describe_counter!(
        "offerte_catalog_reloads_total",
        "Catalog reloads by outcome"
    );
    describe_gauge!(
        "offerte_info",
        "Engine version information"
    );

    gauge!("offerte_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

/// Record one calculation pass
pub fn record_calculation(duration: Duration) {
    counter!("offerte_calculations_total").increment(1);
    histogram!("offerte_calculation_duration_seconds").record(duration.as_secs_f64());
}

/// Record a state-changing pricing event
pub fn record_transition(event: &str, from: SessionState, to: SessionState) {
    counter!(
        "offerte_session_transitions_total",
        "event" => event.to_string(),
        "from" => from.to_string(),
        "to" => to.to_string(),
    )
    .increment(1);
}

pub fn set_open_sessions(count: usize) {
    gauge!("offerte_open_sessions").set(count as f64);
}

/// Record a snapshot write; `outcome` is "ok" or "error"
pub fn record_persist(outcome: &str, duration: Duration) {
    counter!(
        "offerte_snapshot_writes_total",
        "outcome" => outcome.to_string(),
    )
    .increment(1);
    histogram!("offerte_snapshot_write_duration_seconds").record(duration.as_secs_f64());
}

pub fn record_catalog_reload(outcome: &str) {
    counter!(
        "offerte_catalog_reloads_total",
        "outcome" => outcome.to_string(),
    )
    .increment(1);
}
