//! Session metrics.
//!
//! Counters are recorded through the `metrics` facade; they are no-ops
//! until [`init_metrics`] installs the Prometheus recorder.

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::session::LogoutReason;

// Metric names as constants for consistency
pub const SESSION_RENEWALS_TOTAL: &str = "session_renewals_total";
pub const SESSION_WARNINGS_TOTAL: &str = "session_warnings_total";
pub const SESSION_FORCED_LOGOUTS_TOTAL: &str = "session_forced_logouts_total";
pub const SESSION_STORAGE_FAILURES_TOTAL: &str = "session_storage_failures_total";

/// Install the Prometheus recorder and return a handle for rendering.
///
/// This should be called once during startup.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    describe_counter!(
        SESSION_RENEWALS_TOTAL,
        "Session renewal attempts by outcome (success/failed)"
    );
    describe_counter!(SESSION_WARNINGS_TOTAL, "Expiry warnings shown to the user");
    describe_counter!(
        SESSION_FORCED_LOGOUTS_TOTAL,
        "Sessions ended by the tracker, by reason"
    );
    describe_counter!(
        SESSION_STORAGE_FAILURES_TOTAL,
        "Failed reads or writes of mirrored session state"
    );

    Ok(handle)
}

pub fn record_renewal(success: bool) {
    let outcome = if success { "success" } else { "failed" };
    counter!(SESSION_RENEWALS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_warning_shown() {
    counter!(SESSION_WARNINGS_TOTAL).increment(1);
}

pub fn record_forced_logout(reason: LogoutReason) {
    counter!(SESSION_FORCED_LOGOUTS_TOTAL, "reason" => reason.as_str()).increment(1);
}

pub fn record_storage_failure(operation: &'static str) {
    counter!(SESSION_STORAGE_FAILURES_TOTAL, "operation" => operation).increment(1);
}
