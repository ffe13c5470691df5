//! Observability module for the scheduling service.
//!
//! Provides metrics definitions and the Prometheus recorder setup.

pub mod metrics;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder and return the render handle.
///
/// Must be called once per process, before any metric is recorded.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}
