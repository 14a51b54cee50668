//! Process-wide observability: the tracing subscriber and the Prometheus
//! recorder. Both are global and installed once, from the binary.

mod logging;
pub mod metrics;

pub use logging::{build_filter, init_logging, TelemetryConfig};
pub use metrics::{install_recorder, PrometheusHandle};

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),

    #[error("failed to install metrics recorder: {0}")]
    Recorder(#[from] metrics_exporter_prometheus::BuildError),
}
