use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::TelemetryError;

/// Configuration for the logging subscriber.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default filter directive. Overridden by the `RUST_LOG` env var.
    pub log_level: String,
    /// JSON lines on stdout instead of compact text.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

/// `RUST_LOG` if set and valid, else `level`, else `info`.
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Call once at startup.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = build_filter(&config.log_level);

    let fmt_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_target(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter))
        .try_init()?;
    Ok(())
}
