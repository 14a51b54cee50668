//! # callbridge
//!
//! Signaling server binary: loads settings, installs telemetry and serves
//! until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use callbridge_server::ServerConfig;
use callbridge_settings::CallbridgeSettings;
use callbridge_telemetry::TelemetryConfig;
use clap::Parser;

/// WebRTC signaling relay for agent/customer video calls.
#[derive(Parser, Debug)]
#[command(name = "callbridge", about = "WebRTC signaling relay")]
struct Cli {
    /// JSON settings file, deep-merged over the defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings and `CALLBRIDGE_HOST`).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings and `PORT`).
    #[arg(long)]
    port: Option<u16>,

    /// Directory of static assets (overrides settings).
    #[arg(long)]
    static_dir: Option<PathBuf>,
}

impl Cli {
    fn load_settings(&self) -> Result<CallbridgeSettings> {
        let mut settings = match &self.config {
            Some(path) => callbridge_settings::load_settings_from_path(path)
                .with_context(|| format!("failed to load settings from {}", path.display()))?,
            None => callbridge_settings::load_settings().context("failed to load settings")?,
        };
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(dir) = &self.static_dir {
            settings.server.static_dir.clone_from(dir);
        }
        settings.validate()?;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.load_settings()?;

    callbridge_telemetry::init_logging(&TelemetryConfig {
        log_level: settings.logging.level.clone(),
        json: settings.logging.json,
    })?;
    let metrics = match callbridge_telemetry::install_recorder() {
        Ok(handle) => Some(handle),
        Err(err) => {
            tracing::warn!(error = %err, "metrics disabled");
            None
        }
    };

    let config = ServerConfig::from_settings(&settings).context("invalid server settings")?;
    let handle = callbridge_server::start(config, metrics)
        .await
        .context("failed to start server")?;
    tracing::info!(addr = %handle.local_addr(), "callbridge ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;

    tracing::info!("shutting down");
    handle.shutdown(Some(Duration::from_secs(10))).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_overrides() {
        let cli = Cli::parse_from(["callbridge", "--host", "127.0.0.1", "--port", "0"]);
        assert_eq!(cli.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(cli.port, Some(0));
        assert!(cli.config.is_none());
    }

    #[test]
    fn flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server":{"port":4100,"host":"10.0.0.1"}}"#).unwrap();

        let cli = Cli::parse_from([
            "callbridge",
            "--config",
            path.to_str().unwrap(),
            "--port",
            "4200",
        ]);
        let settings = cli.load_settings().unwrap();
        assert_eq!(settings.server.port, 4200);
        assert_eq!(settings.server.host, "10.0.0.1");
    }
}
