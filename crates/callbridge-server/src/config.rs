//! Runtime configuration of the server, resolved from settings.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use callbridge_core::DEFAULT_SESSION_TTL;
use callbridge_settings::{CallbridgeSettings, SettingsError};

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub static_dir: PathBuf,
    pub max_send_queue: usize,
    pub ping_interval: Duration,
    pub session_ttl: Duration,
    pub sweep_interval: Duration,
}

impl ServerConfig {
    pub fn from_settings(settings: &CallbridgeSettings) -> Result<Self, SettingsError> {
        Ok(Self {
            bind_addr: settings.server.bind_addr()?,
            static_dir: settings.server.static_dir.clone(),
            max_send_queue: settings.server.max_send_queue,
            ping_interval: settings.server.ping_interval(),
            session_ttl: settings.session.ttl(),
            sweep_interval: settings.session.sweep_interval(),
        })
    }
}

impl Default for ServerConfig {
    /// Loopback on an ephemeral port.
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            static_dir: PathBuf::from("public"),
            max_send_queue: 256,
            ping_interval: Duration::from_secs(30),
            session_ttl: DEFAULT_SESSION_TTL,
            sweep_interval: Duration::from_secs(30),
        }
    }
}
