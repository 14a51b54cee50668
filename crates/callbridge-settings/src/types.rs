//! Settings type definitions.
//!
//! Every struct is `#[serde(default)]`, so a settings file only needs the
//! keys it changes. Field names are camelCase on disk.

use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings for the signaling server.
///
/// ```json
/// {
///   "server": { "port": 8080 },
///   "session": { "ttlSecs": 600 }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CallbridgeSettings {
    pub server: ServerSettings,
    pub session: SessionSettings,
    pub logging: LoggingSettings,
}

impl CallbridgeSettings {
    /// Reject values that deserialize fine but cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(SettingsError::InvalidValue("server.host is empty".into()));
        }
        let _ = self.server.bind_addr()?;
        if self.server.max_send_queue == 0 {
            return Err(SettingsError::InvalidValue(
                "server.maxSendQueue must be > 0".into(),
            ));
        }
        if self.session.ttl_secs == 0 {
            return Err(SettingsError::InvalidValue("session.ttlSecs must be > 0".into()));
        }
        if self.session.sweep_interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "session.sweepIntervalSecs must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Network listener and transport settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    pub port: u16,
    /// Directory served for every path the router does not handle.
    pub static_dir: PathBuf,
    /// Outbound frames buffered per WebSocket before new ones are dropped.
    pub max_send_queue: usize,
    pub ping_interval_secs: u64,
}

impl ServerSettings {
    /// Listener address for `host` and `port`.
    ///
    /// IP literals (including bare or bracketed IPv6) are used as-is; a
    /// hostname is resolved and its first address taken. An unresolvable
    /// host is an error, never a wider bind.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let host = self.host.trim();
        let literal = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if let Ok(ip) = literal.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, self.port));
        }
        if !is_hostname(host) {
            return Err(SettingsError::InvalidValue(format!(
                "server.host is not an IP address or hostname: {host:?}"
            )));
        }
        (host, self.port)
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| {
                SettingsError::InvalidValue(format!("server.host does not resolve: {host:?}"))
            })
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            static_dir: PathBuf::from("public"),
            max_send_queue: 256,
            ping_interval_secs: 30,
        }
    }
}

/// RFC 1123 labels: alphanumerics and inner hyphens, dot separated.
fn is_hostname(host: &str) -> bool {
    !host.is_empty()
        && host.len() <= 253
        && host.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

/// Session lifetime settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Seconds from creation until a session is discarded.
    pub ttl_secs: u64,
    /// How often due sessions are swept.
    pub sweep_interval_secs: u64,
}

impl SessionSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 30 * 60,
            sweep_interval_secs: 30,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
