//! # callbridge-server
//!
//! Axum HTTP + WebSocket front of the signaling relay.
//!
//! - `/ws`: JSON event envelopes, one reader and one writer task per socket
//! - `/api/create-session`, `/api/sessions/{id}`, `/customer/{id}`
//! - `/health`, `/metrics`, and the static directory for everything else
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod errors;
pub mod health;
pub mod http;
pub mod relay;
pub mod server;
pub mod shutdown;

pub use config::ServerConfig;
pub use errors::ServerError;
pub use relay::{RelayHandle, RelayStats};
pub use server::{build_router, start, start_with_clock, AppState, ServerHandle};
pub use shutdown::ShutdownCoordinator;
