use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::Method;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use callbridge_core::{Clock, RelayEngine, SystemClock};
use callbridge_telemetry::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL};
use callbridge_telemetry::PrometheusHandle;
use metrics::{counter, gauge};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::client::{self, ClientRegistry};
use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::http;
use crate::relay::{self, RelayHandle};
use crate::shutdown::ShutdownCoordinator;

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: RelayHandle,
    pub clients: Arc<ClientRegistry>,
    pub static_dir: PathBuf,
    /// Host used in session links when the request carries no `Host` header.
    pub default_host: String,
    pub start_time: Instant,
    pub metrics: Option<PrometheusHandle>,
    pub ping_interval: Duration,
    pub shutdown: ShutdownCoordinator,
}

/// Build the Axum router with all routes. Unmatched paths fall through to
/// the static directory.
pub fn build_router(state: AppState) -> Router {
    let static_files = ServeDir::new(&state.static_dir);
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/api/create-session", post(http::create_session))
        .route("/api/sessions/{session_id}", get(http::get_session))
        .route("/customer/{session_id}", get(http::customer_page))
        .route("/health", get(http::health))
        .route("/metrics", get(http::metrics))
        .route("/ws", get(ws_handler))
        .fallback_service(static_files)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Bind, spawn the relay and serve. Returns once the listener is up.
pub async fn start(
    config: ServerConfig,
    metrics: Option<PrometheusHandle>,
) -> Result<ServerHandle, ServerError> {
    start_with_clock(config, metrics, Arc::new(SystemClock)).await
}

/// [`start`] with an explicit clock for session expiry.
pub async fn start_with_clock(
    config: ServerConfig,
    metrics: Option<PrometheusHandle>,
    clock: Arc<dyn Clock>,
) -> Result<ServerHandle, ServerError> {
    let shutdown = ShutdownCoordinator::new();
    let clients = Arc::new(ClientRegistry::new(config.max_send_queue));

    let engine = RelayEngine::new(config.session_ttl, clock);
    let (relay, relay_task) = relay::spawn_relay(
        engine,
        Arc::clone(&clients),
        config.sweep_interval,
        shutdown.token(),
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: config.bind_addr,
            source,
        })?;
    let local_addr = listener.local_addr()?;

    let state = AppState {
        relay,
        clients,
        static_dir: config.static_dir.clone(),
        default_host: local_addr.to_string(),
        start_time: Instant::now(),
        metrics,
        ping_interval: config.ping_interval,
        shutdown: shutdown.clone(),
    };
    let router = build_router(state);

    tracing::info!(
        addr = %local_addr,
        static_dir = %config.static_dir.display(),
        session_ttl_secs = config.session_ttl.as_secs(),
        "callbridge server started"
    );

    let token = shutdown.token();
    let server_task = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router)
            .with_graceful_shutdown(token.cancelled_owned())
            .await
        {
            tracing::error!(error = %err, "http server stopped");
        }
    });

    Ok(ServerHandle {
        local_addr,
        shutdown,
        tasks: vec![server_task, relay_task],
    })
}

/// Handle returned by [`start`]; keeps background tasks alive.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: ShutdownCoordinator,
    tasks: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn shutdown_coordinator(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    /// Stop accepting, close every socket and stop the relay.
    pub async fn shutdown(self, timeout: Option<Duration>) {
        self.shutdown.graceful_shutdown(self.tasks, timeout).await;
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (conn_id, rx) = state.clients.register();
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);
    tracing::info!(conn_id = %conn_id, "websocket client connected");

    client::handle_ws_connection(
        socket,
        conn_id.clone(),
        rx,
        Arc::clone(&state.clients),
        state.relay.clone(),
        state.ping_interval,
        state.shutdown.token(),
    )
    .await;

    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    tracing::info!(conn_id = %conn_id, "websocket client disconnected");
}
