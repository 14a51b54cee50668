//! Plain HTTP handlers: session creation, customer page, lookups, health, metrics.

use axum::extract::{Path, State};
use axum::http::header::HOST;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use callbridge_core::{SessionError, SessionId, SessionView};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::server::AppState;

pub const CUSTOMER_PAGE: &str = "customer.html";
const SESSION_GONE: &str = "Session not found or expired";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateSessionRequest {
    pub customer_name: String,
    pub customer_phone: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: SessionId,
    pub session_url: String,
}

/// POST /api/create-session
pub async fn create_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, ServerError> {
    let session_id = state
        .relay
        .create_session(body.customer_name, body.customer_phone)
        .await?;
    let session_url = format!(
        "{}/customer/{}",
        public_origin(&headers, &state.default_host),
        session_id
    );
    info!(session_id = %session_id, %session_url, "session link issued");
    Ok(Json(CreateSessionResponse {
        session_id,
        session_url,
    }))
}

/// `<proto>://<host>` as seen by the caller, honoring a reverse proxy's
/// `X-Forwarded-Proto`.
pub fn public_origin(headers: &HeaderMap, default_host: &str) -> String {
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("http");
    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(default_host);
    format!("{proto}://{host}")
}

/// GET /customer/{session_id}
pub async fn customer_page(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Response, ServerError> {
    match state.relay.get_session(SessionId::from_raw(session_id)).await {
        Ok(_) => {
            let page = tokio::fs::read_to_string(state.static_dir.join(CUSTOMER_PAGE)).await?;
            Ok(Html(page).into_response())
        }
        Err(ServerError::Session(SessionError::NotFound(_))) => {
            Ok((StatusCode::NOT_FOUND, SESSION_GONE).into_response())
        }
        Err(err) => Err(err),
    }
}

/// GET /api/sessions/{session_id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionView>, ServerError> {
    let view = state
        .relay
        .get_session(SessionId::from_raw(session_id))
        .await?;
    Ok(Json(view))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ServerError> {
    let stats = state.relay.stats().await?;
    Ok(Json(health::health_check(state.start_time, stats)))
}

/// GET /metrics
pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
