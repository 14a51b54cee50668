use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use callbridge_core::SessionError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The relay actor has stopped (shutdown in progress).
    #[error("relay is not running")]
    RelayUnavailable,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::RelayUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Session(SessionError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Bind { .. } | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::RelayUnavailable => "relay_unavailable",
            Self::Session(e) => e.error_kind(),
            Self::Bind { .. } => "bind",
            Self::Io(_) => "io",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, kind = self.error_kind(), "request failed");
        }
        // io and bind details stay in the log
        let message = match &self {
            Self::Bind { .. } | Self::Io(_) => "internal server error".to_string(),
            _ => self.to_string(),
        };
        let body = json!({ "error": self.error_kind(), "message": message });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callbridge_core::SessionId;

    #[test]
    fn not_found_maps_to_404() {
        let err: ServerError = SessionError::NotFound(SessionId::from_raw("x")).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_kind(), "not_found");
        assert_eq!(err.to_string(), "session not found or expired: x");
    }

    #[tokio::test]
    async fn io_error_body_is_generic() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "/srv/public/customer.html");
        let resp = ServerError::Io(io).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(resp.into_body(), 4096).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "io");
        assert_eq!(body["message"], "internal server error");
        assert!(!String::from_utf8_lossy(&bytes).contains("/srv/public"));
    }

    #[test]
    fn relay_unavailable_maps_to_503() {
        let resp = ServerError::RelayUnavailable.into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
