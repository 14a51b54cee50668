use crate::ids::SessionId;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Never created, or already past its TTL.
    #[error("session not found or expired: {0}")]
    NotFound(SessionId),
}

impl SessionError {
    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
        }
    }
}

/// A WebSocket frame that could not be turned into an [`crate::InboundEvent`].
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid JSON envelope: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("unknown event: {0}")]
    UnknownEvent(String),

    #[error("invalid data for {event}: {reason}")]
    InvalidData { event: String, reason: String },
}

impl ProtocolError {
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) => "invalid_json",
            Self::UnknownEvent(_) => "unknown_event",
            Self::InvalidData { .. } => "invalid_data",
        }
    }
}
