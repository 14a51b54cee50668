use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::SessionId;

/// Session status. Only ever moves forward: `Waiting` → `Connected`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Waiting,
    Connected,
}

/// A support session record as held by the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    pub customer_name: String,
    pub customer_phone: String,
    pub created_at: DateTime<Utc>,
    pub status: SessionStatus,
}

impl Session {
    pub fn new(
        id: SessionId,
        customer_name: impl Into<String>,
        customer_phone: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            customer_name: customer_name.into(),
            customer_phone: customer_phone.into(),
            created_at,
            status: SessionStatus::Waiting,
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            customer_name: self.customer_name.clone(),
            customer_phone: self.customer_phone.clone(),
            created_at: self.created_at,
            status: self.status,
        }
    }
}

/// Read-only projection of a session, as sent to agents and HTTP callers.
///
/// `createdAt` is milliseconds since the Unix epoch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub customer_name: String,
    pub customer_phone: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    pub status: SessionStatus,
}
