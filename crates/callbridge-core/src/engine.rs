//! Event handlers of the signaling relay.
//!
//! [`RelayEngine`] validates inbound events against the [`SessionStore`] and
//! resolves their recipients through the [`ParticipantRegistry`]. It never
//! touches a socket: every handler returns the [`Dispatch`]es to deliver.
//! The sender of an event is never one of its recipients.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::errors::SessionError;
use crate::ids::{ConnId, SessionId};
use crate::protocol::{InboundEvent, OutboundEvent, SignalPayload};
use crate::registry::ParticipantRegistry;
use crate::session::SessionView;
use crate::store::SessionStore;

/// One outbound event and the connections it goes to.
#[derive(Clone, Debug, PartialEq)]
pub struct Dispatch {
    pub recipients: Vec<ConnId>,
    pub event: OutboundEvent,
}

impl Dispatch {
    fn fan_out<'a>(
        recipients: impl Iterator<Item = &'a ConnId>,
        sender: &ConnId,
        event: OutboundEvent,
    ) -> Option<Self> {
        let recipients: Vec<ConnId> = recipients.filter(|c| *c != sender).cloned().collect();
        if recipients.is_empty() {
            return None;
        }
        Some(Self { recipients, event })
    }
}

pub struct RelayEngine {
    store: SessionStore,
    registry: ParticipantRegistry,
}

impl RelayEngine {
    pub fn new(session_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: SessionStore::new(session_ttl, clock),
            registry: ParticipantRegistry::new(),
        }
    }

    pub fn create_session(
        &mut self,
        customer_name: impl Into<String>,
        customer_phone: impl Into<String>,
    ) -> SessionId {
        self.store.create(customer_name, customer_phone)
    }

    pub fn get_session(&self, id: &SessionId) -> Result<SessionView, SessionError> {
        self.store.get(id).map(|s| s.view())
    }

    /// Track a new connection and greet it with its id.
    pub fn connect(&mut self, conn: ConnId) -> Dispatch {
        debug!(conn_id = %conn, "connection tracked");
        self.registry.connect(conn.clone());
        Dispatch {
            recipients: vec![conn.clone()],
            event: OutboundEvent::Connected {
                connection_id: conn,
            },
        }
    }

    /// Drop every association of a connection. Idempotent.
    pub fn disconnect(&mut self, conn: &ConnId) {
        let was_agent = self.registry.is_agent(conn);
        let room = self.registry.room_of(conn).cloned();
        self.registry.disconnect(conn);
        debug!(conn_id = %conn, was_agent, room = ?room, "connection released");
    }

    pub fn handle(&mut self, sender: &ConnId, event: InboundEvent) -> Vec<Dispatch> {
        match event {
            InboundEvent::JoinAsAgent { metadata } => {
                self.join_as_agent(sender, metadata);
                Vec::new()
            }
            InboundEvent::JoinSession { session_id } => {
                self.join_session(sender, session_id).into_iter().collect()
            }
            InboundEvent::WebrtcOffer(payload) => self.offer(sender, payload).into_iter().collect(),
            InboundEvent::WebrtcAnswer(payload) => {
                self.answer(sender, payload).into_iter().collect()
            }
            InboundEvent::WebrtcIceCandidate(payload) => {
                self.ice_candidate(sender, payload).into_iter().collect()
            }
        }
    }

    fn join_as_agent(&mut self, sender: &ConnId, metadata: Value) {
        info!(conn_id = %sender, "agent joined pool");
        self.registry.register_agent(sender.clone(), metadata);
    }

    fn join_session(&mut self, sender: &ConnId, session_id: SessionId) -> Option<Dispatch> {
        let view = match self.store.mark_connected(&session_id) {
            Ok(session) => session.view(),
            Err(err) => {
                warn!(conn_id = %sender, session_id = %session_id, error = %err, "join-session rejected");
                return None;
            }
        };
        self.registry.join_room(sender.clone(), session_id.clone());
        info!(conn_id = %sender, session_id = %session_id, "customer joined session");

        Dispatch::fan_out(
            self.registry.agents(),
            sender,
            OutboundEvent::CustomerJoined {
                session_id,
                session: view,
            },
        )
    }

    fn offer(&self, sender: &ConnId, payload: SignalPayload) -> Option<Dispatch> {
        Dispatch::fan_out(
            self.registry.agents(),
            sender,
            OutboundEvent::WebrtcOffer(payload),
        )
    }

    fn answer(&self, sender: &ConnId, payload: SignalPayload) -> Option<Dispatch> {
        let Some(session_id) = payload.session_id() else {
            warn!(conn_id = %sender, "webrtc-answer without sessionId dropped");
            return None;
        };
        Dispatch::fan_out(
            self.registry.room_members(&session_id),
            sender,
            OutboundEvent::WebrtcAnswer(payload),
        )
    }

    // Goes to every connection, not just the session's parties.
    fn ice_candidate(&self, sender: &ConnId, payload: SignalPayload) -> Option<Dispatch> {
        Dispatch::fan_out(
            self.registry.connections(),
            sender,
            OutboundEvent::WebrtcIceCandidate(payload),
        )
    }

    /// Expire every session due at `now`.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> Vec<SessionId> {
        self.store.expire_due(now)
    }

    pub fn sweep_now(&mut self) -> Vec<SessionId> {
        self.store.expire_due_now()
    }

    pub fn expire_session(&mut self, id: &SessionId) -> bool {
        self.store.expire(id)
    }

    pub fn session_count(&self) -> usize {
        self.store.len()
    }

    pub fn connection_count(&self) -> usize {
        self.registry.connection_count()
    }

    pub fn agent_count(&self) -> usize {
        self.registry.agent_count()
    }

    pub fn registry(&self) -> &ParticipantRegistry {
        &self.registry
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }
}
