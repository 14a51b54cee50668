//! Who is connected, who is an agent, and which room each customer sits in.
//!
//! The registry does not enforce exclusive roles: a connection that announced
//! itself as an agent and then joined a room is both.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde_json::Value;
use tracing::debug;

use crate::ids::{ConnId, SessionId};

#[derive(Debug, Default)]
pub struct ParticipantRegistry {
    connections: BTreeSet<ConnId>,
    agents: BTreeMap<ConnId, Value>,
    rooms: HashMap<SessionId, BTreeSet<ConnId>>,
    membership: HashMap<ConnId, SessionId>,
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a freshly accepted connection.
    pub fn connect(&mut self, conn: ConnId) {
        let _ = self.connections.insert(conn);
    }

    /// Forget everything about a connection. Safe to call repeatedly.
    pub fn disconnect(&mut self, conn: &ConnId) {
        let _ = self.connections.remove(conn);
        self.unregister(conn);
        self.leave_room(conn);
    }

    /// Add a connection to the agent pool. Re-registering replaces the metadata.
    pub fn register_agent(&mut self, conn: ConnId, metadata: Value) {
        debug!(conn_id = %conn, "agent registered");
        let _ = self.agents.insert(conn, metadata);
    }

    /// Drop a connection from the agent pool, if it was there.
    pub fn unregister(&mut self, conn: &ConnId) -> bool {
        self.agents.remove(conn).is_some()
    }

    /// Put a connection in a session room. A connection sits in at most one
    /// room, so joining another one leaves the previous.
    pub fn join_room(&mut self, conn: ConnId, session_id: SessionId) {
        if self.membership.get(&conn) == Some(&session_id) {
            return;
        }
        self.leave_room(&conn);
        let _ = self
            .rooms
            .entry(session_id.clone())
            .or_default()
            .insert(conn.clone());
        let _ = self.membership.insert(conn, session_id);
    }

    /// Remove a connection from its room, dropping the room once empty.
    pub fn leave_room(&mut self, conn: &ConnId) -> Option<SessionId> {
        let session_id = self.membership.remove(conn)?;
        if let Some(members) = self.rooms.get_mut(&session_id) {
            let _ = members.remove(conn);
            if members.is_empty() {
                let _ = self.rooms.remove(&session_id);
            }
        }
        Some(session_id)
    }

    pub fn is_connected(&self, conn: &ConnId) -> bool {
        self.connections.contains(conn)
    }

    pub fn is_agent(&self, conn: &ConnId) -> bool {
        self.agents.contains_key(conn)
    }

    pub fn agent_metadata(&self, conn: &ConnId) -> Option<&Value> {
        self.agents.get(conn)
    }

    pub fn room_of(&self, conn: &ConnId) -> Option<&SessionId> {
        self.membership.get(conn)
    }

    pub fn agents(&self) -> impl Iterator<Item = &ConnId> {
        self.agents.keys()
    }

    pub fn room_members(&self, session_id: &SessionId) -> impl Iterator<Item = &ConnId> {
        self.rooms.get(session_id).into_iter().flatten()
    }

    pub fn connections(&self) -> impl Iterator<Item = &ConnId> {
        self.connections.iter()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
