//! In-memory session records with one-shot expiry deadlines.
//!
//! Deadlines live in a min-heap. [`SessionStore::expire_due`] pops everything
//! that is due and is meant to be driven by a periodic tick. Between ticks,
//! [`SessionStore::get`] still reports a session past its deadline as
//! not found, so lookups observe the TTL exactly.
//!
//! Cancelling a deadline ([`SessionStore::expire`]) just drops the record; the
//! stale heap entry is skipped when it is eventually popped.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::errors::SessionError;
use crate::ids::SessionId;
use crate::session::{Session, SessionStatus};

/// Sessions are discarded this long after creation, whatever their status.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

struct Entry {
    session: Session,
    expires_at: DateTime<Utc>,
}

pub struct SessionStore {
    sessions: HashMap<SessionId, Entry>,
    deadlines: BinaryHeap<Reverse<(DateTime<Utc>, SessionId)>>,
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: HashMap::new(),
            deadlines: BinaryHeap::new(),
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            clock,
        }
    }

    pub fn with_system_clock(ttl: Duration) -> Self {
        Self::new(ttl, Arc::new(SystemClock))
    }

    /// Store a new `Waiting` session and schedule its deletion.
    pub fn create(
        &mut self,
        customer_name: impl Into<String>,
        customer_phone: impl Into<String>,
    ) -> SessionId {
        let now = self.clock.now();
        let id = SessionId::new();
        let session = Session::new(id.clone(), customer_name, customer_phone, now);
        let expires_at = now
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        info!(session_id = %id, customer = %session.customer_name, %expires_at, "session created");
        self.deadlines.push(Reverse((expires_at, id.clone())));
        let _ = self.sessions.insert(id.clone(), Entry { session, expires_at });
        id
    }

    /// Look a session up. Does not extend its TTL.
    pub fn get(&self, id: &SessionId) -> Result<&Session, SessionError> {
        let now = self.clock.now();
        match self.sessions.get(id) {
            Some(entry) if entry.expires_at > now => Ok(&entry.session),
            _ => Err(SessionError::NotFound(id.clone())),
        }
    }

    /// Flip a session to `Connected`. Calling it again is a no-op.
    pub fn mark_connected(&mut self, id: &SessionId) -> Result<&Session, SessionError> {
        let now = self.clock.now();
        match self.sessions.get_mut(id) {
            Some(entry) if entry.expires_at > now => {
                if entry.session.status != SessionStatus::Connected {
                    entry.session.status = SessionStatus::Connected;
                    debug!(session_id = %id, "session connected");
                }
                Ok(&entry.session)
            }
            _ => Err(SessionError::NotFound(id.clone())),
        }
    }

    /// Remove a session now. Missing ids are ignored.
    pub fn expire(&mut self, id: &SessionId) -> bool {
        let removed = self.sessions.remove(id).is_some();
        if removed {
            debug!(session_id = %id, "session removed");
        }
        removed
    }

    /// Remove every session whose deadline is at or before `now`.
    pub fn expire_due(&mut self, now: DateTime<Utc>) -> Vec<SessionId> {
        let mut expired = Vec::new();
        while let Some(Reverse((deadline, _))) = self.deadlines.peek() {
            if *deadline > now {
                break;
            }
            let Some(Reverse((deadline, id))) = self.deadlines.pop() else {
                break;
            };
            // Skip heap entries whose record was already removed.
            let live = self
                .sessions
                .get(&id)
                .is_some_and(|entry| entry.expires_at == deadline);
            if live {
                let _ = self.sessions.remove(&id);
                info!(session_id = %id, "session expired");
                expired.push(id);
            }
        }
        expired
    }

    /// Sweep with the store's own clock.
    pub fn expire_due_now(&mut self) -> Vec<SessionId> {
        let now = self.clock.now();
        self.expire_due(now)
    }

    /// Number of records held, including any past due but not yet swept.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Pending deadline entries (including cancelled ones not yet popped).
    pub fn pending_deadlines(&self) -> usize {
        self.deadlines.len()
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
