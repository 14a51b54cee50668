//! The relay actor: the one task that owns the [`RelayEngine`].
//!
//! WebSocket readers and HTTP handlers talk to it through a [`RelayHandle`].
//! Commands are processed one at a time, so every engine mutation is atomic
//! with respect to every other event.

use std::sync::Arc;
use std::time::Duration;

use callbridge_core::{
    ConnId, Dispatch, InboundEvent, RelayEngine, SessionError, SessionId, SessionView,
};
use callbridge_telemetry::metrics::{
    RELAY_DISPATCH_DROPS_TOTAL, RELAY_EVENTS_TOTAL, RELAY_REJECTED_TOTAL, SESSIONS_ACTIVE,
    SESSIONS_CREATED_TOTAL, SESSIONS_EXPIRED_TOTAL,
};
use metrics::{counter, gauge};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::ClientRegistry;
use crate::errors::ServerError;

const MAILBOX_CAPACITY: usize = 1024;
// tokio intervals panic on a zero period
const MIN_TICK: Duration = Duration::from_millis(10);

/// Live counters, for `/health`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub connections: usize,
    pub agents: usize,
    pub sessions: usize,
}

enum Command {
    Connect {
        conn: ConnId,
    },
    Disconnect {
        conn: ConnId,
    },
    Inbound {
        conn: ConnId,
        text: String,
    },
    CreateSession {
        customer_name: String,
        customer_phone: String,
        reply: oneshot::Sender<SessionId>,
    },
    GetSession {
        id: SessionId,
        reply: oneshot::Sender<Result<SessionView, SessionError>>,
    },
    Stats {
        reply: oneshot::Sender<RelayStats>,
    },
}

#[derive(Clone)]
pub struct RelayHandle {
    tx: mpsc::Sender<Command>,
}

impl RelayHandle {
    async fn send(&self, cmd: Command) -> Result<(), ServerError> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| ServerError::RelayUnavailable)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ServerError> {
        let (reply, rx) = oneshot::channel();
        self.send(make(reply)).await?;
        rx.await.map_err(|_| ServerError::RelayUnavailable)
    }

    pub async fn connect(&self, conn: ConnId) -> Result<(), ServerError> {
        self.send(Command::Connect { conn }).await
    }

    pub async fn disconnect(&self, conn: ConnId) -> Result<(), ServerError> {
        self.send(Command::Disconnect { conn }).await
    }

    /// Forward a raw text frame from `conn`.
    pub async fn inbound(&self, conn: ConnId, text: String) -> Result<(), ServerError> {
        self.send(Command::Inbound { conn, text }).await
    }

    pub async fn create_session(
        &self,
        customer_name: String,
        customer_phone: String,
    ) -> Result<SessionId, ServerError> {
        self.request(|reply| Command::CreateSession {
            customer_name,
            customer_phone,
            reply,
        })
        .await
    }

    pub async fn get_session(&self, id: SessionId) -> Result<SessionView, ServerError> {
        let view = self.request(|reply| Command::GetSession { id, reply }).await?;
        Ok(view?)
    }

    pub async fn stats(&self) -> Result<RelayStats, ServerError> {
        self.request(|reply| Command::Stats { reply }).await
    }
}

/// Spawn the actor. It stops when `shutdown` fires or every handle is dropped.
pub fn spawn_relay(
    engine: RelayEngine,
    clients: Arc<ClientRegistry>,
    sweep_interval: Duration,
    shutdown: CancellationToken,
) -> (RelayHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
    let actor = RelayActor { engine, clients };
    let task = tokio::spawn(actor.run(rx, sweep_timer(sweep_interval), shutdown));
    (RelayHandle { tx }, task)
}

/// First tick one period from now.
fn sweep_timer(period: Duration) -> Interval {
    let period = period.max(MIN_TICK);
    let mut sweep = tokio::time::interval_at(Instant::now() + period, period);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
    sweep
}

struct RelayActor {
    engine: RelayEngine,
    clients: Arc<ClientRegistry>,
}

impl RelayActor {
    async fn run(
        mut self,
        mut rx: mpsc::Receiver<Command>,
        mut sweep: Interval,
        shutdown: CancellationToken,
    ) {
        // A due sweep runs ahead of queued commands.
        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                _ = sweep.tick() => self.sweep(),
                cmd = rx.recv() => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => break,
                },
            }
        }
        info!("relay stopped");
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Connect { conn } => {
                let hello = self.engine.connect(conn);
                self.deliver(hello);
            }
            Command::Disconnect { conn } => self.engine.disconnect(&conn),
            Command::Inbound { conn, text } => self.inbound(&conn, &text),
            Command::CreateSession {
                customer_name,
                customer_phone,
                reply,
            } => {
                let id = self.engine.create_session(customer_name, customer_phone);
                counter!(SESSIONS_CREATED_TOTAL).increment(1);
                gauge!(SESSIONS_ACTIVE).set(self.engine.session_count() as f64);
                let _ = reply.send(id);
            }
            Command::GetSession { id, reply } => {
                let _ = reply.send(self.engine.get_session(&id));
            }
            Command::Stats { reply } => {
                let _ = reply.send(RelayStats {
                    connections: self.engine.connection_count(),
                    agents: self.engine.agent_count(),
                    sessions: self.engine.session_count(),
                });
            }
        }
    }

    fn inbound(&mut self, conn: &ConnId, text: &str) {
        let event = match InboundEvent::parse(text) {
            Ok(event) => event,
            Err(err) => {
                warn!(conn_id = %conn, error = %err, "ignoring inbound frame");
                counter!(RELAY_REJECTED_TOTAL, "kind" => err.error_kind()).increment(1);
                return;
            }
        };
        counter!(RELAY_EVENTS_TOTAL, "event" => event.name()).increment(1);
        debug!(conn_id = %conn, event = event.name(), "inbound event");

        for dispatch in self.engine.handle(conn, event) {
            self.deliver(dispatch);
        }
    }

    fn deliver(&self, dispatch: Dispatch) {
        let json = match dispatch.event.to_json() {
            Ok(json) => json,
            Err(err) => {
                warn!(event = dispatch.event.name(), error = %err, "failed to encode event");
                return;
            }
        };
        for recipient in &dispatch.recipients {
            if let Err(err) = self.clients.send_to(recipient, json.clone()) {
                debug!(conn_id = %recipient, event = dispatch.event.name(), ?err, "dispatch dropped");
                counter!(RELAY_DISPATCH_DROPS_TOTAL).increment(1);
            }
        }
    }

    fn sweep(&mut self) {
        let expired = self.engine.sweep_now();
        if !expired.is_empty() {
            info!(count = expired.len(), "expired sessions swept");
            counter!(SESSIONS_EXPIRED_TOTAL).increment(expired.len() as u64);
        }
        gauge!(SESSIONS_ACTIVE).set(self.engine.session_count() as f64);
    }
}
