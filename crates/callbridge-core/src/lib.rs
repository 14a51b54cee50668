//! Session lifecycle and message-relay core.
//!
//! Everything in this crate is synchronous and I/O free. The [`engine::RelayEngine`]
//! owns the [`store::SessionStore`] and the [`registry::ParticipantRegistry`] and
//! turns inbound events into [`engine::Dispatch`]es; delivering those is the
//! transport's job.

pub mod clock;
pub mod engine;
pub mod errors;
pub mod ids;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{Dispatch, RelayEngine};
pub use errors::{ProtocolError, SessionError};
pub use ids::{ConnId, SessionId};
pub use protocol::{InboundEvent, OutboundEvent, SignalPayload, WireEnvelope};
pub use registry::ParticipantRegistry;
pub use session::{Session, SessionStatus, SessionView};
pub use store::{SessionStore, DEFAULT_SESSION_TTL};
