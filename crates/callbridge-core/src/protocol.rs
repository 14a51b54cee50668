//! Wire format of the signaling socket.
//!
//! Every frame, in both directions, is `{"event": <name>, "data": <payload>}`.
//! Negotiation payloads are never interpreted beyond reading `sessionId`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ProtocolError;
use crate::ids::{ConnId, SessionId};
use crate::session::SessionView;

pub const JOIN_AS_AGENT: &str = "join-as-agent";
pub const JOIN_SESSION: &str = "join-session";
pub const WEBRTC_OFFER: &str = "webrtc-offer";
pub const WEBRTC_ANSWER: &str = "webrtc-answer";
pub const WEBRTC_ICE_CANDIDATE: &str = "webrtc-ice-candidate";
pub const CUSTOMER_JOINED: &str = "customer-joined";
pub const CONNECTED: &str = "connected";

/// Raw frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireEnvelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// Opaque WebRTC negotiation blob (SDP offer/answer or ICE candidate).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalPayload(pub Value);

impl SignalPayload {
    /// The `sessionId` field, when present as a string.
    pub fn session_id(&self) -> Option<SessionId> {
        self.0
            .get("sessionId")
            .and_then(Value::as_str)
            .map(SessionId::from_raw)
    }

    pub fn into_inner(self) -> Value {
        self.0
    }
}

/// Events a client may send.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundEvent {
    JoinAsAgent { metadata: Value },
    JoinSession { session_id: SessionId },
    WebrtcOffer(SignalPayload),
    WebrtcAnswer(SignalPayload),
    WebrtcIceCandidate(SignalPayload),
}

impl InboundEvent {
    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let envelope: WireEnvelope = serde_json::from_str(text)?;
        Self::from_envelope(envelope)
    }

    pub fn from_envelope(envelope: WireEnvelope) -> Result<Self, ProtocolError> {
        let WireEnvelope { event, data } = envelope;
        match event.as_str() {
            JOIN_AS_AGENT => Ok(Self::JoinAsAgent { metadata: data }),
            JOIN_SESSION => match data {
                Value::String(s) => Ok(Self::JoinSession {
                    session_id: SessionId::from_raw(s),
                }),
                other => Err(ProtocolError::InvalidData {
                    event,
                    reason: format!("expected a session id string, got {}", json_kind(&other)),
                }),
            },
            WEBRTC_OFFER => Ok(Self::WebrtcOffer(SignalPayload(data))),
            WEBRTC_ANSWER => Ok(Self::WebrtcAnswer(SignalPayload(data))),
            WEBRTC_ICE_CANDIDATE => Ok(Self::WebrtcIceCandidate(SignalPayload(data))),
            _ => Err(ProtocolError::UnknownEvent(event)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinAsAgent { .. } => JOIN_AS_AGENT,
            Self::JoinSession { .. } => JOIN_SESSION,
            Self::WebrtcOffer(_) => WEBRTC_OFFER,
            Self::WebrtcAnswer(_) => WEBRTC_ANSWER,
            Self::WebrtcIceCandidate(_) => WEBRTC_ICE_CANDIDATE,
        }
    }
}

/// Events the server sends.
#[derive(Clone, Debug, PartialEq)]
pub enum OutboundEvent {
    /// Greeting sent right after the socket is accepted.
    Connected { connection_id: ConnId },
    CustomerJoined {
        session_id: SessionId,
        session: SessionView,
    },
    WebrtcOffer(SignalPayload),
    WebrtcAnswer(SignalPayload),
    WebrtcIceCandidate(SignalPayload),
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => CONNECTED,
            Self::CustomerJoined { .. } => CUSTOMER_JOINED,
            Self::WebrtcOffer(_) => WEBRTC_OFFER,
            Self::WebrtcAnswer(_) => WEBRTC_ANSWER,
            Self::WebrtcIceCandidate(_) => WEBRTC_ICE_CANDIDATE,
        }
    }

    pub fn to_envelope(&self) -> Result<WireEnvelope, serde_json::Error> {
        let data = match self {
            Self::Connected { connection_id } => {
                serde_json::json!({ "connectionId": connection_id })
            }
            Self::CustomerJoined {
                session_id,
                session,
            } => serde_json::json!({
                "sessionId": session_id,
                "session": serde_json::to_value(session)?,
            }),
            Self::WebrtcOffer(p) | Self::WebrtcAnswer(p) | Self::WebrtcIceCandidate(p) => {
                p.0.clone()
            }
        };
        Ok(WireEnvelope {
            event: self.name().to_string(),
            data,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_envelope()?)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStatus;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn parse_join_as_agent_with_metadata() {
        let ev = InboundEvent::parse(r#"{"event":"join-as-agent","data":{"name":"Bo"}}"#).unwrap();
        assert_eq!(ev, InboundEvent::JoinAsAgent { metadata: json!({"name": "Bo"}) });
    }

    #[test]
    fn parse_join_as_agent_without_data() {
        let ev = InboundEvent::parse(r#"{"event":"join-as-agent"}"#).unwrap();
        assert_eq!(ev, InboundEvent::JoinAsAgent { metadata: Value::Null });
    }

    #[test]
    fn parse_join_session_bare_string() {
        let ev = InboundEvent::parse(r#"{"event":"join-session","data":"abc"}"#).unwrap();
        assert_eq!(
            ev,
            InboundEvent::JoinSession { session_id: SessionId::from_raw("abc") }
        );
        assert_eq!(ev.name(), JOIN_SESSION);
    }

    #[test]
    fn parse_join_session_rejects_non_string() {
        let err = InboundEvent::parse(r#"{"event":"join-session","data":{"id":"abc"}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidData { .. }));
        assert!(err.to_string().contains("got object"));
    }

    #[test]
    fn parse_signal_events_keep_payload() {
        let ev = InboundEvent::parse(
            r#"{"event":"webrtc-answer","data":{"sessionId":"s1","sdp":"y","extra":[1,2]}}"#,
        )
        .unwrap();
        let InboundEvent::WebrtcAnswer(payload) = ev else {
            panic!("expected answer");
        };
        assert_eq!(payload.session_id(), Some(SessionId::from_raw("s1")));
        assert_eq!(payload.0["extra"], json!([1, 2]));
    }

    #[test]
    fn parse_unknown_event() {
        let err = InboundEvent::parse(r#"{"event":"chat","data":1}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownEvent(ref e) if e == "chat"));
    }

    #[test]
    fn parse_invalid_json() {
        let err = InboundEvent::parse("not json").unwrap_err();
        assert_eq!(err.error_kind(), "invalid_json");
    }

    #[test]
    fn payload_without_session_id() {
        let payload = SignalPayload(json!({"sdp": "x"}));
        assert!(payload.session_id().is_none());
        assert!(SignalPayload(json!({"sessionId": 7})).session_id().is_none());
    }

    #[test]
    fn signal_relay_is_verbatim() {
        let data = json!({"sessionId": "s1", "candidate": "c", "sdpMLineIndex": 0});
        let out = OutboundEvent::WebrtcIceCandidate(SignalPayload(data.clone()));
        let env = out.to_envelope().unwrap();
        assert_eq!(env.event, WEBRTC_ICE_CANDIDATE);
        assert_eq!(env.data, data);
    }

    #[test]
    fn customer_joined_wire_shape() {
        let view = SessionView {
            customer_name: "Ada".into(),
            customer_phone: "1".into(),
            created_at: Utc.timestamp_millis_opt(42).unwrap(),
            status: SessionStatus::Connected,
        };
        let out = OutboundEvent::CustomerJoined {
            session_id: SessionId::from_raw("s1"),
            session: view,
        };
        let json: Value = serde_json::from_str(&out.to_json().unwrap()).unwrap();
        assert_eq!(json["event"], "customer-joined");
        assert_eq!(json["data"]["sessionId"], "s1");
        assert_eq!(json["data"]["session"]["status"], "connected");
        assert_eq!(json["data"]["session"]["createdAt"], 42);
    }

    #[test]
    fn connected_greeting() {
        let out = OutboundEvent::Connected { connection_id: ConnId::from_raw("conn_1") };
        let env = out.to_envelope().unwrap();
        assert_eq!(env.event, "connected");
        assert_eq!(env.data["connectionId"], "conn_1");
    }
}
