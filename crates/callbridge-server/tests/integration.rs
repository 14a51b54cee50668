//! End-to-end tests using real WebSocket and HTTP clients.

use std::sync::Arc;
use std::time::Duration;

use callbridge_core::ManualClock;
use callbridge_server::{start_with_clock, ServerConfig, ServerHandle};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

struct TestServer {
    handle: ServerHandle,
    clock: ManualClock,
    _static_dir: tempfile::TempDir,
}

impl TestServer {
    async fn boot() -> Self {
        let static_dir = tempfile::tempdir().unwrap();
        std::fs::write(static_dir.path().join("customer.html"), "<p>customer</p>").unwrap();

        let config = ServerConfig {
            static_dir: static_dir.path().to_path_buf(),
            ..ServerConfig::default()
        };
        let clock = ManualClock::default();
        let handle = start_with_clock(config, None, Arc::new(clock.clone()))
            .await
            .unwrap();
        Self {
            handle,
            clock,
            _static_dir: static_dir,
        }
    }

    fn http(&self, path: &str) -> String {
        format!("http://{}{path}", self.handle.local_addr())
    }

    async fn create_session(&self, name: &str) -> String {
        let resp: Value = reqwest::Client::new()
            .post(self.http("/api/create-session"))
            .json(&json!({"customerName": name, "customerPhone": "+15550100"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        resp["sessionId"].as_str().unwrap().to_string()
    }

    async fn health(&self) -> Value {
        reqwest::get(self.http("/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    /// Connect and consume the `connected` greeting.
    async fn connect(&self) -> (WsStream, String) {
        let url = format!("ws://{}/ws", self.handle.local_addr());
        let (mut ws, _) = connect_async(url).await.unwrap();
        let hello = read_json(&mut ws).await;
        assert_eq!(hello["event"], "connected");
        let id = hello["data"]["connectionId"].as_str().unwrap().to_string();
        (ws, id)
    }

    async fn agent(&self) -> WsStream {
        let before = self.health().await["agents"].as_u64().unwrap();
        let (mut ws, _) = self.connect().await;
        send(&mut ws, "join-as-agent", json!({"name": "agent"})).await;
        self.wait_for(|h| h["agents"].as_u64() == Some(before + 1)).await;
        ws
    }

    async fn wait_for(&self, pred: impl Fn(&Value) -> bool) {
        for _ in 0..100 {
            if pred(&self.health().await) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("condition not reached: {}", self.health().await);
    }
}

async fn send(ws: &mut WsStream, event: &str, data: Value) {
    let frame = json!({"event": event, "data": data}).to_string();
    ws.send(Message::text(frame)).await.unwrap();
}

/// Read the next text message as JSON.
async fn read_json(ws: &mut WsStream) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timeout waiting for message")
            .expect("stream closed")
            .expect("ws error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Events from one sender reach the relay in order, so a marker sent after
/// an action arrives after anything that action produced.
async fn send_marker(ws: &mut WsStream, tag: &str) {
    send(ws, "webrtc-ice-candidate", json!({"sessionId": "marker", "tag": tag})).await;
}

fn is_marker(msg: &Value, tag: &str) -> bool {
    msg["event"] == "webrtc-ice-candidate" && msg["data"]["tag"] == tag
}

#[tokio::test]
async fn customer_join_notifies_agents() {
    let server = TestServer::boot().await;
    let mut a1 = server.agent().await;
    let mut a2 = server.agent().await;
    let sid = server.create_session("Ada").await;
    let (mut customer, _) = server.connect().await;

    send(&mut customer, "join-session", json!(sid)).await;

    for agent in [&mut a1, &mut a2] {
        let msg = read_json(agent).await;
        assert_eq!(msg["event"], "customer-joined");
        assert_eq!(msg["data"]["sessionId"], sid.as_str());
        assert_eq!(msg["data"]["session"]["customerName"], "Ada");
        assert_eq!(msg["data"]["session"]["status"], "connected");
        assert!(msg["data"]["session"]["createdAt"].is_number());
    }

    let view: Value = reqwest::get(server.http(&format!("/api/sessions/{sid}")))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(view["status"], "connected");
}

#[tokio::test]
async fn offer_reaches_agents_only() {
    let server = TestServer::boot().await;
    let mut agent = server.agent().await;
    let (mut bystander, _) = server.connect().await;
    let sid = server.create_session("Ada").await;
    let (mut customer, _) = server.connect().await;
    send(&mut customer, "join-session", json!(sid)).await;
    assert_eq!(read_json(&mut agent).await["event"], "customer-joined");

    let offer = json!({"sessionId": sid, "offer": {"type": "offer", "sdp": "v=0"}});
    send(&mut customer, "webrtc-offer", offer.clone()).await;
    send_marker(&mut customer, "after-offer").await;

    let msg = read_json(&mut agent).await;
    assert_eq!(msg["event"], "webrtc-offer");
    assert_eq!(msg["data"], offer);
    assert!(is_marker(&read_json(&mut bystander).await, "after-offer"));
}

#[tokio::test]
async fn answer_reaches_room_only() {
    let server = TestServer::boot().await;
    let mut a1 = server.agent().await;
    let mut a2 = server.agent().await;
    let sid = server.create_session("Ada").await;
    let other_sid = server.create_session("Bo").await;
    let (mut customer, _) = server.connect().await;
    let (mut other_customer, _) = server.connect().await;

    send(&mut customer, "join-session", json!(sid)).await;
    send(&mut other_customer, "join-session", json!(other_sid)).await;
    for agent in [&mut a1, &mut a2] {
        assert_eq!(read_json(agent).await["event"], "customer-joined");
        assert_eq!(read_json(agent).await["event"], "customer-joined");
    }

    let answer = json!({"sessionId": sid, "answer": {"type": "answer", "sdp": "v=0"}});
    send(&mut a1, "webrtc-answer", answer.clone()).await;
    send_marker(&mut a1, "after-answer").await;

    let msg = read_json(&mut customer).await;
    assert_eq!(msg["event"], "webrtc-answer");
    assert_eq!(msg["data"], answer);
    assert!(is_marker(&read_json(&mut customer).await, "after-answer"));
    assert!(is_marker(&read_json(&mut other_customer).await, "after-answer"));
    assert!(is_marker(&read_json(&mut a2).await, "after-answer"));
}

#[tokio::test]
async fn ice_candidate_reaches_everyone_but_sender() {
    let server = TestServer::boot().await;
    let mut agent = server.agent().await;
    let (mut customer, _) = server.connect().await;
    let (mut bystander, _) = server.connect().await;
    server.wait_for(|h| h["connections"] == 3).await;

    let candidate = json!({"sessionId": "s", "candidate": {"candidate": "candidate:1 1 udp"}});
    send(&mut customer, "webrtc-ice-candidate", candidate.clone()).await;

    let msg = read_json(&mut agent).await;
    assert_eq!(msg["event"], "webrtc-ice-candidate");
    assert_eq!(msg["data"], candidate);
    send_marker(&mut agent, "from-agent").await;

    let msg = read_json(&mut bystander).await;
    assert_eq!(msg["data"], candidate);
    assert!(is_marker(&read_json(&mut bystander).await, "from-agent"));
    // The customer sees the agent's marker but never its own candidate.
    assert!(is_marker(&read_json(&mut customer).await, "from-agent"));
}

#[tokio::test]
async fn join_unknown_or_expired_session_is_silent() {
    let server = TestServer::boot().await;
    let mut agent = server.agent().await;
    let (mut customer, _) = server.connect().await;

    send(&mut customer, "join-session", json!("no-such-session")).await;

    let sid = server.create_session("Ada").await;
    server.clock.advance(chrono::TimeDelta::minutes(31));
    send(&mut customer, "join-session", json!(sid)).await;
    send_marker(&mut customer, "after-joins").await;

    assert!(is_marker(&read_json(&mut agent).await, "after-joins"));

    // Not in any room: an answer for that session does not reach it.
    send(&mut agent, "webrtc-answer", json!({"sessionId": sid})).await;
    send_marker(&mut agent, "after-answer").await;
    assert!(is_marker(&read_json(&mut customer).await, "after-answer"));

    let resp = reqwest::get(server.http(&format!("/customer/{sid}"))).await.unwrap();
    assert_eq!(resp.status(), 404);
    assert_eq!(resp.text().await.unwrap(), "Session not found or expired");
}

#[tokio::test]
async fn disconnected_agent_is_forgotten() {
    let server = TestServer::boot().await;
    let mut old_agent = server.agent().await;
    old_agent.close(None).await.unwrap();
    server.wait_for(|h| h["agents"] == 0 && h["connections"] == 0).await;

    let mut new_agent = server.agent().await;
    let sid = server.create_session("Ada").await;
    let (mut customer, _) = server.connect().await;
    send(&mut customer, "join-session", json!(sid)).await;

    let msg = read_json(&mut new_agent).await;
    assert_eq!(msg["event"], "customer-joined");
    assert_eq!(server.health().await["agents"], 1);
}

#[tokio::test]
async fn malformed_frames_are_ignored() {
    let server = TestServer::boot().await;
    let mut agent = server.agent().await;
    let (mut customer, _) = server.connect().await;

    customer.send(Message::text("not json")).await.unwrap();
    send(&mut customer, "unknown-event", json!({})).await;
    send(&mut customer, "join-session", json!({"id": 1})).await;
    send_marker(&mut customer, "still-alive").await;

    assert!(is_marker(&read_json(&mut agent).await, "still-alive"));
}

#[tokio::test]
async fn customer_page_and_health() {
    let server = TestServer::boot().await;
    let sid = server.create_session("Ada").await;

    let resp = reqwest::get(server.http(&format!("/customer/{sid}"))).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "<p>customer</p>");

    let health = server.health().await;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["active_sessions"], 1);
}

#[tokio::test]
async fn shutdown_closes_sockets() {
    let server = TestServer::boot().await;
    let (mut ws, _) = server.connect().await;
    server.handle.shutdown(Some(Duration::from_secs(2))).await;

    let closed = timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok());
}
