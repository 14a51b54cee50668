//! `/health` endpoint body.

use serde::Serialize;
use std::time::Instant;

use crate::relay::RelayStats;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    pub uptime_secs: u64,
    /// Open WebSocket connections.
    pub connections: usize,
    /// Connections currently in the agent pool.
    pub agents: usize,
    /// Sessions not yet expired or swept.
    pub active_sessions: usize,
}

pub fn health_check(start_time: Instant, stats: RelayStats) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections: stats.connections,
        agents: stats.agents,
        active_sessions: stats.sessions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_ok() {
        let resp = health_check(Instant::now(), RelayStats::default());
        assert_eq!(resp.status, "ok");
        assert!(resp.uptime_secs < 2);
    }

    #[test]
    fn uptime_increases() {
        let start = Instant::now()
            .checked_sub(std::time::Duration::from_secs(60))
            .unwrap();
        let resp = health_check(start, RelayStats::default());
        assert!(resp.uptime_secs >= 59);
    }

    #[test]
    fn serialization() {
        let stats = RelayStats {
            connections: 2,
            agents: 1,
            sessions: 3,
        };
        let parsed = serde_json::to_value(health_check(Instant::now(), stats)).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["connections"], 2);
        assert_eq!(parsed["agents"], 1);
        assert_eq!(parsed["active_sessions"], 3);
        assert!(parsed["uptime_secs"].is_number());
    }
}
