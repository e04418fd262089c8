//! `/health` response body.

use std::time::Instant;

use serde::Serialize;

/// Liveness report.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"ok"` while serving, `"shutting_down"` once stopping.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Registered sessions.
    pub connections: usize,
    /// Session limit (`0` = unlimited).
    pub max_sessions: usize,
}

/// Build a health report from live counters.
pub fn health_check(
    start_time: Instant,
    connections: usize,
    max_sessions: usize,
    shutting_down: bool,
) -> HealthResponse {
    HealthResponse {
        status: if shutting_down { "shutting_down" } else { "ok" },
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        max_sessions,
    }
}
