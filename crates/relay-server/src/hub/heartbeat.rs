//! Periodic keepalive sentinel sent straight to a session's transport.

use std::sync::Arc;
use std::time::Duration;

use tracing::{trace, warn};

use crate::hub::payload::Payload;
use crate::hub::session::ClientSession;

/// Shortest interval honoured; smaller values, including zero, are raised to it.
pub const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(1);

/// Why a heartbeat loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// Writing the sentinel failed; the connection is dead.
    SendFailed,
    /// The session was shut down.
    Cancelled,
}

/// Send `sentinel` every `interval` until the session ends or a send fails.
///
/// The first sentinel goes out one full interval after the start. Sends go
/// through the adapter, not the mailbox, so keepalives never count against
/// the mailbox capacity.
pub async fn run_heartbeat(
    session: Arc<ClientSession>,
    interval: Duration,
    sentinel: Payload,
) -> HeartbeatResult {
    let mut ticker = tokio::time::interval(interval.max(MIN_HEARTBEAT_INTERVAL));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let _ = ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            () = session.cancelled() => return HeartbeatResult::Cancelled,
            _ = ticker.tick() => {
                if let Err(e) = session.adapter().send(sentinel.clone()).await {
                    warn!(session_id = %session.id(), error = %e, "heartbeat send failed");
                    return HeartbeatResult::SendFailed;
                }
                trace!(session_id = %session.id(), "heartbeat sent");
            }
        }
    }
}
