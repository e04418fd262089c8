//! Session lifecycle: attach, pump on two tasks, tear down exactly once.

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::{ConnectionError, HubError};
use crate::hub::Hub;
use crate::hub::adapter::ConnectionAdapter;
use crate::hub::heartbeat::{HeartbeatResult, run_heartbeat};
use crate::hub::payload::{Payload, SessionId};
use crate::hub::session::ClientSession;
use crate::metrics::{
    HUB_CONNECTIONS_ACTIVE, HUB_CONNECTIONS_TOTAL, HUB_DISCONNECTIONS_TOTAL,
    HUB_MESSAGES_INBOUND_TOTAL, HUB_SESSION_DURATION_SECONDS,
};

/// Max characters of a payload written to the debug log.
const LOG_PREVIEW_CHARS: usize = 120;

/// Why a pump (or the heartbeat) stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PumpExit {
    /// The session was shut down or the hub is stopping.
    Cancelled,
    /// The mailbox sender was dropped.
    MailboxClosed,
    /// The broadcast engine is gone.
    QueueClosed,
    /// The peer closed the connection.
    PeerClosed,
    /// The transport failed.
    Failed(String),
    /// Heartbeat write failed.
    HeartbeatFailed,
}

impl PumpExit {
    /// Short label for logs and the disconnect metric.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::MailboxClosed => "mailbox_closed",
            Self::QueueClosed => "queue_closed",
            Self::PeerClosed => "peer_closed",
            Self::Failed(_) => "transport_error",
            Self::HeartbeatFailed => "heartbeat_failed",
        }
    }
}

impl From<ConnectionError> for PumpExit {
    fn from(e: ConnectionError) -> Self {
        match e {
            ConnectionError::Closed => Self::PeerClosed,
            ConnectionError::Transport(msg) => Self::Failed(msg),
        }
    }
}

/// Attaches connections to the hub and owns their teardown.
#[derive(Clone)]
pub struct Supervisor {
    hub: Arc<Hub>,
}

impl Supervisor {
    /// Supervise sessions of `hub`.
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }

    /// The supervised hub.
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Register a connection and start its pumps.
    ///
    /// On success the session is in the registry and receives every later
    /// broadcast. On failure the adapter has been closed and nothing is
    /// registered.
    pub async fn attach<A>(&self, adapter: A) -> Result<Arc<ClientSession>, HubError>
    where
        A: ConnectionAdapter + 'static,
    {
        let adapter: Arc<dyn ConnectionAdapter> = Arc::new(adapter);
        let config = self.hub.config();

        if self.hub.is_shutting_down() {
            adapter.close().await;
            return Err(HubError::ShuttingDown);
        }

        let (session, mailbox) = ClientSession::new(
            SessionId::new(),
            adapter,
            config.mailbox_capacity,
            self.hub.session_token(),
        );
        if !self
            .hub
            .registry()
            .try_add(session.clone(), config.max_sessions)
        {
            warn!(limit = config.max_sessions, "rejecting connection, hub at capacity");
            let _ = session.shutdown();
            session.adapter().close().await;
            return Err(HubError::AtCapacity {
                limit: config.max_sessions,
            });
        }
        counter!(HUB_CONNECTIONS_TOTAL).increment(1);
        gauge!(HUB_CONNECTIONS_ACTIVE).increment(1.0);

        // Sent before the outbound pump starts, so it precedes any broadcast.
        if let Some(greeting) = &config.greeting {
            if let Err(e) = session.adapter().send(Payload::text(greeting.as_str())).await {
                let _ = self.teardown(&session, &PumpExit::from(e.clone())).await;
                return Err(HubError::Connection(e));
            }
        }

        info!(
            session_id = %session.id(),
            sessions = self.hub.session_count(),
            "client connected"
        );

        self.spawn_inbound(session.clone());
        self.spawn_outbound(session.clone(), mailbox);
        if let Some(hb) = &config.heartbeat {
            self.spawn_heartbeat(session.clone(), hb.interval, Payload::text(hb.payload.as_str()));
        }
        Ok(session)
    }

    /// Shut a session down, unregister it and close its transport.
    ///
    /// Safe to call any number of times from any task; only the first call
    /// closes the adapter and records the disconnect. Returns whether this
    /// call did that work.
    pub async fn teardown(&self, session: &ClientSession, exit: &PumpExit) -> bool {
        let _ = session.shutdown();
        if self.hub.registry().remove(session.id()).is_some() {
            gauge!(HUB_CONNECTIONS_ACTIVE).decrement(1.0);
        }
        if !session.release() {
            return false;
        }
        session.adapter().close().await;

        let age = session.age();
        counter!(HUB_DISCONNECTIONS_TOTAL, "reason" => exit.reason()).increment(1);
        histogram!(HUB_SESSION_DURATION_SECONDS).record(age.as_secs_f64());
        match exit {
            PumpExit::Failed(error) => warn!(
                session_id = %session.id(),
                error = %error,
                "client disconnected after transport error"
            ),
            _ => info!(
                session_id = %session.id(),
                reason = exit.reason(),
                duration_ms = u64::try_from(age.as_millis()).unwrap_or(u64::MAX),
                "client disconnected"
            ),
        }
        true
    }

    fn spawn_inbound(&self, session: Arc<ClientSession>) {
        let supervisor = self.clone();
        drop(tokio::spawn(async move {
            let exit = supervisor.inbound_pump(&session).await;
            debug!(session_id = %session.id(), reason = exit.reason(), "inbound pump stopped");
            let _ = supervisor.teardown(&session, &exit).await;
        }));
    }

    fn spawn_outbound(&self, session: Arc<ClientSession>, mailbox: mpsc::Receiver<Payload>) {
        let supervisor = self.clone();
        drop(tokio::spawn(async move {
            let exit = outbound_pump(&session, mailbox).await;
            debug!(session_id = %session.id(), reason = exit.reason(), "outbound pump stopped");
            let _ = supervisor.teardown(&session, &exit).await;
        }));
    }

    fn spawn_heartbeat(
        &self,
        session: Arc<ClientSession>,
        interval: Duration,
        sentinel: Payload,
    ) {
        let supervisor = self.clone();
        drop(tokio::spawn(async move {
            if run_heartbeat(session.clone(), interval, sentinel).await
                == HeartbeatResult::SendFailed
            {
                let _ = supervisor
                    .teardown(&session, &PumpExit::HeartbeatFailed)
                    .await;
            }
        }));
    }

    /// Read from the transport and queue each payload for fan-out.
    async fn inbound_pump(&self, session: &ClientSession) -> PumpExit {
        loop {
            let received = tokio::select! {
                biased;
                () = session.cancelled() => return PumpExit::Cancelled,
                received = session.adapter().recv() => received,
            };
            let payload = match received {
                Ok(payload) => payload,
                Err(e) => return e.into(),
            };
            debug!(
                session_id = %session.id(),
                kind = payload.kind(),
                bytes = payload.len(),
                body = %payload.preview(LOG_PREVIEW_CHARS),
                "received"
            );
            counter!(HUB_MESSAGES_INBOUND_TOTAL).increment(1);
            if !self.hub.publish(session.id(), payload) {
                return PumpExit::QueueClosed;
            }
        }
    }
}

/// Drain the mailbox to the transport, one payload at a time.
async fn outbound_pump(session: &ClientSession, mut mailbox: mpsc::Receiver<Payload>) -> PumpExit {
    loop {
        let next = tokio::select! {
            biased;
            () = session.cancelled() => return PumpExit::Cancelled,
            next = mailbox.recv() => next,
        };
        let Some(payload) = next else {
            return PumpExit::MailboxClosed;
        };
        if let Err(e) = session.adapter().send(payload).await {
            return e.into();
        }
    }
}
