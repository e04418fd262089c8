//! Broadcast hub: registry, fan-out engine and session lifecycle.
//!
//! Every payload read from any client is queued once on the inbound queue,
//! then the [`BroadcastEngine`] offers it to every registered session's
//! mailbox. Each session drains its mailbox to its transport on its own
//! task, so a slow client never delays the others. A client whose mailbox
//! fills up is disconnected.

pub mod adapter;
pub mod broadcast;
pub mod heartbeat;
pub mod memory;
pub mod payload;
pub mod registry;
pub mod session;
pub mod supervisor;
pub mod websocket;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use adapter::ConnectionAdapter;
pub use broadcast::{BroadcastEngine, DispatchReport};
pub use payload::{Payload, SessionId};
pub use registry::Registry;
pub use session::ClientSession;
pub use supervisor::Supervisor;

use crate::config::HubConfig;

/// A payload read from one client, awaiting fan-out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Inbound {
    /// Position in the inbound queue, from [`Registry::next_sequence`].
    pub sequence: u64,
    /// Session that sent it.
    pub origin: SessionId,
    /// The message body.
    pub payload: Payload,
}

impl Inbound {
    /// Pair a payload with its sender and queue position.
    pub fn new(sequence: u64, origin: SessionId, payload: Payload) -> Self {
        Self {
            sequence,
            origin,
            payload,
        }
    }
}

/// Shared hub state: the registry, the inbound queue and the stop signal.
pub struct Hub {
    registry: Arc<Registry>,
    inbound: mpsc::UnboundedSender<Inbound>,
    config: HubConfig,
    cancel: CancellationToken,
}

impl Hub {
    /// Create a hub and its (not yet running) dispatch loop.
    ///
    /// Cancelling `cancel` stops the engine and every session.
    pub fn new(config: HubConfig, cancel: CancellationToken) -> (Arc<Self>, BroadcastEngine) {
        let registry = Arc::new(Registry::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = BroadcastEngine::new(
            registry.clone(),
            rx,
            config.echo_to_sender,
            cancel.clone(),
        );
        let hub = Arc::new(Self {
            registry,
            inbound: tx,
            config,
            cancel,
        });
        (hub, engine)
    }

    /// Queue a payload for fan-out. Returns `false` once the engine is gone.
    ///
    /// Only sessions registered by now will receive it.
    pub fn publish(&self, origin: &SessionId, payload: Payload) -> bool {
        let sequence = self.registry.next_sequence();
        self.inbound
            .send(Inbound::new(sequence, origin.clone(), payload))
            .is_ok()
    }

    /// The session registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Hub configuration.
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Number of registered sessions.
    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Whether the session limit is reached.
    pub fn at_capacity(&self) -> bool {
        let limit = self.config.max_sessions;
        limit > 0 && self.registry.len() >= limit
    }

    /// Token for a new session, cancelled when the hub stops.
    pub fn session_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    /// Stop the engine and every session.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Whether the hub is stopping.
    pub fn is_shutting_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
