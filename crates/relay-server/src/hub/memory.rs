//! In-process [`ConnectionAdapter`] backed by channels.
//!
//! Used by tests and embedders that relay between tasks without a socket.
//! The hub-to-client direction is bounded, so a peer that stops reading
//! eventually stalls the session's outbound pump.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::errors::ConnectionError;
use crate::hub::adapter::ConnectionAdapter;
use crate::hub::payload::Payload;

type Incoming = Result<Payload, ConnectionError>;

/// Hub-side end of an in-memory connection.
pub struct MemoryAdapter {
    incoming: Mutex<mpsc::UnboundedReceiver<Incoming>>,
    outgoing: mpsc::Sender<Payload>,
    closed: CancellationToken,
    close_started: AtomicBool,
}

/// Client-side end of an in-memory connection.
pub struct MemoryPeer {
    to_hub: Option<mpsc::UnboundedSender<Incoming>>,
    from_hub: mpsc::Receiver<Payload>,
    closed: CancellationToken,
}

/// Create a connected adapter/peer pair.
///
/// `outgoing_capacity` bounds how many hub-to-client messages may sit unread
/// before `send` blocks.
pub fn memory_pair(outgoing_capacity: usize) -> (MemoryAdapter, MemoryPeer) {
    let (to_hub, incoming) = mpsc::unbounded_channel();
    let (outgoing, from_hub) = mpsc::channel(outgoing_capacity.max(1));
    let closed = CancellationToken::new();
    let adapter = MemoryAdapter {
        incoming: Mutex::new(incoming),
        outgoing,
        closed: closed.clone(),
        close_started: AtomicBool::new(false),
    };
    let peer = MemoryPeer {
        to_hub: Some(to_hub),
        from_hub,
        closed,
    };
    (adapter, peer)
}

#[async_trait]
impl ConnectionAdapter for MemoryAdapter {
    async fn recv(&self) -> Result<Payload, ConnectionError> {
        let mut incoming = tokio::select! {
            biased;
            () = self.closed.cancelled() => return Err(ConnectionError::Closed),
            guard = self.incoming.lock() => guard,
        };
        tokio::select! {
            biased;
            () = self.closed.cancelled() => Err(ConnectionError::Closed),
            next = incoming.recv() => next.unwrap_or(Err(ConnectionError::Closed)),
        }
    }

    async fn send(&self, payload: Payload) -> Result<(), ConnectionError> {
        tokio::select! {
            biased;
            () = self.closed.cancelled() => Err(ConnectionError::Closed),
            res = self.outgoing.send(payload) => res.map_err(|_| ConnectionError::Closed),
        }
    }

    async fn close(&self) {
        if !self.close_started.swap(true, Ordering::AcqRel) {
            self.closed.cancel();
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

impl MemoryPeer {
    /// Send a message to the hub. Returns `false` once disconnected.
    pub fn send(&self, payload: impl Into<Payload>) -> bool {
        self.to_hub
            .as_ref()
            .is_some_and(|tx| tx.send(Ok(payload.into())).is_ok())
    }

    /// Make the hub's next `recv` fail with a transport error.
    pub fn fail(&self, reason: &str) -> bool {
        self.to_hub.as_ref().is_some_and(|tx| {
            tx.send(Err(ConnectionError::Transport(reason.to_owned())))
                .is_ok()
        })
    }

    /// Hang up the client-to-hub direction; the hub sees `Closed`.
    pub fn disconnect(&mut self) {
        self.to_hub = None;
    }

    /// Next message from the hub, or `None` once the hub side is gone.
    pub async fn recv(&mut self) -> Option<Payload> {
        self.from_hub.recv().await
    }

    /// Next message from the hub if one is already queued.
    pub fn try_recv(&mut self) -> Option<Payload> {
        self.from_hub.try_recv().ok()
    }

    /// Whether the hub closed this connection.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolve once the hub closes this connection.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }
}
