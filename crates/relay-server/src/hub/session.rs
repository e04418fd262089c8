//! One connected client: identity, transport and outbound mailbox.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::errors::DeliveryError;
use crate::hub::adapter::ConnectionAdapter;
use crate::hub::payload::{Payload, SessionId};

/// A live client session.
///
/// Shared between the registry, the broadcast engine and the session's own
/// pumps. The mailbox sender lives behind a lock so that [`shutdown`] can
/// drop it: after that no enqueue can succeed.
///
/// [`shutdown`]: ClientSession::shutdown
pub struct ClientSession {
    id: SessionId,
    adapter: Arc<dyn ConnectionAdapter>,
    mailbox: Mutex<Option<mpsc::Sender<Payload>>>,
    alive: AtomicBool,
    released: AtomicBool,
    joined_at: AtomicU64,
    cancel: CancellationToken,
    connected_at: Instant,
}

impl ClientSession {
    /// Create a session and the receiving end of its mailbox.
    ///
    /// `cancel` should be a child of the hub's shutdown token.
    pub fn new(
        id: SessionId,
        adapter: Arc<dyn ConnectionAdapter>,
        mailbox_capacity: usize,
        cancel: CancellationToken,
    ) -> (Arc<Self>, mpsc::Receiver<Payload>) {
        let (tx, rx) = mpsc::channel(mailbox_capacity.max(1));
        let session = Arc::new(Self {
            id,
            adapter,
            mailbox: Mutex::new(Some(tx)),
            alive: AtomicBool::new(true),
            released: AtomicBool::new(false),
            joined_at: AtomicU64::new(0),
            cancel,
            connected_at: Instant::now(),
        });
        (session, rx)
    }

    /// Session identifier.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// The session's transport.
    pub fn adapter(&self) -> &Arc<dyn ConnectionAdapter> {
        &self.adapter
    }

    /// Inbound sequence number current when the registry inserted this session.
    pub fn joined_at(&self) -> u64 {
        self.joined_at.load(Ordering::Acquire)
    }

    pub(crate) fn mark_joined(&self, sequence: u64) {
        self.joined_at.store(sequence, Ordering::Release);
    }

    /// Whether the payload queued as `sequence` is meant for this session.
    /// Payloads queued before the session joined are not replayed.
    pub fn accepts(&self, sequence: u64) -> bool {
        self.joined_at() <= sequence
    }

    /// Enqueue a payload without waiting.
    pub fn offer(&self, payload: Payload) -> Result<(), DeliveryError> {
        let mailbox = self.mailbox.lock();
        let Some(tx) = mailbox.as_ref() else {
            return Err(DeliveryError::Closed);
        };
        tx.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Full,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Drop the mailbox sender. Queued payloads still drain; new offers fail.
    pub fn close_mailbox(&self) {
        drop(self.mailbox.lock().take());
    }

    /// Mark the session dead: close the mailbox and cancel both pumps.
    ///
    /// Returns `true` only for the call that performed the transition.
    /// Does no I/O, so it is safe to call from the dispatch loop.
    pub fn shutdown(&self) -> bool {
        if !self.alive.swap(false, Ordering::AcqRel) {
            return false;
        }
        self.close_mailbox();
        self.cancel.cancel();
        true
    }

    /// Claim the one-time teardown work (adapter close, logging, metrics).
    pub(crate) fn release(&self) -> bool {
        !self.released.swap(true, Ordering::AcqRel)
    }

    /// Whether [`shutdown`](Self::shutdown) has not been called yet.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Resolves once the session is shut down or the hub stops.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Whether the session's token has fired.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Time since the session was created.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .field("joined_at", &self.joined_at())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::memory::memory_pair;

    fn session(capacity: usize) -> (Arc<ClientSession>, mpsc::Receiver<Payload>) {
        let (adapter, _peer) = memory_pair(4);
        ClientSession::new(
            SessionId::new(),
            Arc::new(adapter),
            capacity,
            CancellationToken::new(),
        )
    }

    #[test]
    fn offer_until_full() {
        let (s, mut rx) = session(2);
        assert_eq!(s.offer(Payload::text("1")), Ok(()));
        assert_eq!(s.offer(Payload::text("2")), Ok(()));
        assert_eq!(s.offer(Payload::text("3")), Err(DeliveryError::Full));
        assert_eq!(rx.try_recv().unwrap(), Payload::text("1"));
        assert_eq!(s.offer(Payload::text("4")), Ok(()));
    }

    #[test]
    fn shutdown_closes_mailbox() {
        let (s, mut rx) = session(4);
        s.offer(Payload::text("before")).unwrap();
        assert!(s.shutdown());
        assert!(!s.is_alive());
        assert!(s.is_cancelled());
        assert_eq!(s.offer(Payload::text("after")), Err(DeliveryError::Closed));
        // Already-queued items drain, then the channel reports closed.
        assert_eq!(rx.try_recv().unwrap(), Payload::text("before"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn shutdown_only_transitions_once() {
        let (s, _rx) = session(1);
        assert!(s.shutdown());
        assert!(!s.shutdown());
        assert!(!s.shutdown());
    }

    #[test]
    fn dropped_receiver_reports_closed() {
        let (s, rx) = session(1);
        drop(rx);
        assert_eq!(s.offer(Payload::text("x")), Err(DeliveryError::Closed));
        assert!(s.is_alive());
    }

    #[test]
    fn close_mailbox_keeps_session_alive() {
        let (s, mut rx) = session(4);
        s.offer(Payload::text("queued")).unwrap();
        s.close_mailbox();
        assert!(s.is_alive());
        assert!(!s.is_cancelled());
        assert_eq!(s.offer(Payload::text("late")), Err(DeliveryError::Closed));
        assert_eq!(rx.try_recv().unwrap(), Payload::text("queued"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn release_once() {
        let (s, _rx) = session(1);
        assert!(s.release());
        assert!(!s.release());
    }

    #[test]
    fn parent_token_cancels_session() {
        let parent = CancellationToken::new();
        let (adapter, _peer) = memory_pair(1);
        let (s, _rx) =
            ClientSession::new(SessionId::new(), Arc::new(adapter), 1, parent.child_token());
        parent.cancel();
        assert!(s.is_cancelled());
        assert!(s.is_alive());
    }

    #[tokio::test]
    async fn cancelled_resolves_after_shutdown() {
        let (s, _rx) = session(1);
        let waiter = {
            let s = s.clone();
            tokio::spawn(async move { s.cancelled().await })
        };
        let _ = s.shutdown();
        waiter.await.unwrap();
    }
}
