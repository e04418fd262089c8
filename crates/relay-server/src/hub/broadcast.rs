//! Fan-out of inbound payloads to every session mailbox.

use std::sync::Arc;

use metrics::{counter, gauge};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::DeliveryError;
use crate::hub::Inbound;
use crate::hub::registry::Registry;
use crate::metrics::{
    HUB_CONNECTIONS_ACTIVE, HUB_MESSAGES_DELIVERED_TOTAL, HUB_SLOW_CONSUMER_EVICTIONS_TOTAL,
};

/// Outcome of fanning out one payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Mailboxes that accepted the payload.
    pub delivered: usize,
    /// Sessions passed over: the origin when echo is off, sessions that
    /// joined after the payload was queued, and sessions already closing.
    pub skipped: usize,
    /// Sessions disconnected because their mailbox was full.
    pub evicted: usize,
}

/// The single dispatch loop draining the inbound queue.
///
/// Payloads are dispatched strictly in queue order, so every session
/// observes the same relative order of messages from one sender.
pub struct BroadcastEngine {
    registry: Arc<Registry>,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    echo_to_sender: bool,
    cancel: CancellationToken,
}

impl BroadcastEngine {
    pub(crate) fn new(
        registry: Arc<Registry>,
        inbound: mpsc::UnboundedReceiver<Inbound>,
        echo_to_sender: bool,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            registry,
            inbound,
            echo_to_sender,
            cancel,
        }
    }

    /// Run until the hub stops or every publisher is gone.
    pub async fn run(mut self) {
        info!(echo_to_sender = self.echo_to_sender, "broadcast engine started");
        while let Some(inbound) = self.next_inbound().await {
            let report = self.dispatch(&inbound);
            debug!(
                origin = %inbound.origin,
                delivered = report.delivered,
                skipped = report.skipped,
                evicted = report.evicted,
                "dispatched"
            );
        }
        info!("broadcast engine stopped");
    }

    /// Wait for the next queued payload; `None` on shutdown.
    pub async fn next_inbound(&mut self) -> Option<Inbound> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            next = self.inbound.recv() => next,
        }
    }

    /// Offer one payload to every session registered before it was queued.
    ///
    /// Never blocks: a full mailbox gets its session shut down and removed
    /// right here, and the session's own pumps finish the teardown.
    pub fn dispatch(&self, inbound: &Inbound) -> DispatchReport {
        let mut report = DispatchReport::default();
        for session in self.registry.snapshot() {
            if !session.accepts(inbound.sequence) {
                report.skipped += 1;
                continue;
            }
            if !self.echo_to_sender && session.id() == &inbound.origin {
                report.skipped += 1;
                continue;
            }
            match session.offer(inbound.payload.clone()) {
                Ok(()) => report.delivered += 1,
                Err(DeliveryError::Full) => {
                    warn!(
                        session_id = %session.id(),
                        origin = %inbound.origin,
                        "mailbox full, disconnecting slow consumer"
                    );
                    let _ = session.shutdown();
                    if self.registry.remove(session.id()).is_some() {
                        gauge!(HUB_CONNECTIONS_ACTIVE).decrement(1.0);
                    }
                    counter!(HUB_SLOW_CONSUMER_EVICTIONS_TOTAL).increment(1);
                    report.evicted += 1;
                }
                Err(DeliveryError::Closed) => {
                    // Teardown is already underway; just stop offering.
                    if self.registry.remove(session.id()).is_some() {
                        gauge!(HUB_CONNECTIONS_ACTIVE).decrement(1.0);
                    }
                    report.skipped += 1;
                }
            }
        }
        if report.delivered > 0 {
            counter!(HUB_MESSAGES_DELIVERED_TOTAL).increment(report.delivered as u64);
        }
        report
    }
}
