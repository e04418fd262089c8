//! Process-wide stop signal for the listener, the engine and all sessions.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{info, warn};

/// Drain budget used when the caller passes no timeout.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Root of the cancellation tree: process → hub → session.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    root: CancellationToken,
}

impl ShutdownCoordinator {
    /// Coordinator with an uncancelled root.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone of the root token.
    pub fn token(&self) -> CancellationToken {
        self.root.clone()
    }

    /// Token that stops with the root but can also be cancelled alone.
    pub fn child_token(&self) -> CancellationToken {
        self.root.child_token()
    }

    /// Resolves once shutdown is signalled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.root.cancelled()
    }

    /// Cancel the root token.
    pub fn shutdown(&self) {
        self.root.cancel();
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    pub fn is_shutting_down(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Signal shutdown and wait for `handles`, giving up after `timeout`
    /// ([`DEFAULT_DRAIN_TIMEOUT`] when `None`).
    ///
    /// Returns `true` if every task finished in time.
    pub async fn graceful_shutdown<I>(&self, handles: I, timeout: Option<Duration>) -> bool
    where
        I: IntoIterator<Item = JoinHandle<()>>,
    {
        self.shutdown();
        let handles: Vec<_> = handles.into_iter().collect();
        let budget = timeout.unwrap_or(DEFAULT_DRAIN_TIMEOUT);
        info!(tasks = handles.len(), budget = ?budget, "draining");

        let drained = tokio::time::timeout(budget, futures::future::join_all(handles))
            .await
            .is_ok();
        if !drained {
            warn!(budget = ?budget, "tasks still running after drain budget");
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_coordinator_is_running() {
        let coord = ShutdownCoordinator::default();
        assert!(!coord.is_shutting_down());
        assert!(!coord.token().is_cancelled());
    }

    #[test]
    fn cancelling_root_stops_the_whole_tree() {
        let coord = ShutdownCoordinator::new();
        let hub = coord.child_token();
        let session = hub.child_token();
        coord.shutdown();
        // Idempotent.
        coord.shutdown();
        assert!(coord.is_shutting_down());
        assert!(hub.is_cancelled());
        assert!(session.is_cancelled());
    }

    #[test]
    fn stopping_a_hub_leaves_the_root_alone() {
        let coord = ShutdownCoordinator::new();
        let hub = coord.child_token();
        let session = hub.child_token();
        hub.cancel();
        assert!(session.is_cancelled());
        assert!(!coord.is_shutting_down());
    }

    #[tokio::test]
    async fn cancelled_future_resolves_after_shutdown() {
        let coord = std::sync::Arc::new(ShutdownCoordinator::new());
        let waiter = {
            let coord = coord.clone();
            tokio::spawn(async move { coord.cancelled().await })
        };
        coord.shutdown();
        assert!(waiter.await.is_ok());
    }

    #[tokio::test]
    async fn drain_waits_for_cooperative_tasks() {
        let coord = ShutdownCoordinator::new();
        let tokens = [coord.child_token(), coord.child_token()];
        let handles = tokens.map(|t| tokio::spawn(async move { t.cancelled().await }));
        assert!(coord.graceful_shutdown(handles, None).await);
    }

    #[tokio::test(start_paused = true)]
    async fn drain_reports_timeout() {
        let coord = ShutdownCoordinator::new();
        let stuck = tokio::spawn(std::future::pending::<()>());
        let drained = coord
            .graceful_shutdown([stuck], Some(Duration::from_millis(50)))
            .await;
        assert!(!drained);
        assert!(coord.is_shutting_down());
    }
}
