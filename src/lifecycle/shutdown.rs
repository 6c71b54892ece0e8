//! Shutdown coordination for the gateway.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    Running,
    Draining,
    Stopped,
}

impl LifecycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

/// Coordinator for graceful shutdown.
///
/// Cheap to clone; every clone observes the same state. Long-running tasks
/// await [`Lifecycle::draining`] or [`Lifecycle::stopped`] instead of
/// subscribing to a broadcast.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    tx: Arc<watch::Sender<LifecycleState>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LifecycleState::Running);
        Self { tx: Arc::new(tx) }
    }

    pub fn state(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state() == LifecycleState::Running
    }

    /// Move from Running to Draining.
    ///
    /// Returns true only for the call that performed the transition.
    pub fn begin_drain(&self) -> bool {
        self.advance(LifecycleState::Draining)
    }

    /// Move to Stopped. Returns false if already stopped.
    pub fn mark_stopped(&self) -> bool {
        self.advance(LifecycleState::Stopped)
    }

    fn advance(&self, next: LifecycleState) -> bool {
        let changed = self.tx.send_if_modified(|state| {
            if *state < next {
                *state = next;
                true
            } else {
                false
            }
        });
        if changed {
            tracing::info!(state = next.as_str(), "Lifecycle state changed");
        }
        changed
    }

    /// Resolves once draining has begun (or the gateway already stopped).
    pub async fn draining(&self) {
        self.wait_until(LifecycleState::Draining).await;
    }

    /// Resolves once the gateway has stopped.
    pub async fn stopped(&self) {
        self.wait_until(LifecycleState::Stopped).await;
    }

    async fn wait_until(&self, target: LifecycleState) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as self, so this cannot fail.
        let _ = rx.wait_for(|state| *state >= target).await;
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
