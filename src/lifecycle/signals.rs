//! OS signal handling.
//!
//! SIGTERM and SIGINT both begin the drain. Repeated signals are logged and
//! otherwise ignored, so a second Ctrl-C cannot cut the drain short.

use crate::lifecycle::Lifecycle;

/// Listen for termination signals until the gateway stops.
pub async fn listen(lifecycle: Lifecycle) {
    let mut signals = match TerminationSignals::install() {
        Ok(signals) => signals,
        Err(e) => {
            tracing::error!(error = %e, "Failed to install signal handlers");
            return;
        }
    };

    loop {
        tokio::select! {
            name = signals.recv() => {
                if lifecycle.begin_drain() {
                    tracing::info!(signal = name, "Shutdown signal received, draining");
                } else {
                    tracing::info!(signal = name, "Shutdown already in progress");
                }
            }
            _ = lifecycle.stopped() => return,
        }
    }
}

#[cfg(unix)]
struct TerminationSignals {
    terminate: tokio::signal::unix::Signal,
    interrupt: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl TerminationSignals {
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
        })
    }

    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.interrupt.recv() => "SIGINT",
        }
    }
}

#[cfg(not(unix))]
struct TerminationSignals;

#[cfg(not(unix))]
impl TerminationSignals {
    fn install() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> &'static str {
        let _ = tokio::signal::ctrl_c().await;
        "ctrl-c"
    }
}
