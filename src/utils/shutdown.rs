use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::{signal, sync::watch};

/// Why the gateway is stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT (Ctrl+C)
    Interrupt,
    /// SIGTERM
    Terminate,
    /// Requested from code
    Requested,
}

/// Shutdown coordinator shared between the signal listener, the server and
/// background tasks. Cloning yields another handle to the same state.
#[derive(Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<Option<ShutdownReason>>>,
    initiated: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            tx: Arc::new(tx),
            initiated: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_initiated(&self) -> bool {
        self.initiated.load(Ordering::Relaxed)
    }

    /// Start shutdown. Only the first call has an effect.
    pub fn trigger(&self, reason: ShutdownReason) {
        if self
            .initiated
            .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            tracing::info!("Shutdown initiated: {:?}", reason);
            self.tx.send_replace(Some(reason));
        } else {
            tracing::debug!("Shutdown already initiated, ignoring {:?}", reason);
        }
    }

    /// Listen for SIGINT and SIGTERM and trigger shutdown on the first one.
    pub async fn listen_for_signals(&self) {
        tracing::info!("Listening for SIGINT and SIGTERM");
        tokio::select! {
            result = signal::ctrl_c() => match result {
                Ok(()) => self.trigger(ShutdownReason::Interrupt),
                Err(e) => tracing::error!("Failed to listen for Ctrl+C: {}", e),
            },
            _ = wait_for_sigterm() => self.trigger(ShutdownReason::Terminate),
        }
    }

    /// Resolve once shutdown has been triggered.
    pub async fn wait(&self) -> ShutdownReason {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(reason) = *rx.borrow_and_update() {
                return reason;
            }
            // The sender lives in `self`, so the channel cannot close here.
            if rx.changed().await.is_err() {
                return ShutdownReason::Requested;
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{SignalKind, signal};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::error!("Failed to register SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_wait_resolves_after_trigger() {
        let shutdown = Shutdown::new();
        let waiter = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { shutdown.wait().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!shutdown.is_initiated());
        shutdown.trigger(ShutdownReason::Requested);
        shutdown.trigger(ShutdownReason::Terminate);

        let reason = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reason, ShutdownReason::Requested);
        assert!(shutdown.is_initiated());
    }

    #[tokio::test]
    async fn test_wait_after_trigger_returns_immediately() {
        let shutdown = Shutdown::new();
        shutdown.trigger(ShutdownReason::Interrupt);
        assert_eq!(shutdown.wait().await, ShutdownReason::Interrupt);
    }
}
