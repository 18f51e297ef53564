//! Shutdown coordination.

use std::sync::Arc;

use tokio::sync::watch;

use crate::lifecycle::signals::TerminationSignal;

/// Coordinator for an in-process shutdown request.
///
/// A one-shot, latched trigger: listeners that subscribe after the trigger
/// fired still observe it. Clones share the same trigger, so it can be handed
/// to a server and kept by a test or an embedding application.
#[derive(Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<Option<TerminationSignal>>>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }

    /// Trigger the shutdown signal.
    ///
    /// Returns `false` if shutdown was already triggered; the first reason wins.
    pub fn trigger(&self) -> bool {
        self.trigger_with(TerminationSignal::Manual)
    }

    /// Trigger shutdown on behalf of a specific signal.
    pub fn trigger_with(&self, signal: TerminationSignal) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(signal);
            true
        })
    }

    /// Whether shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        self.tx.borrow().is_some()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Shutdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shutdown")
            .field("triggered", &*self.tx.borrow())
            .finish()
    }
}

/// Receiving half of a [`Shutdown`].
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<Option<TerminationSignal>>,
}

impl ShutdownListener {
    /// Wait until shutdown is triggered.
    ///
    /// Never resolves if every [`Shutdown`] handle is dropped untriggered.
    pub async fn recv(&mut self) -> TerminationSignal {
        let signal = match self.rx.wait_for(Option::is_some).await {
            Ok(signal) => *signal,
            Err(_) => None,
        };
        match signal {
            Some(signal) => signal,
            None => std::future::pending().await,
        }
    }
}
