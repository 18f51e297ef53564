//! Server lifecycle state machine.
//!
//! ```text
//! Idle → Starting → Running → ShuttingDown → Stopped
//!           │          │            └──────→ ForcedStopped
//!           │          └→ Failed
//!           ├→ Failed
//!           └→ ShuttingDown   (signal before the listener is bound)
//! ```
//!
//! Transitions only move forward and each state is entered at most once.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

/// Where a server is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerState {
    Idle,
    Starting,
    Running,
    ShuttingDown,
    /// Shut down within the deadline.
    Stopped,
    /// Deadline exceeded; in-flight requests were abandoned.
    ForcedStopped,
    /// The listener could not bind or the accept loop died.
    Failed,
}

impl ServerState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: ServerState) -> bool {
        use ServerState::*;

        matches!(
            (self, next),
            (Idle, Starting)
                | (Starting, Running)
                | (Starting, ShuttingDown)
                | (Starting, Failed)
                | (Running, ShuttingDown)
                | (Running, Failed)
                | (ShuttingDown, Stopped)
                | (ShuttingDown, ForcedStopped)
        )
    }

    /// No further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ServerState::Stopped | ServerState::ForcedStopped | ServerState::Failed
        )
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerState::Idle => "idle",
            ServerState::Starting => "starting",
            ServerState::Running => "running",
            ServerState::ShuttingDown => "shutting_down",
            ServerState::Stopped => "stopped",
            ServerState::ForcedStopped => "forced_stopped",
            ServerState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Shared, forward-only state cell published over a watch channel.
#[derive(Clone)]
pub(crate) struct StateCell {
    tx: Arc<watch::Sender<ServerState>>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(ServerState::Idle);
        Self { tx: Arc::new(tx) }
    }

    /// Move to `next` if the transition is legal. Returns whether it applied.
    pub(crate) fn advance(&self, next: ServerState) -> bool {
        self.tx.send_if_modified(|current| {
            if current.can_transition_to(next) {
                tracing::debug!(from = %current, to = %next, "Server state changed");
                *current = next;
                true
            } else {
                false
            }
        })
    }

    pub(crate) fn get(&self) -> ServerState {
        *self.tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.tx.subscribe()
    }
}
