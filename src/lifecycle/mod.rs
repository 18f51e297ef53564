//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (server.rs):
//!     Spawn accept loop → Bind → Running
//!
//! Shutdown (server.rs, shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT or Shutdown::trigger
//!     → Stop accepting → Drain in-flight requests → Stopped
//!     → deadline exceeded → abort → ForcedStopped (error)
//! ```
//!
//! # Design Decisions
//! - Start is fire-and-forget; the caller only blocks on the signal
//! - Shutdown has a deadline: forced stop is reported as an error
//! - State only moves forward (state.rs)

pub mod server;
pub mod shutdown;
pub mod signals;
pub mod state;

pub use server::{run_with_graceful_shutdown, GracefulServer, LifecycleError, LifecycleObserver};
pub use shutdown::{Shutdown, ShutdownListener};
pub use signals::{TerminationSignal, TerminationSignals};
pub use state::ServerState;
