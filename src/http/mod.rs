//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (lifecycle::server accept loop)
//!     → request.rs (assign / propagate request ID)
//!     → router.rs (trace span, request metrics, timeout)
//!     → user handlers or GET /metrics
//!     → Send to client
//! ```

pub mod request;
pub mod router;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use router::{metrics_router, with_middleware};
