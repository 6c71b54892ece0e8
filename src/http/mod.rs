//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, security headers, compression, tracing)
//!     → request.rs (correlation id)
//!     → context.rs (per-request state handed through the pipeline)
//!     → [pipeline stages and dispatch]
//!     → response.rs (correlation, CORS and rate-limit headers)
//!     → Send to client
//! ```

pub mod context;
pub mod docs;
pub mod request;
pub mod response;
pub mod server;

pub use context::RequestContext;
pub use request::{resolve_request_id, RequestId, X_REQUEST_ID};
pub use server::{build_router, GatewayServer};
