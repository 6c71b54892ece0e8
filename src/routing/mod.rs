//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Request path
//!     → router.rs (Dispatcher::resolve, first matching group wins)
//!     → matcher.rs (segment-aware prefix test)
//!     → handlers.rs (DomainHandler for the group)
//!     → no group: NotFound carrying the requested path
//! ```
//!
//! # Design Decisions
//! - Groups registered at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)

pub mod handlers;
pub mod matcher;
pub mod router;

pub use handlers::{handler_fn, DomainHandler, EchoHandler, FnHandler, HandlerFuture};
pub use matcher::PrefixMatcher;
pub use router::{Dispatcher, RouteGroup};
