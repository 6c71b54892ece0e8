//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build pipeline → Start background tasks → Bind
//!
//! Shutdown (shutdown.rs, drain.rs):
//!     Signal received → Draining (refuse new connections)
//!         → in-flight requests finish or the drain deadline passes → Stopped
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → begin drain (repeats are no-ops)
//! ```
//!
//! # Design Decisions
//! - State only moves forward: Running → Draining → Stopped
//! - The drain is bounded; requests still running at the deadline are dropped
//! - Any startup error is fatal

pub mod drain;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use drain::{InFlightGuard, InFlightTracker};
pub use shutdown::{Lifecycle, LifecycleState};
pub use startup::{run, Gateway, GatewayBuilder, StartupError};
