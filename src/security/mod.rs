//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → origin.rs (allow-list, CORS preflight)
//!     → rate_limit.rs (per-key fixed window)
//!     → limits.rs (body size, JSON well-formedness)
//!     → authentication (crate::auth)
//!
//! Every response:
//!     → headers.rs (CSP, HSTS and hardening headers)
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - Rejections are errors, normalized like any other failure

pub mod headers;
pub mod limits;
pub mod origin;
pub mod rate_limit;

pub use limits::BodyStage;
pub use origin::{OriginPolicy, OriginStage};
pub use rate_limit::{RateDecision, RateLimitStage, RateLimitStatus, RateLimiter};
