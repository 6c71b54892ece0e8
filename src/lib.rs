//! Finance Gateway library.
//!
//! The front door of the financial API platform: every request passes the
//! same ordered pipeline (origin policy, rate limiting, body checks,
//! authentication) before it is dispatched to a domain handler group.

pub mod audit;
pub mod auth;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod routing;
pub mod security;

pub use config::GatewayConfig;
pub use error::{ErrorKind, GatewayError};
pub use http::GatewayServer;
pub use lifecycle::{Gateway, GatewayBuilder, Lifecycle};
