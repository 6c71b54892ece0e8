//! Per-request context owned by the pipeline.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use axum::http::HeaderValue;
use chrono::{DateTime, Utc};

use crate::auth::Identity;
use crate::http::request::RequestId;
use crate::routing::RouteGroup;
use crate::security::rate_limit::RateLimitStatus;

/// Identity label used before (or without) authentication.
pub const ANONYMOUS: &str = "anonymous";

/// State carried through the stages of a single request.
///
/// Created when the request enters the pipeline and dropped once the
/// response has been handed back to the server.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: RequestId,
    arrived_at: DateTime<Utc>,
    started: Instant,
    client_addr: Option<IpAddr>,
    route: Option<RouteGroup>,
    identity: Option<Identity>,
    allowed_origin: Option<HeaderValue>,
    rate_limit: Option<RateLimitStatus>,
}

impl RequestContext {
    pub fn new(request_id: RequestId, client_addr: Option<IpAddr>) -> Self {
        Self {
            request_id,
            arrived_at: Utc::now(),
            started: Instant::now(),
            client_addr,
            route: None,
            identity: None,
            allowed_origin: None,
            rate_limit: None,
        }
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    pub fn arrived_at(&self) -> DateTime<Utc> {
        self.arrived_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn client_addr(&self) -> Option<IpAddr> {
        self.client_addr
    }

    pub fn route(&self) -> Option<RouteGroup> {
        self.route
    }

    pub fn set_route(&mut self, route: Option<RouteGroup>) {
        self.route = route;
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Subject of the resolved identity, or `"anonymous"`.
    pub fn subject(&self) -> &str {
        self.identity
            .as_ref()
            .map(Identity::subject)
            .unwrap_or(ANONYMOUS)
    }

    pub fn set_identity(&mut self, identity: Identity) {
        self.identity = Some(identity);
    }

    pub fn allowed_origin(&self) -> Option<&HeaderValue> {
        self.allowed_origin.as_ref()
    }

    pub fn set_allowed_origin(&mut self, origin: HeaderValue) {
        self.allowed_origin = Some(origin);
    }

    pub fn rate_limit(&self) -> Option<RateLimitStatus> {
        self.rate_limit
    }

    pub fn set_rate_limit(&mut self, status: RateLimitStatus) {
        self.rate_limit = Some(status);
    }
}
