//! Liveness endpoint.
//!
//! `GET /health` answers 200 while the gateway is running and 503 once it
//! is draining, so a load balancer stops routing new traffic here while
//! in-flight requests finish.

use std::time::Instant;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use futures_util::future::{self, FutureExt};
use serde::Serialize;

use crate::config::Environment;
use crate::error::GatewayError;
use crate::http::context::RequestContext;
use crate::lifecycle::{InFlightTracker, Lifecycle, LifecycleState};
use crate::routing::handlers::{DomainHandler, HandlerFuture};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub state: &'static str,
    pub environment: &'static str,
    pub uptime_secs: u64,
    pub in_flight: usize,
    pub timestamp: String,
}

pub struct HealthHandler {
    lifecycle: Lifecycle,
    in_flight: InFlightTracker,
    environment: Environment,
    started: Instant,
}

impl HealthHandler {
    pub fn new(lifecycle: Lifecycle, in_flight: InFlightTracker, environment: Environment) -> Self {
        Self {
            lifecycle,
            in_flight,
            environment,
            started: Instant::now(),
        }
    }

    pub fn report(&self) -> (StatusCode, HealthReport) {
        let state = self.lifecycle.state();
        let (status_code, status) = match state {
            LifecycleState::Running => (StatusCode::OK, "ok"),
            LifecycleState::Draining | LifecycleState::Stopped => {
                (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
            }
        };

        let report = HealthReport {
            status,
            state: state.as_str(),
            environment: self.environment.as_str(),
            uptime_secs: self.started.elapsed().as_secs(),
            in_flight: self.in_flight.active(),
            timestamp: Utc::now().to_rfc3339(),
        };
        (status_code, report)
    }
}

impl DomainHandler for HealthHandler {
    fn handle<'a>(&'a self, _ctx: &'a RequestContext, request: Request<Body>) -> HandlerFuture<'a> {
        let outcome = if request.method() == Method::GET || request.method() == Method::HEAD {
            let (status, report) = self.report();
            Ok((status, Json(report)).into_response())
        } else {
            Err(GatewayError::NotFound {
                path: request.uri().path().to_string(),
            })
        };
        future::ready(outcome).boxed()
    }
}
