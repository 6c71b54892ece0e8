//! The request pipeline.
//!
//! # Data Flow
//! ```text
//! Request
//!     → resolve correlation id, build RequestContext, open audit record
//!     → stages, in order (origin → rate_limit → body → authenticate)
//!         each: Continue | Respond(response) | Err(GatewayError)
//!     → Dispatcher (route group → DomainHandler)
//!     → ErrorNormalizer on any error
//!     → finalize headers, record metrics, close audit record
//! Response
//! ```
//!
//! # Design Decisions
//! - Correlation and audit happen before the first stage so that rejections
//!   are correlated and audited like any other response
//! - Stages are an explicit ordered list, not nested middleware
//! - Exactly one response and one audit close per request

pub mod stage;

use std::net::IpAddr;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use tracing::Instrument;

use crate::audit::{AuditEntry, AuditRecorder};
use crate::error::{ErrorNormalizer, GatewayError};
use crate::http::context::{RequestContext, ANONYMOUS};
use crate::http::request::resolve_request_id;
use crate::http::response::finalize;
use crate::lifecycle::InFlightTracker;
use crate::observability::{metrics, tracing::request_span};
use crate::routing::Dispatcher;

pub use stage::{Flow, Stage, StageFuture};

pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    dispatcher: Dispatcher,
    audit: AuditRecorder,
    normalizer: ErrorNormalizer,
    in_flight: InFlightTracker,
}

impl Pipeline {
    pub fn new(
        dispatcher: Dispatcher,
        audit: AuditRecorder,
        normalizer: ErrorNormalizer,
        in_flight: InFlightTracker,
    ) -> Self {
        Self {
            stages: Vec::new(),
            dispatcher,
            audit,
            normalizer,
            in_flight,
        }
    }

    /// Append a stage; stages run in the order they are added.
    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn audit(&self) -> &AuditRecorder {
        &self.audit
    }

    /// Run one request through the pipeline. Never fails: every error is
    /// normalized into a response.
    pub async fn handle(&self, request: Request<Body>, client_addr: Option<IpAddr>) -> Response {
        let _in_flight = self.in_flight.track();

        let (request_id, propagated) = resolve_request_id(request.headers());
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let span = request_span(&request_id, &method, &path);

        async move {
            tracing::debug!(propagated, "Request received");

            let mut ctx = RequestContext::new(request_id, client_addr);
            ctx.set_route(self.dispatcher.resolve(&path));
            let mut audit =
                self.audit
                    .open(ctx.request_id().as_str(), method.as_str(), &path, ANONYMOUS);

            let mut response = match self.run(&mut ctx, &mut audit, request).await {
                Ok(response) => response,
                Err(err) => self.normalizer.normalize(err, ctx.request_id()),
            };
            finalize(&mut response, &ctx);

            let status = response.status().as_u16();
            let elapsed = ctx.elapsed();
            let span = tracing::Span::current();
            span.record("status", status);
            span.record("subject", ctx.subject());
            span.record("latency_ms", elapsed.as_millis() as u64);
            tracing::info!("Request completed");

            let route = ctx.route().map(|group| group.as_str()).unwrap_or("unmatched");
            metrics::record_request(method.as_str(), route, status, elapsed);
            audit.close(status);
            response
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        ctx: &mut RequestContext,
        audit: &mut AuditEntry,
        mut request: Request<Body>,
    ) -> Result<Response, GatewayError> {
        for stage in &self.stages {
            let flow = stage.apply(ctx, &mut request).await;
            if ctx.identity().is_some() {
                audit.identify(ctx.subject());
            }

            match flow {
                Ok(Flow::Continue) => {}
                Ok(Flow::Respond(response)) => {
                    tracing::debug!(stage = stage.name(), "Stage answered request");
                    return Ok(response);
                }
                Err(err) => {
                    audit.set_status(err.status().as_u16());
                    tracing::debug!(stage = stage.name(), kind = %err.kind(), "Stage rejected request");
                    return Err(err);
                }
            }
        }

        self.dispatcher.dispatch(ctx, request).await
    }
}
