//! Route lookup and dispatch.
//!
//! # Design Decisions
//! - Immutable after construction (shared without locks)
//! - O(n) segment-aware prefix scan over a handful of groups
//! - Explicit NotFound rather than a silent default
//! - A panicking handler becomes an InternalError, never a crashed worker

use std::any::Any;
use std::panic::AssertUnwindSafe;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use futures_util::FutureExt;
use serde::Serialize;

use crate::error::GatewayError;
use crate::http::context::RequestContext;
use crate::routing::handlers::DomainHandler;
use crate::routing::matcher::PrefixMatcher;

/// Handler groups the gateway dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteGroup {
    Health,
    Docs,
    Payments,
    Reconciliation,
    Payroll,
    Compliance,
    Embedded,
}

impl RouteGroup {
    /// Groups that require authentication.
    pub const DOMAINS: [RouteGroup; 5] = [
        RouteGroup::Payments,
        RouteGroup::Reconciliation,
        RouteGroup::Payroll,
        RouteGroup::Compliance,
        RouteGroup::Embedded,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            Self::Health => "/health",
            Self::Docs => "/api-docs",
            Self::Payments => "/api/payments",
            Self::Reconciliation => "/api/reconciliation",
            Self::Payroll => "/api/payroll",
            Self::Compliance => "/api/compliance",
            Self::Embedded => "/api/embedded",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::Docs => "docs",
            Self::Payments => "payments",
            Self::Reconciliation => "reconciliation",
            Self::Payroll => "payroll",
            Self::Compliance => "compliance",
            Self::Embedded => "embedded",
        }
    }
}

struct Route {
    group: RouteGroup,
    matcher: PrefixMatcher,
    handler: Box<dyn DomainHandler>,
}

/// Maps request paths to handler groups.
#[derive(Default)]
pub struct Dispatcher {
    routes: Vec<Route>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for a group.
    pub fn register(&mut self, group: RouteGroup, handler: impl DomainHandler + 'static) {
        let route = Route {
            group,
            matcher: PrefixMatcher::new(group.prefix()),
            handler: Box::new(handler),
        };
        match self.routes.iter_mut().find(|r| r.group == group) {
            Some(existing) => *existing = route,
            None => self.routes.push(route),
        }
    }

    pub fn with(mut self, group: RouteGroup, handler: impl DomainHandler + 'static) -> Self {
        self.register(group, handler);
        self
    }

    pub fn groups(&self) -> impl Iterator<Item = RouteGroup> + '_ {
        self.routes.iter().map(|r| r.group)
    }

    /// Group whose prefix matches `path`, if a handler is registered for it.
    pub fn resolve(&self, path: &str) -> Option<RouteGroup> {
        self.routes
            .iter()
            .find(|r| r.matcher.matches(path))
            .map(|r| r.group)
    }

    /// Hand the request to the handler of the context's route group.
    pub async fn dispatch(
        &self,
        ctx: &RequestContext,
        request: Request<Body>,
    ) -> Result<Response, GatewayError> {
        let route = ctx
            .route()
            .and_then(|group| self.routes.iter().find(|r| r.group == group));

        let Some(route) = route else {
            let path = request
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| request.uri().path().to_string());
            return Err(GatewayError::NotFound { path });
        };

        tracing::debug!(
            request_id = %ctx.request_id(),
            group = route.group.as_str(),
            "Dispatching request"
        );

        let handler = &route.handler;
        let outcome = AssertUnwindSafe(async move { handler.handle(ctx, request).await })
            .catch_unwind()
            .await;

        match outcome {
            Ok(result) => result,
            Err(panic) => {
                let detail = panic_message(panic.as_ref());
                tracing::error!(
                    request_id = %ctx.request_id(),
                    group = route.group.as_str(),
                    panic = %detail,
                    "Domain handler panicked"
                );
                Err(GatewayError::internal(format!(
                    "{} handler panicked: {detail}",
                    route.group.as_str()
                )))
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::http::request::RequestId;
    use crate::routing::handlers::{handler_fn, EchoHandler};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    fn dispatcher() -> Dispatcher {
        let mut dispatcher = Dispatcher::new();
        for group in RouteGroup::DOMAINS {
            dispatcher.register(group, EchoHandler);
        }
        dispatcher
    }

    fn request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn context_for(dispatcher: &Dispatcher, path: &str) -> RequestContext {
        let mut ctx = RequestContext::new(RequestId::generate(), None);
        ctx.set_route(dispatcher.resolve(path));
        ctx
    }

    #[test]
    fn resolves_registered_groups() {
        let dispatcher = dispatcher();
        assert_eq!(dispatcher.resolve("/api/payments/abc"), Some(RouteGroup::Payments));
        assert_eq!(dispatcher.resolve("/api/payroll"), Some(RouteGroup::Payroll));
        assert_eq!(dispatcher.resolve("/api/embedded/cards/1"), Some(RouteGroup::Embedded));
        assert_eq!(dispatcher.resolve("/api/paymentsx"), None);
        assert_eq!(dispatcher.resolve("/health"), None);
    }

    #[tokio::test]
    async fn unmatched_path_is_not_found_with_query() {
        let dispatcher = dispatcher();
        let ctx = context_for(&dispatcher, "/api/unknown");
        let err = dispatcher
            .dispatch(&ctx, request("/api/unknown?x=1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("/api/unknown?x=1"));
    }

    #[tokio::test]
    async fn handler_errors_propagate_untouched() {
        let dispatcher = Dispatcher::new().with(
            RouteGroup::Compliance,
            handler_fn(|_, _| async { Err(GatewayError::Validation("bad rule".into())) }),
        );
        let ctx = context_for(&dispatcher, "/api/compliance/rules");
        let err = dispatcher
            .dispatch(&ctx, request("/api/compliance/rules"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[tokio::test]
    async fn panics_become_internal_errors() {
        let dispatcher = Dispatcher::new().with(
            RouteGroup::Payroll,
            handler_fn(|_, _| async {
                if true {
                    panic!("ledger exploded");
                }
                Ok(StatusCode::OK.into_response())
            }),
        );
        let ctx = context_for(&dispatcher, "/api/payroll/run");
        let err = dispatcher
            .dispatch(&ctx, request("/api/payroll/run"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalError);
    }

    #[test]
    fn register_replaces_existing_group() {
        let dispatcher = dispatcher().with(RouteGroup::Payments, EchoHandler);
        assert_eq!(dispatcher.groups().filter(|g| *g == RouteGroup::Payments).count(), 1);
    }
}
