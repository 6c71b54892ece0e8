//! Domain handler contract.
//!
//! Domain logic (payments, payroll, ...) lives outside the gateway. Each
//! group is served by one [`DomainHandler`] that receives the verified
//! request together with its context.

use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::future::{BoxFuture, FutureExt};
use serde_json::json;

use crate::error::GatewayError;
use crate::http::context::RequestContext;

pub type HandlerFuture<'a> = BoxFuture<'a, Result<Response, GatewayError>>;

pub trait DomainHandler: Send + Sync {
    fn handle<'a>(&'a self, ctx: &'a RequestContext, request: Request<Body>) -> HandlerFuture<'a>;
}

impl<H: DomainHandler + ?Sized> DomainHandler for Arc<H> {
    fn handle<'a>(&'a self, ctx: &'a RequestContext, request: Request<Body>) -> HandlerFuture<'a> {
        (**self).handle(ctx, request)
    }
}

impl<H: DomainHandler + ?Sized> DomainHandler for Box<H> {
    fn handle<'a>(&'a self, ctx: &'a RequestContext, request: Request<Body>) -> HandlerFuture<'a> {
        (**self).handle(ctx, request)
    }
}

/// Handler built from an async closure.
pub struct FnHandler<F> {
    f: F,
}

/// Wrap an async closure as a [`DomainHandler`].
///
/// The closure receives an owned copy of the context.
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(RequestContext, Request<Body>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, GatewayError>> + Send + 'static,
{
    FnHandler { f }
}

impl<F, Fut> DomainHandler for FnHandler<F>
where
    F: Fn(RequestContext, Request<Body>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, GatewayError>> + Send + 'static,
{
    fn handle<'a>(&'a self, ctx: &'a RequestContext, request: Request<Body>) -> HandlerFuture<'a> {
        (self.f)(ctx.clone(), request).boxed()
    }
}

/// Placeholder for a domain group with no collaborator wired in: reports
/// the routing decision and the caller's identity.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoHandler;

impl DomainHandler for EchoHandler {
    fn handle<'a>(&'a self, ctx: &'a RequestContext, request: Request<Body>) -> HandlerFuture<'a> {
        let body = json!({
            "route": ctx.route().map(|group| group.as_str()),
            "method": request.method().as_str(),
            "path": request.uri().path(),
            "requestId": ctx.request_id().as_str(),
            "identity": ctx.identity(),
        });
        futures_util::future::ready(Ok(Json(body).into_response())).boxed()
    }
}
