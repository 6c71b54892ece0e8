//! Uniform contract shared by every pipeline stage.

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use futures_util::future::BoxFuture;

use crate::error::GatewayError;
use crate::http::context::RequestContext;

/// What a stage decided about the request.
#[derive(Debug)]
pub enum Flow {
    /// Hand the request to the next stage.
    Continue,
    /// Answer immediately with this response (e.g. a CORS preflight).
    Respond(Response),
}

pub type StageFuture<'a> = BoxFuture<'a, Result<Flow, GatewayError>>;

/// One step of the ordered request pipeline.
///
/// A stage may read and enrich the context, rewrite the request (e.g. replace
/// the body with its decoded bytes), and either continue, answer directly, or
/// fail with a [`GatewayError`] that the normalizer turns into a response.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: &'a mut Request<Body>,
    ) -> StageFuture<'a>;
}
