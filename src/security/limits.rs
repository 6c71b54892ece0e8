//! Request body limits and JSON decoding.
//!
//! # Design Decisions
//! - Declared `Content-Length` is checked before reading (early rejection)
//! - The body is buffered once, bounded by the limit, and handed on as bytes
//! - JSON bodies are checked for well-formedness only; handlers do the typing

use axum::body::Body;
use axum::http::{header, HeaderMap, Request};
use futures_util::future::FutureExt;
use serde::de::IgnoredAny;

use crate::error::GatewayError;
use crate::http::context::RequestContext;
use crate::pipeline::stage::{Flow, Stage, StageFuture};

pub struct BodyStage {
    max_bytes: usize,
}

impl BodyStage {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    fn too_large(&self) -> GatewayError {
        GatewayError::Validation(format!(
            "Request body exceeds the {} byte limit",
            self.max_bytes
        ))
    }
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|mime| {
            let mime = mime.trim();
            mime.eq_ignore_ascii_case("application/json")
                || (mime.starts_with("application/") && mime.ends_with("+json"))
        })
        .unwrap_or(false)
}

impl Stage for BodyStage {
    fn name(&self) -> &'static str {
        "body"
    }

    fn apply<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: &'a mut Request<Body>,
    ) -> StageFuture<'a> {
        async move {
            if declared_length(request.headers()).is_some_and(|len| len > self.max_bytes as u64) {
                return Err(self.too_large());
            }

            let body = std::mem::take(request.body_mut());
            let bytes = axum::body::to_bytes(body, self.max_bytes).await.map_err(|e| {
                tracing::debug!(request_id = %ctx.request_id(), error = %e, "Failed to read request body");
                self.too_large()
            })?;

            if !bytes.is_empty() && is_json(request.headers()) {
                serde_json::from_slice::<IgnoredAny>(&bytes).map_err(|e| {
                    GatewayError::Validation(format!("Request body is not valid JSON: {e}"))
                })?;
            }

            *request.body_mut() = Body::from(bytes);
            Ok(Flow::Continue)
        }
        .boxed()
    }
}
