//! Origin enforcement and CORS.

use std::collections::HashSet;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode};
use axum::response::Response;
use futures_util::future::{self, FutureExt};

use crate::error::GatewayError;
use crate::http::context::RequestContext;
use crate::pipeline::stage::{Flow, Stage, StageFuture};

pub const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, PATCH";
pub const ALLOWED_HEADERS: &str = "Content-Type, Authorization, X-API-Key, X-Request-ID";
const PREFLIGHT_MAX_AGE_SECS: &str = "600";

/// Explicit allow-list of browser origins.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allowed: HashSet<String>,
}

impl OriginPolicy {
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: origins
                .into_iter()
                .map(|o| o.as_ref().trim().trim_end_matches('/').to_string())
                .filter(|o| !o.is_empty())
                .collect(),
        }
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        self.allowed.contains(origin)
    }

    /// Check the request's `Origin`.
    ///
    /// `Ok(None)` means no origin was sent (same-origin or non-browser);
    /// `Ok(Some(origin))` is an allowed origin to echo back.
    pub fn evaluate(&self, headers: &HeaderMap) -> Result<Option<HeaderValue>, GatewayError> {
        let Some(value) = headers.get(header::ORIGIN) else {
            return Ok(None);
        };

        match value.to_str() {
            Ok(origin) if self.is_allowed(origin) => Ok(Some(value.clone())),
            Ok(origin) => Err(GatewayError::AuthorizationDenied(format!(
                "Origin {origin} is not allowed"
            ))),
            Err(_) => Err(GatewayError::AuthorizationDenied(
                "Origin header is not valid".to_string(),
            )),
        }
    }
}

fn is_preflight(request: &Request<Body>) -> bool {
    request.method() == Method::OPTIONS
        && request
            .headers()
            .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
}

/// Add the CORS response headers for an accepted origin.
pub fn apply_cors(headers: &mut HeaderMap, origin: &HeaderValue) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    headers.append(header::VARY, HeaderValue::from_static("Origin"));
}

fn preflight_response() -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static(PREFLIGHT_MAX_AGE_SECS),
    );
    response
}

/// First pipeline stage: rejects foreign origins and answers preflights.
pub struct OriginStage {
    policy: OriginPolicy,
}

impl OriginStage {
    pub fn new(policy: OriginPolicy) -> Self {
        Self { policy }
    }
}

impl Stage for OriginStage {
    fn name(&self) -> &'static str {
        "origin"
    }

    fn apply<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: &'a mut Request<Body>,
    ) -> StageFuture<'a> {
        let outcome = self.policy.evaluate(request.headers()).map(|origin| {
            let preflight = origin.is_some() && is_preflight(request);
            if let Some(origin) = origin {
                ctx.set_allowed_origin(origin);
            }
            if preflight {
                Flow::Respond(preflight_response())
            } else {
                Flow::Continue
            }
        });

        if let Err(ref err) = outcome {
            tracing::warn!(request_id = %ctx.request_id(), error = %err, "Origin rejected");
        }
        future::ready(outcome).boxed()
    }
}
