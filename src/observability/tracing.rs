//! Request spans.

use axum::http::Method;
use tracing::Span;

use crate::http::request::RequestId;

/// Span wrapping one request's trip through the pipeline.
///
/// `status`, `subject` and `latency_ms` are recorded once the response is
/// known.
pub fn request_span(request_id: &RequestId, method: &Method, path: &str) -> Span {
    tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %path,
        subject = tracing::field::Empty,
        status = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
    )
}
