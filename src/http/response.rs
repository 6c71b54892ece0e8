//! Headers added to every pipeline response.
//!
//! Runs once per request, after the handler or the error normalizer, so
//! successes and rejections carry the same correlation and CORS headers.

use axum::http::{HeaderName, HeaderValue};
use axum::response::Response;

use crate::http::context::RequestContext;
use crate::http::request::X_REQUEST_ID;
use crate::security::origin::apply_cors;

pub const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
pub const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
pub const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

pub fn finalize(response: &mut Response, ctx: &RequestContext) {
    let headers = response.headers_mut();

    if let Some(id) = ctx.request_id().header_value() {
        headers.insert(X_REQUEST_ID, id);
    }

    if let Some(origin) = ctx.allowed_origin() {
        apply_cors(headers, origin);
    }

    if let Some(status) = ctx.rate_limit() {
        headers.insert(RATELIMIT_LIMIT, HeaderValue::from(status.limit));
        headers.insert(RATELIMIT_REMAINING, HeaderValue::from(status.remaining));
        // Round up so a client never retries a fraction of a second early.
        let reset = status.reset_after.as_secs() + u64::from(status.reset_after.subsec_nanos() > 0);
        headers.insert(RATELIMIT_RESET, HeaderValue::from(reset));
    }
}
