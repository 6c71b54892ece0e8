//! Request correlation.
//!
//! # Responsibilities
//! - Accept a well-formed inbound `X-Request-Id`
//! - Otherwise generate a fresh UUID v4
//! - Provide the id as a header value for every response path
//!
//! # Design Decisions
//! - The id is immutable once resolved (no setters)
//! - Inbound ids are restricted to a short, header-safe alphabet so they can be
//!   echoed back and written to logs verbatim

use std::fmt;
use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use uuid::Uuid;

/// Correlation header, consumed and echoed.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

const MAX_REQUEST_ID_LEN: usize = 128;

/// Correlation identifier carried through audit, errors and response headers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(Arc<str>);

impl RequestId {
    /// Generate a new globally unique id.
    pub fn generate() -> Self {
        Self(Arc::from(Uuid::new_v4().to_string()))
    }

    /// Accept an inbound id if it is non-empty and well-formed.
    pub fn parse(raw: &str) -> Option<Self> {
        let well_formed = !raw.is_empty()
            && raw.len() <= MAX_REQUEST_ID_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b':'));
        well_formed.then(|| Self(Arc::from(raw)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn header_value(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&self.0).ok()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolve the correlation id for an inbound request.
///
/// Returns the id and whether it was propagated from the caller.
pub fn resolve_request_id(headers: &HeaderMap) -> (RequestId, bool) {
    headers
        .get(&X_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| RequestId::parse(raw.trim()))
        .map(|id| (id, true))
        .unwrap_or_else(|| (RequestId::generate(), false))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(id: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(X_REQUEST_ID, HeaderValue::from_str(id).unwrap());
        headers
    }

    #[test]
    fn propagates_inbound_id() {
        let (id, inherited) = resolve_request_id(&headers_with("req-42.alpha:1"));
        assert!(inherited);
        assert_eq!(id.as_str(), "req-42.alpha:1");
    }

    #[test]
    fn generates_when_missing_or_empty() {
        let (id, inherited) = resolve_request_id(&HeaderMap::new());
        assert!(!inherited);
        assert!(Uuid::parse_str(id.as_str()).is_ok());

        let (_, inherited) = resolve_request_id(&headers_with(""));
        assert!(!inherited);
    }

    #[test]
    fn rejects_malformed_ids() {
        let (id, inherited) = resolve_request_id(&headers_with("has spaces; and=stuff"));
        assert!(!inherited);
        assert_ne!(id.as_str(), "has spaces; and=stuff");

        let too_long = "a".repeat(MAX_REQUEST_ID_LEN + 1);
        assert!(RequestId::parse(&too_long).is_none());
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(RequestId::generate(), RequestId::generate());
    }
}
