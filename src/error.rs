//! Error taxonomy and normalization.
//!
//! Every failure raised by a pipeline stage or a domain handler is a
//! [`GatewayError`]. The [`ErrorNormalizer`] is the only place that turns one
//! into an HTTP response, so status codes and the JSON envelope stay uniform.
//! Internal detail is logged server-side and never returned in production.

use std::fmt;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Environment;
use crate::http::request::RequestId;

/// Message returned for internal errors in production.
pub const GENERIC_INTERNAL_MESSAGE: &str = "An internal error occurred";

/// Machine-readable error kind, serialized verbatim into the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ValidationError,
    MissingCredentials,
    AuthenticationFailed,
    AuthorizationDenied,
    RateLimitExceeded,
    NotFound,
    InternalError,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            Self::ValidationError => StatusCode::BAD_REQUEST,
            Self::MissingCredentials | Self::AuthenticationFailed => StatusCode::UNAUTHORIZED,
            Self::AuthorizationDenied => StatusCode::FORBIDDEN,
            Self::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ValidationError => "ValidationError",
            Self::MissingCredentials => "MissingCredentials",
            Self::AuthenticationFailed => "AuthenticationFailed",
            Self::AuthorizationDenied => "AuthorizationDenied",
            Self::RateLimitExceeded => "RateLimitExceeded",
            Self::NotFound => "NotFound",
            Self::InternalError => "InternalError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised anywhere in the request pipeline, including domain handlers.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    MissingCredentials(String),

    #[error("{0}")]
    AuthenticationFailed(String),

    #[error("{0}")]
    AuthorizationDenied(String),

    #[error("Too many requests, please try again in {retry_after_secs} seconds")]
    RateLimitExceeded { retry_after_secs: u64 },

    #[error("The requested endpoint {path} does not exist")]
    NotFound { path: String },

    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::MissingCredentials(_) => ErrorKind::MissingCredentials,
            Self::AuthenticationFailed(_) => ErrorKind::AuthenticationFailed,
            Self::AuthorizationDenied(_) => ErrorKind::AuthorizationDenied,
            Self::RateLimitExceeded { .. } => ErrorKind::RateLimitExceeded,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Internal(_) => ErrorKind::InternalError,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.kind().status()
    }

    /// Wrap any displayable failure from a collaborator as an internal error.
    pub fn internal(err: impl fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }

    fn retry_after(&self) -> Option<u64> {
        match self {
            Self::RateLimitExceeded { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

/// Uniform JSON body for every rejection and error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub error: ErrorKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

/// Translates errors into responses.
#[derive(Debug, Clone, Copy)]
pub struct ErrorNormalizer {
    expose_internal_detail: bool,
}

impl ErrorNormalizer {
    pub fn new(environment: Environment) -> Self {
        Self {
            expose_internal_detail: !environment.is_production(),
        }
    }

    /// Build the client-facing envelope. Logging is left to [`Self::normalize`].
    pub fn envelope(&self, err: &GatewayError, request_id: &RequestId) -> ErrorEnvelope {
        let message = match err {
            GatewayError::Internal(_) if !self.expose_internal_detail => {
                GENERIC_INTERNAL_MESSAGE.to_string()
            }
            other => other.to_string(),
        };

        ErrorEnvelope {
            error: err.kind(),
            message,
            timestamp: Utc::now(),
            request_id: request_id.to_string(),
            retry_after: err.retry_after(),
        }
    }

    /// Log the error and turn it into the final response.
    pub fn normalize(&self, err: GatewayError, request_id: &RequestId) -> Response {
        let kind = err.kind();
        match kind {
            ErrorKind::InternalError => {
                tracing::error!(request_id = %request_id, kind = %kind, error = %err, "Request failed with internal error");
            }
            ErrorKind::RateLimitExceeded | ErrorKind::AuthorizationDenied => {
                tracing::warn!(request_id = %request_id, kind = %kind, error = %err, "Request rejected");
            }
            _ => {
                tracing::debug!(request_id = %request_id, kind = %kind, error = %err, "Request rejected");
            }
        }

        let envelope = self.envelope(&err, request_id);
        let mut response = (kind.status(), Json(envelope)).into_response();
        if let Some(secs) = err.retry_after() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_id() -> RequestId {
        RequestId::parse("req-1").unwrap()
    }

    async fn body_of(response: Response) -> ErrorEnvelope {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn status_mapping() {
        let cases = [
            (GatewayError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (GatewayError::MissingCredentials("none".into()), StatusCode::UNAUTHORIZED),
            (GatewayError::AuthenticationFailed("bad".into()), StatusCode::UNAUTHORIZED),
            (GatewayError::AuthorizationDenied("no".into()), StatusCode::FORBIDDEN),
            (GatewayError::RateLimitExceeded { retry_after_secs: 3 }, StatusCode::TOO_MANY_REQUESTS),
            (GatewayError::NotFound { path: "/x".into() }, StatusCode::NOT_FOUND),
            (GatewayError::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status, "{:?}", err.kind());
        }
    }

    #[test]
    fn kind_serializes_by_name() {
        let json = serde_json::to_string(&ErrorKind::MissingCredentials).unwrap();
        assert_eq!(json, "\"MissingCredentials\"");
    }

    #[tokio::test]
    async fn production_hides_internal_detail() {
        let normalizer = ErrorNormalizer::new(Environment::Production);
        let response = normalizer.normalize(GatewayError::internal("ledger connection reset"), &request_id());
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_of(response).await;
        assert_eq!(body.error, ErrorKind::InternalError);
        assert_eq!(body.message, GENERIC_INTERNAL_MESSAGE);
        assert_eq!(body.request_id, "req-1");
    }

    #[tokio::test]
    async fn development_exposes_internal_detail() {
        let normalizer = ErrorNormalizer::new(Environment::Development);
        let body = body_of(normalizer.normalize(GatewayError::internal("ledger connection reset"), &request_id())).await;
        assert_eq!(body.message, "ledger connection reset");
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_hint() {
        let normalizer = ErrorNormalizer::new(Environment::Production);
        let response = normalizer.normalize(GatewayError::RateLimitExceeded { retry_after_secs: 120 }, &request_id());
        assert_eq!(response.headers()[header::RETRY_AFTER], "120");

        let body = body_of(response).await;
        assert_eq!(body.retry_after, Some(120));
        assert!(body.message.contains("120 seconds"));
    }

    #[tokio::test]
    async fn not_found_message_contains_path() {
        let normalizer = ErrorNormalizer::new(Environment::Production);
        let body = body_of(normalizer.normalize(
            GatewayError::NotFound { path: "/api/unknown?page=2".into() },
            &request_id(),
        ))
        .await;
        assert!(body.message.contains("/api/unknown?page=2"));
    }
}
