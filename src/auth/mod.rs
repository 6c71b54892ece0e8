//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! Request under /api
//!     → Authorization: Bearer <token>  → bearer.rs (HS256 signature, expiry)
//!     → else X-API-Key                 → api_key.rs (lookup, status)
//!     → else                           → MissingCredentials
//!     → Identity attached to RequestContext
//! ```
//!
//! # Design Decisions
//! - An Authorization header decides the outcome on its own; a failed bearer
//!   attempt never falls back to the API key
//! - A blank credential header counts as absent, for either scheme
//! - Paths outside /api (health, docs, unknown paths) bypass this stage

pub mod api_key;
pub mod bearer;
pub mod identity;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, Request};
use futures_util::future::{self, FutureExt};

use crate::config::AuthConfig;
use crate::error::GatewayError;
use crate::http::context::RequestContext;
use crate::observability::metrics;
use crate::pipeline::stage::{Flow, Stage, StageFuture};

pub use api_key::{ApiKeyRecord, ApiKeyStore, KeyStatus};
pub use bearer::{issue_token, BearerVerifier, Claims};
pub use identity::{AuthScheme, Identity};

pub const X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");

/// Prefix under which every route requires credentials.
pub const API_PREFIX: &str = "/api";

/// Whether a path is subject to authentication.
pub fn requires_authentication(path: &str) -> bool {
    path == API_PREFIX
        || path
            .strip_prefix(API_PREFIX)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Dual-scheme authenticator.
pub struct Authenticator {
    bearer: BearerVerifier,
    api_keys: Arc<ApiKeyStore>,
}

impl Authenticator {
    pub fn new(bearer: BearerVerifier, api_keys: Arc<ApiKeyStore>) -> Self {
        Self { bearer, api_keys }
    }

    pub fn from_config(config: &AuthConfig, api_keys: Arc<ApiKeyStore>) -> Self {
        let bearer = BearerVerifier::new(
            &config.jwt_secret,
            config.jwt_issuer.as_deref(),
            config.jwt_audience.as_deref(),
        );
        Self::new(bearer, api_keys)
    }

    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Identity, GatewayError> {
        let authorization = headers
            .get(header::AUTHORIZATION)
            .filter(|value| !value.as_bytes().iter().all(u8::is_ascii_whitespace));
        if let Some(value) = authorization {
            let token = bearer::parse_authorization(value)?;
            return self.bearer.verify(token);
        }

        let api_key = headers
            .get(&X_API_KEY)
            .map(|value| {
                value.to_str().map(str::trim).map_err(|_| {
                    GatewayError::AuthenticationFailed("malformed X-API-Key header".to_string())
                })
            })
            .transpose()?
            .filter(|key| !key.is_empty());

        match api_key {
            Some(key) => self.api_keys.authenticate(key),
            None => Err(GatewayError::MissingCredentials(
                "Authentication required: supply a bearer token or an API key".to_string(),
            )),
        }
    }
}

impl Stage for Authenticator {
    fn name(&self) -> &'static str {
        "authenticate"
    }

    fn apply<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: &'a mut Request<Body>,
    ) -> StageFuture<'a> {
        if !requires_authentication(request.uri().path()) {
            return future::ready(Ok(Flow::Continue)).boxed();
        }

        let outcome = match self.authenticate(request.headers()) {
            Ok(identity) => {
                tracing::debug!(
                    request_id = %ctx.request_id(),
                    subject = %identity.subject(),
                    scheme = %identity.scheme(),
                    "Request authenticated"
                );
                ctx.set_identity(identity);
                Ok(Flow::Continue)
            }
            Err(err) => {
                metrics::record_auth_failure(err.kind());
                Err(err)
            }
        };
        future::ready(outcome).boxed()
    }
}
