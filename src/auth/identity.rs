//! Verified caller identity.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::error::GatewayError;

/// Scheme that produced an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthScheme {
    Bearer,
    ApiKey,
}

impl AuthScheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bearer => "bearer",
            Self::ApiKey => "api-key",
        }
    }
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity derived from the request's credentials.
///
/// Lives only as long as the request; capabilities are attached here and
/// evaluated by domain handlers, not by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    subject: String,
    scheme: AuthScheme,
    capabilities: BTreeSet<String>,
}

impl Identity {
    pub fn new(
        subject: impl Into<String>,
        scheme: AuthScheme,
        capabilities: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            scheme,
            capabilities: capabilities.into_iter().collect(),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn scheme(&self) -> AuthScheme {
        self.scheme
    }

    pub fn capabilities(&self) -> &BTreeSet<String> {
        &self.capabilities
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    /// Check a capability on behalf of a domain handler.
    pub fn require(&self, capability: &str) -> Result<(), GatewayError> {
        if self.has_capability(capability) {
            Ok(())
        } else {
            Err(GatewayError::AuthorizationDenied(format!(
                "capability '{}' required for subject '{}'",
                capability, self.subject
            )))
        }
    }
}
