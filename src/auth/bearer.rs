//! Bearer token (HS256 JWT) verification.

use axum::http::HeaderValue;
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::auth::identity::{AuthScheme, Identity};
use crate::error::GatewayError;

/// Claims the gateway reads from a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject.
    pub sub: String,

    /// Expiry, seconds since the epoch.
    pub exp: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,

    /// OAuth-style space-separated scopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Scopes as an array.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
}

impl Claims {
    pub fn new(subject: impl Into<String>, expires_at: u64, scopes: Vec<String>) -> Self {
        Self {
            sub: subject.into(),
            exp: expires_at,
            iat: None,
            iss: None,
            aud: None,
            scope: None,
            scopes,
        }
    }

    fn capabilities(&self) -> impl Iterator<Item = String> + '_ {
        self.scope
            .iter()
            .flat_map(|s| s.split_whitespace())
            .map(String::from)
            .chain(self.scopes.iter().cloned())
    }
}

/// Verifies signature, expiry and optional issuer/audience of HS256 tokens.
pub struct BearerVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl BearerVerifier {
    pub fn new(secret: &str, issuer: Option<&str>, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let mut required = vec!["exp", "sub"];
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
            required.push("iss");
        }
        match audience {
            Some(audience) => {
                validation.set_audience(&[audience]);
                required.push("aud");
            }
            None => validation.validate_aud = false,
        }
        validation.set_required_spec_claims(&required);

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Identity, GatewayError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|err| {
            let reason = match err.kind() {
                JwtErrorKind::ExpiredSignature => "bearer token has expired",
                JwtErrorKind::InvalidSignature => "bearer token signature is invalid",
                JwtErrorKind::InvalidIssuer => "bearer token issuer is not accepted",
                JwtErrorKind::InvalidAudience => "bearer token audience is not accepted",
                _ => "bearer token is malformed",
            };
            GatewayError::AuthenticationFailed(reason.to_string())
        })?;

        let claims = data.claims;
        if claims.sub.trim().is_empty() {
            return Err(GatewayError::AuthenticationFailed(
                "bearer token has no subject".to_string(),
            ));
        }

        Ok(Identity::new(claims.sub.clone(), AuthScheme::Bearer, claims.capabilities()))
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn parse_authorization(value: &HeaderValue) -> Result<&str, GatewayError> {
    let malformed = || GatewayError::AuthenticationFailed("malformed Authorization header".to_string());

    let value = value.to_str().map_err(|_| malformed())?;
    let (scheme, token) = value.split_once(' ').ok_or_else(malformed)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(malformed());
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(malformed());
    }
    Ok(token)
}

/// Sign claims with an HS256 secret.
pub fn issue_token(secret: &str, claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::Utc;

    const SECRET: &str = "unit-test-secret-with-enough-bytes!!";

    fn in_one_hour() -> u64 {
        (Utc::now().timestamp() + 3600) as u64
    }

    fn reason(err: GatewayError) -> String {
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
        err.to_string()
    }

    #[test]
    fn verifies_valid_token() {
        let mut claims = Claims::new("payroll-bot", in_one_hour(), vec!["payroll:read".into()]);
        claims.scope = Some("payroll:write compliance:read".into());
        let token = issue_token(SECRET, &claims).unwrap();

        let identity = BearerVerifier::new(SECRET, None, None).verify(&token).unwrap();
        assert_eq!(identity.subject(), "payroll-bot");
        assert_eq!(identity.scheme(), AuthScheme::Bearer);
        assert!(identity.has_capability("payroll:read"));
        assert!(identity.has_capability("payroll:write"));
        assert!(identity.has_capability("compliance:read"));
    }

    #[test]
    fn rejects_expired_token() {
        let claims = Claims::new("payroll-bot", (Utc::now().timestamp() - 60) as u64, vec![]);
        let token = issue_token(SECRET, &claims).unwrap();

        let err = BearerVerifier::new(SECRET, None, None).verify(&token).unwrap_err();
        assert!(reason(err).contains("expired"));
    }

    #[test]
    fn rejects_wrong_signature() {
        let claims = Claims::new("payroll-bot", in_one_hour(), vec![]);
        let token = issue_token("another-secret-entirely-different!!", &claims).unwrap();

        let err = BearerVerifier::new(SECRET, None, None).verify(&token).unwrap_err();
        assert!(reason(err).contains("signature"));
    }

    #[test]
    fn rejects_garbage_token() {
        let err = BearerVerifier::new(SECRET, None, None).verify("not.a.jwt").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
    }

    #[test]
    fn enforces_configured_issuer() {
        let mut claims = Claims::new("svc", in_one_hour(), vec![]);
        claims.iss = Some("https://other-issuer".into());
        let token = issue_token(SECRET, &claims).unwrap();

        let verifier = BearerVerifier::new(SECRET, Some("https://issuer.example.com"), None);
        assert!(reason(verifier.verify(&token).unwrap_err()).contains("issuer"));
    }

    #[test]
    fn parses_authorization_header() {
        let header = HeaderValue::from_static("Bearer abc.def.ghi");
        assert_eq!(parse_authorization(&header).unwrap(), "abc.def.ghi");

        let lower = HeaderValue::from_static("bearer abc");
        assert_eq!(parse_authorization(&lower).unwrap(), "abc");

        for bad in ["Basic dXNlcjpwYXNz", "Bearer", "Bearer    ", "abc.def.ghi"] {
            let header = HeaderValue::from_static(bad);
            assert!(parse_authorization(&header).is_err(), "{bad}");
        }
    }
}
