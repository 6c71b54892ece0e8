//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::Value;
use tower::ServiceExt;

use finance_gateway::audit::MemorySink;
use finance_gateway::auth::{issue_token, Claims};
use finance_gateway::config::{ApiKeyConfig, Environment, GatewayConfig};
use finance_gateway::{Gateway, GatewayBuilder};

pub const JWT_SECRET: &str = "integration-test-secret-0123456789abcdef";
pub const API_KEY: &str = "key-123";

/// Test configuration with one API key (`key-123`, `payments:read`).
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.environment = Environment::Test;
    config.listener.host = "127.0.0.1".to_string();
    config.listener.port = 0;
    config.auth.jwt_secret = JWT_SECRET.to_string();
    config.auth.api_keys = vec![ApiKeyConfig {
        key: API_KEY.to_string(),
        subject: "treasury-service".to_string(),
        capabilities: vec!["payments:read".to_string()],
        active: true,
        revoked: false,
    }];
    config
}

pub fn builder(config: GatewayConfig, sink: &MemorySink) -> GatewayBuilder {
    Gateway::builder(config).audit_sink(sink.clone())
}

/// Build a gateway with an in-memory audit sink and return its router.
pub fn gateway(config: GatewayConfig) -> (Gateway, Router, MemorySink) {
    let sink = MemorySink::new();
    let gateway = builder(config, &sink).build().expect("valid test config");
    let router = finance_gateway::http::build_router(gateway.pipeline());
    (gateway, router, sink)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn get(uri: &str) -> axum::http::request::Builder {
    Request::builder().method("GET").uri(uri)
}

pub fn token(subject: &str, expires_in_secs: i64, scopes: &[&str]) -> String {
    let exp = (Utc::now().timestamp() + expires_in_secs) as u64;
    let claims = Claims::new(subject, exp, scopes.iter().map(|s| s.to_string()).collect());
    issue_token(JWT_SECRET, &claims).unwrap()
}
