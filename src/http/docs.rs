//! OpenAPI document served at `/api-docs` outside production.

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::IntoResponse;
use axum::Json;
use futures_util::future::{self, FutureExt};
use serde_json::{json, Map, Value};

use crate::error::GatewayError;
use crate::http::context::RequestContext;
use crate::routing::handlers::{DomainHandler, HandlerFuture};
use crate::routing::RouteGroup;

pub struct DocsHandler {
    document: Value,
}

impl DocsHandler {
    pub fn new() -> Self {
        Self {
            document: openapi_document(),
        }
    }
}

impl Default for DocsHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl DomainHandler for DocsHandler {
    fn handle<'a>(&'a self, _ctx: &'a RequestContext, request: Request<Body>) -> HandlerFuture<'a> {
        let outcome = if request.method() == Method::GET || request.method() == Method::HEAD {
            Ok(Json(self.document.clone()).into_response())
        } else {
            Err(GatewayError::NotFound {
                path: request.uri().path().to_string(),
            })
        };
        future::ready(outcome).boxed()
    }
}

fn error_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": { "application/json": { "schema": { "$ref": "#/components/schemas/ErrorEnvelope" } } }
    })
}

/// Build the OpenAPI 3 description of the gateway's public surface.
pub fn openapi_document() -> Value {
    let mut paths = Map::new();
    paths.insert(
        "/health".into(),
        json!({
            "get": {
                "summary": "Liveness probe",
                "security": [],
                "responses": {
                    "200": { "description": "Gateway is running" },
                    "503": { "description": "Gateway is draining" }
                }
            }
        }),
    );

    for group in RouteGroup::DOMAINS {
        paths.insert(
            format!("{}/{{path}}", group.prefix()),
            json!({
                "parameters": [{
                    "name": "path", "in": "path", "required": true,
                    "schema": { "type": "string" }
                }],
                "get": {
                    "summary": format!("{} domain operations", group.as_str()),
                    "tags": [group.as_str()],
                    "responses": {
                        "200": { "description": "Handled by the domain group" },
                        "400": error_response("Validation error"),
                        "401": error_response("Missing or invalid credentials"),
                        "403": error_response("Origin or capability denied"),
                        "404": error_response("Unknown endpoint"),
                        "429": error_response("Rate limit exceeded"),
                        "500": error_response("Internal error")
                    }
                }
            }),
        );
    }

    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Finance Gateway",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Front door for the payments, reconciliation, payroll, compliance and embedded-finance APIs"
        },
        "paths": paths,
        "security": [{ "bearerAuth": [] }, { "apiKeyAuth": [] }],
        "components": {
            "securitySchemes": {
                "bearerAuth": { "type": "http", "scheme": "bearer", "bearerFormat": "JWT" },
                "apiKeyAuth": { "type": "apiKey", "in": "header", "name": "X-API-Key" }
            },
            "schemas": {
                "ErrorEnvelope": {
                    "type": "object",
                    "required": ["error", "message", "timestamp", "requestId"],
                    "properties": {
                        "error": {
                            "type": "string",
                            "enum": [
                                "ValidationError", "MissingCredentials", "AuthenticationFailed",
                                "AuthorizationDenied", "RateLimitExceeded", "NotFound", "InternalError"
                            ]
                        },
                        "message": { "type": "string" },
                        "timestamp": { "type": "string", "format": "date-time" },
                        "requestId": { "type": "string" },
                        "retryAfter": { "type": "integer", "minimum": 1 }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::RequestId;

    #[test]
    fn document_lists_every_domain_group() {
        let doc = openapi_document();
        for group in RouteGroup::DOMAINS {
            let key = format!("{}/{{path}}", group.prefix());
            assert!(doc["paths"].get(&key).is_some(), "{key}");
        }
        assert_eq!(doc["openapi"], "3.0.3");
    }

    #[tokio::test]
    async fn answers_get_and_head_only() {
        let handler = DocsHandler::new();
        let ctx = RequestContext::new(RequestId::generate(), None);

        for method in [Method::GET, Method::HEAD] {
            let request = Request::builder()
                .method(method.clone())
                .uri("/api-docs")
                .body(Body::empty())
                .unwrap();
            let response = handler.handle(&ctx, request).await.unwrap();
            assert_eq!(response.status(), axum::http::StatusCode::OK, "{method}");
        }

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api-docs")
            .body(Body::empty())
            .unwrap();
        assert!(handler.handle(&ctx, request).await.is_err());
    }
}
