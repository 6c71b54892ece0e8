//! End-to-end pipeline behaviour through the axum router.

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use finance_gateway::routing::{handler_fn, RouteGroup};

mod common;

use common::{get, send, token, API_KEY};

#[tokio::test]
async fn protected_path_without_credentials_is_missing_credentials() {
    let (gateway, router, sink) = common::gateway(common::test_config());

    let res = send(&router, get("/api/payments/123").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["error"], "MissingCredentials");
    assert!(res.body["timestamp"].is_string());
    assert_eq!(
        res.body["requestId"],
        res.headers["x-request-id"].to_str().unwrap()
    );

    gateway.audit().flush().await;
    let closed = sink.closed();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].status, Some(401));
    assert_eq!(closed[0].subject, "anonymous");
}

#[tokio::test]
async fn api_key_scenario_allows_limit_then_rejects() {
    let mut config = common::test_config();
    config.rate_limit.development_limit = 5;
    let (_gateway, router, _sink) = common::gateway(config);

    for i in 0..5 {
        let res = send(
            &router,
            get("/api/payments/abc")
                .header("x-api-key", API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(res.status, StatusCode::OK, "request {i}");
        assert_eq!(res.body["identity"]["subject"], "treasury-service");
        assert_eq!(res.body["identity"]["capabilities"][0], "payments:read");
        assert_eq!(res.headers["ratelimit-limit"], "5");
        assert_eq!(res.headers["ratelimit-remaining"], (4 - i).to_string().as_str());
    }

    let res = send(
        &router,
        get("/api/payments/abc")
            .header("x-api-key", API_KEY)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.body["error"], "RateLimitExceeded");
    let retry_after = res.body["retryAfter"].as_u64().unwrap();
    assert!(retry_after >= 1 && retry_after <= 15 * 60);
    assert_eq!(
        res.headers[header::RETRY_AFTER].to_str().unwrap(),
        retry_after.to_string()
    );
}

#[tokio::test]
async fn expired_bearer_is_rejected_and_audited_anonymously() {
    let (gateway, router, sink) = common::gateway(common::test_config());
    let expired = token("payroll-bot", -60, &["payroll:read"]);

    let res = send(
        &router,
        get("/api/payroll/y")
            .header(header::AUTHORIZATION, format!("Bearer {expired}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["error"], "AuthenticationFailed");

    gateway.audit().flush().await;
    let closed = sink.closed();
    assert_eq!(closed[0].subject, "anonymous");
    assert_eq!(closed[0].path, "/api/payroll/y");
}

#[tokio::test]
async fn valid_bearer_identity_reaches_handler_and_audit() {
    let (gateway, router, sink) = common::gateway(common::test_config());
    let valid = token("payroll-bot", 600, &["payroll:read"]);

    let res = send(
        &router,
        get("/api/payroll/run")
            .header(header::AUTHORIZATION, format!("Bearer {valid}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["route"], "payroll");
    assert_eq!(res.body["identity"]["scheme"], "bearer");

    gateway.audit().flush().await;
    assert_eq!(sink.closed()[0].subject, "payroll-bot");
}

#[tokio::test]
async fn unmatched_path_reports_requested_path() {
    let (_gateway, router, _sink) = common::gateway(common::test_config());

    let res = send(&router, get("/unknown/thing?x=1").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["error"], "NotFound");
    assert!(res.body["message"]
        .as_str()
        .unwrap()
        .contains("/unknown/thing?x=1"));
}

#[tokio::test]
async fn request_id_is_echoed_or_generated() {
    let (_gateway, router, _sink) = common::gateway(common::test_config());

    let res = send(
        &router,
        get("/health").header("x-request-id", "trace-42").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(res.headers["x-request-id"], "trace-42");

    let res = send(
        &router,
        get("/health")
            .header("x-request-id", "bad id with spaces")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    let generated = res.headers["x-request-id"].to_str().unwrap();
    assert_ne!(generated, "bad id with spaces");
    assert!(uuid::Uuid::parse_str(generated).is_ok());
}

#[tokio::test]
async fn every_request_is_opened_and_closed_once() {
    let (gateway, router, sink) = common::gateway(common::test_config());
    let paths = ["/health", "/api/payments/1", "/nope", "/api-docs", "/api/embedded"];

    for path in paths {
        send(&router, get(path).body(Body::empty()).unwrap()).await;
    }
    gateway.audit().flush().await;

    assert_eq!(sink.opened().len(), paths.len());
    assert_eq!(sink.closed().len(), paths.len());
    let stats = gateway.audit().stats();
    assert_eq!((stats.opened, stats.closed), (5, 5));
}

#[tokio::test]
async fn security_headers_are_on_every_response() {
    let (_gateway, router, _sink) = common::gateway(common::test_config());

    for path in ["/health", "/api/payments/1", "/missing"] {
        let res = send(&router, get(path).body(Body::empty()).unwrap()).await;
        assert!(res.headers[header::CONTENT_SECURITY_POLICY]
            .to_str()
            .unwrap()
            .starts_with("default-src 'self'"));
        assert_eq!(
            res.headers[header::STRICT_TRANSPORT_SECURITY],
            "max-age=31536000; includeSubDomains; preload"
        );
        assert_eq!(res.headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert!(res.headers.contains_key("x-request-id"));
    }
}

#[tokio::test]
async fn cors_allows_listed_origin_and_rejects_others() {
    let (_gateway, router, _sink) = common::gateway(common::test_config());

    let res = send(
        &router,
        get("/health")
            .header(header::ORIGIN, "http://localhost:3000")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:3000");
    assert_eq!(res.headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");

    let preflight = send(
        &router,
        axum::http::Request::builder()
            .method("OPTIONS")
            .uri("/api/payments/1")
            .header(header::ORIGIN, "http://localhost:3000")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(preflight.status, StatusCode::NO_CONTENT);
    assert!(preflight.headers[header::ACCESS_CONTROL_ALLOW_HEADERS]
        .to_str()
        .unwrap()
        .contains("X-API-Key"));

    let denied = send(
        &router,
        get("/api/payments/1")
            .header(header::ORIGIN, "https://evil.example")
            .header("x-api-key", API_KEY)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
    assert_eq!(denied.body["error"], "AuthorizationDenied");
    assert!(!denied.headers.contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn malformed_json_body_is_a_validation_error() {
    let (_gateway, router, _sink) = common::gateway(common::test_config());

    let res = send(
        &router,
        axum::http::Request::builder()
            .method("POST")
            .uri("/api/payments/transfers")
            .header("x-api-key", API_KEY)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"amount\": "))
            .unwrap(),
    )
    .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"], "ValidationError");
}

#[tokio::test]
async fn handler_panic_becomes_internal_error() {
    let sink = finance_gateway::audit::MemorySink::new();
    let gateway = common::builder(common::test_config(), &sink)
        .handler(
            RouteGroup::Compliance,
            handler_fn(|_, _| async {
                if true {
                    panic!("rule engine crashed");
                }
                Ok(StatusCode::OK.into_response())
            }),
        )
        .build()
        .unwrap();
    let router = finance_gateway::http::build_router(gateway.pipeline());

    let res = send(
        &router,
        get("/api/compliance/check")
            .header("x-api-key", API_KEY)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body["error"], "InternalError");

    // The gateway keeps serving afterwards.
    let res = send(&router, get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status, StatusCode::OK);

    gateway.audit().flush().await;
    assert_eq!(sink.closed()[0].status, Some(500));
}

#[tokio::test]
async fn production_hides_internal_detail_and_docs() {
    let mut config = common::test_config();
    config.environment = finance_gateway::config::Environment::Production;
    let sink = finance_gateway::audit::MemorySink::new();
    let gateway = common::builder(config, &sink)
        .handler(
            RouteGroup::Embedded,
            handler_fn(|_, _| async {
                Err(finance_gateway::GatewayError::internal("db password=hunter2 refused"))
            }),
        )
        .build()
        .unwrap();
    let router = finance_gateway::http::build_router(gateway.pipeline());

    let res = send(
        &router,
        get("/api/embedded/cards")
            .header("x-api-key", API_KEY)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!res.body["message"].as_str().unwrap().contains("hunter2"));

    let docs = send(&router, get("/api-docs").body(Body::empty()).unwrap()).await;
    assert_eq!(docs.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn revoked_key_is_rejected_on_next_request() {
    let (gateway, router, _sink) = common::gateway(common::test_config());
    let request = || {
        get("/api/payments/1")
            .header("x-api-key", API_KEY)
            .body(Body::empty())
            .unwrap()
    };

    assert_eq!(send(&router, request()).await.status, StatusCode::OK);
    assert!(gateway.api_keys().revoke(API_KEY));
    let res = send(&router, request()).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["error"], "AuthenticationFailed");
}

#[tokio::test]
async fn docs_are_served_outside_production() {
    let (_gateway, router, _sink) = common::gateway(common::test_config());
    let res = send(&router, get("/api-docs").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["openapi"], "3.0.3");
}
