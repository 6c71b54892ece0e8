//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the axum router: one fallback handler feeding the pipeline
//! - Wire up tower layers (security headers, compression, tracing)
//! - Accept connections and own every connection task
//! - Drain within the configured deadline, then abort what is left
//! - Flush the audit trail before reporting the server stopped
//!
//! # Design Decisions
//! - Connections are served with hyper directly so that an abandoned
//!   connection can be aborted; dropping its task drops the request future,
//!   which closes the audit record with 499
//! - HTTP/1 only: request futures then live inside their connection task

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::Response,
    Extension, Router,
};
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::service::TowerToHyperService;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tower_http::{
    compression::CompressionLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};

use crate::lifecycle::{Gateway, Lifecycle};
use crate::pipeline::Pipeline;
use crate::security::headers::security_headers;

/// Pause after a failed accept (e.g. file descriptor exhaustion).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Build the axum router around a pipeline.
pub fn build_router(pipeline: Arc<Pipeline>) -> Router {
    let mut router = Router::new().fallback(gateway_handler).with_state(pipeline);

    for (name, value) in security_headers() {
        router = router.layer(SetResponseHeaderLayer::overriding(name, value));
    }

    router
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

/// Every request, whatever its path, goes through the pipeline.
async fn gateway_handler(State(pipeline): State<Arc<Pipeline>>, request: Request<Body>) -> Response {
    let client_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    pipeline.handle(request, client_addr).await
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    gateway: Gateway,
}

impl GatewayServer {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn router(&self) -> Router {
        build_router(self.gateway.pipeline())
    }

    /// Serve until the lifecycle starts draining, then finish in-flight
    /// requests or abort them at the drain deadline.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let lifecycle = self.gateway.lifecycle().clone();
        let drain_timeout = self.gateway.drain_timeout();
        tracing::info!(address = %addr, "HTTP server starting");

        let router = self.router();
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!(peer_addr = %peer, "Connection accepted");
                        connections.spawn(serve_connection(
                            stream,
                            peer,
                            router.clone(),
                            lifecycle.clone(),
                        ));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to accept connection");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                _ = lifecycle.draining() => break,
            }
        }
        drop(listener);

        tracing::info!(
            connections = connections.len(),
            in_flight = self.gateway.in_flight().active(),
            timeout_secs = drain_timeout.as_secs(),
            "Listener closed, draining in-flight requests"
        );

        let drained = tokio::time::timeout(drain_timeout, async {
            while connections.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                abandoned = self.gateway.in_flight().active(),
                connections = connections.len(),
                "Drain deadline passed, dropping remaining connections"
            );
            connections.abort_all();
            while connections.join_next().await.is_some() {}
        }

        self.gateway.audit().flush().await;
        lifecycle.mark_stopped();
        tracing::info!(audit = ?self.gateway.audit().stats(), "HTTP server stopped");
        Ok(())
    }
}

/// Serve one connection until the peer closes it or draining begins, in
/// which case the current request finishes and the connection closes.
async fn serve_connection(stream: TcpStream, peer: SocketAddr, router: Router, lifecycle: Lifecycle) {
    let service = TowerToHyperService::new(router.layer(Extension(ConnectInfo(peer))));
    let connection = http1::Builder::new()
        .timer(TokioTimer::new())
        .serve_connection(TokioIo::new(stream), service);
    tokio::pin!(connection);

    let result = tokio::select! {
        result = connection.as_mut() => result,
        _ = lifecycle.draining() => {
            connection.as_mut().graceful_shutdown();
            connection.as_mut().await
        }
    };

    if let Err(e) = result {
        tracing::debug!(peer_addr = %peer, error = %e, "Connection closed with error");
    }
}
