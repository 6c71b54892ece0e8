//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Build every component in dependency order and inject it into the pipeline
//! - Start background tasks (audit writer, rate limit sweeper, signals, metrics)
//! - Bind the listener last, so traffic arrives only when everything is ready
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Nothing is global except the tracing subscriber, which the binary installs

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::audit::{AuditRecorder, AuditSink, TracingSink};
use crate::auth::{ApiKeyStore, Authenticator};
use crate::config::validation::validate_config;
use crate::config::{ConfigError, GatewayConfig};
use crate::error::ErrorNormalizer;
use crate::health::HealthHandler;
use crate::http::docs::DocsHandler;
use crate::http::server::GatewayServer;
use crate::lifecycle::{signals, InFlightTracker, Lifecycle};
use crate::observability::metrics;
use crate::pipeline::Pipeline;
use crate::routing::{Dispatcher, DomainHandler, EchoHandler, RouteGroup};
use crate::security::rate_limit::run_sweeper;
use crate::security::{BodyStage, OriginPolicy, OriginStage, RateLimitStage, RateLimiter};

/// How long the binary waits for the audit writer after the server stops.
const AUDIT_WRITER_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// A fully wired gateway, ready to be served.
pub struct Gateway {
    config: Arc<GatewayConfig>,
    pipeline: Arc<Pipeline>,
    lifecycle: Lifecycle,
    in_flight: InFlightTracker,
    audit: AuditRecorder,
    audit_writer: Option<JoinHandle<()>>,
    rate_limiter: Arc<RateLimiter>,
    api_keys: Arc<ApiKeyStore>,
}

impl Gateway {
    pub fn builder(config: GatewayConfig) -> GatewayBuilder {
        GatewayBuilder::new(config)
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn pipeline(&self) -> Arc<Pipeline> {
        Arc::clone(&self.pipeline)
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn in_flight(&self) -> &InFlightTracker {
        &self.in_flight
    }

    pub fn audit(&self) -> &AuditRecorder {
        &self.audit
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// Live key store; revocations take effect on the next request.
    pub fn api_keys(&self) -> &Arc<ApiKeyStore> {
        &self.api_keys
    }

    pub fn drain_timeout(&self) -> Duration {
        self.config.shutdown.drain_timeout()
    }

    /// Take the audit writer task. It finishes once the gateway and every
    /// recorder clone are gone and the queue has been written out.
    pub fn take_audit_writer(&mut self) -> Option<JoinHandle<()>> {
        self.audit_writer.take()
    }

    /// Start the periodic purge of expired rate limit buckets.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let every = Duration::from_secs(self.config.rate_limit.sweep_interval_secs.max(1));
        tokio::spawn(run_sweeper(
            Arc::clone(&self.rate_limiter),
            every,
            self.lifecycle.clone(),
        ))
    }
}

/// Assembles a [`Gateway`] from configuration plus optional overrides.
pub struct GatewayBuilder {
    config: GatewayConfig,
    audit_sink: Option<Box<dyn AuditSink>>,
    handlers: Vec<(RouteGroup, Box<dyn DomainHandler>)>,
    lifecycle: Option<Lifecycle>,
}

impl GatewayBuilder {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            audit_sink: None,
            handlers: Vec::new(),
            lifecycle: None,
        }
    }

    /// Replace the default `tracing` audit sink.
    pub fn audit_sink(mut self, sink: impl AuditSink) -> Self {
        let sink: Box<dyn AuditSink> = Box::new(sink);
        self.audit_sink = Some(sink);
        self
    }

    /// Serve a domain group with a real collaborator instead of the echo
    /// placeholder.
    pub fn handler(mut self, group: RouteGroup, handler: impl DomainHandler + 'static) -> Self {
        let handler: Box<dyn DomainHandler> = Box::new(handler);
        self.handlers.push((group, handler));
        self
    }

    pub fn lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    /// Validate the configuration and wire the pipeline.
    ///
    /// Must be called inside a Tokio runtime: the audit writer is spawned here.
    pub fn build(self) -> Result<Gateway, StartupError> {
        validate_config(&self.config).map_err(ConfigError::Validation)?;

        let config = Arc::new(self.config);
        let lifecycle = self.lifecycle.unwrap_or_default();
        let in_flight = InFlightTracker::new();

        let sink = self
            .audit_sink
            .unwrap_or_else(|| Box::new(TracingSink) as Box<dyn AuditSink>);
        let (audit, audit_writer) = AuditRecorder::spawn(sink);

        let rate_limiter = Arc::new(RateLimiter::from_config(&config.rate_limit, config.environment));
        let api_keys = Arc::new(ApiKeyStore::from_config(&config.auth.api_keys));

        let mut dispatcher = Dispatcher::new().with(
            RouteGroup::Health,
            HealthHandler::new(lifecycle.clone(), in_flight.clone(), config.environment),
        );
        if config.docs_enabled() {
            dispatcher.register(RouteGroup::Docs, DocsHandler::new());
        }
        for group in RouteGroup::DOMAINS {
            dispatcher.register(group, EchoHandler);
        }
        for (group, handler) in self.handlers {
            dispatcher.register(group, handler);
        }

        let pipeline = Pipeline::new(
            dispatcher,
            audit.clone(),
            ErrorNormalizer::new(config.environment),
            in_flight.clone(),
        )
        .with_stage(OriginStage::new(OriginPolicy::new(&config.security.allowed_origins)))
        .with_stage(RateLimitStage::new(Arc::clone(&rate_limiter)))
        .with_stage(BodyStage::new(config.security.max_body_bytes))
        .with_stage(Authenticator::from_config(&config.auth, Arc::clone(&api_keys)));

        tracing::info!(
            environment = config.environment.as_str(),
            stages = ?pipeline.stage_names(),
            groups = ?pipeline.dispatcher().groups().map(RouteGroup::as_str).collect::<Vec<_>>(),
            rate_limit = rate_limiter.limit(),
            window_secs = rate_limiter.window().as_secs(),
            api_keys = api_keys.len(),
            "Gateway assembled"
        );

        Ok(Gateway {
            config,
            pipeline: Arc::new(pipeline),
            lifecycle,
            in_flight,
            audit,
            audit_writer: Some(audit_writer),
            rate_limiter,
            api_keys,
        })
    }
}

/// Run the gateway until a termination signal has been handled.
pub async fn run(config: GatewayConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => {
                metrics::init_metrics(addr);
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let addr = config.bind_address();
    let mut gateway = Gateway::builder(config).build()?;
    let audit_writer = gateway.take_audit_writer();

    let signals = tokio::spawn(signals::listen(gateway.lifecycle().clone()));
    let sweeper = gateway.spawn_sweeper();

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| StartupError::Bind {
            addr: addr.clone(),
            source,
        })?;
    tracing::info!(address = %addr, "Listening for connections");

    let result = GatewayServer::new(gateway)
        .run(listener)
        .await
        .map_err(StartupError::Serve);

    let _ = tokio::join!(signals, sweeper);
    if let Some(writer) = audit_writer {
        if tokio::time::timeout(AUDIT_WRITER_GRACE, writer).await.is_err() {
            tracing::warn!("Audit writer did not finish in time");
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemorySink;

    #[tokio::test]
    async fn audit_writer_finishes_once_gateway_is_dropped() {
        let sink = MemorySink::new();
        let mut gateway = Gateway::builder(GatewayConfig::default())
            .audit_sink(sink.clone())
            .build()
            .unwrap();
        let writer = gateway.take_audit_writer().unwrap();
        assert!(gateway.take_audit_writer().is_none());

        let entry = gateway.audit().open("req-1", "GET", "/health", "anonymous");
        entry.close(200);
        drop(gateway);

        tokio::time::timeout(Duration::from_secs(1), writer)
            .await
            .expect("writer exits")
            .unwrap();
        assert_eq!(sink.closed().len(), 1);
    }
}
