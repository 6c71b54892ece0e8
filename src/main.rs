//! Finance Gateway
//!
//! Front-door request pipeline for the payments, reconciliation, payroll,
//! compliance and embedded-finance APIs.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────┐
//!                    │                   FINANCE GATEWAY                    │
//!                    │                                                      │
//!  Client Request    │  ┌────────┐  ┌──────────┐  ┌────────┐  ┌───────────┐  │
//!  ──────────────────┼─▶│ origin │─▶│rate_limit│─▶│  body  │─▶│authenticate│ │
//!                    │  └────────┘  └──────────┘  └────────┘  └─────┬─────┘  │
//!                    │                                              │        │
//!                    │                                              ▼        │
//!  Client Response   │  ┌──────────────┐                     ┌────────────┐  │
//!  ◀─────────────────┼──│  normalizer  │◀────────────────────│ dispatcher │  │
//!                    │  │ + finalize   │                     │ → handlers │  │
//!                    │  └──────────────┘                     └────────────┘  │
//!                    │                                                      │
//!                    │  Cross-cutting: correlation id, audit trail,         │
//!                    │  security headers, metrics, lifecycle                │
//!                    └──────────────────────────────────────────────────────┘
//! ```

use finance_gateway::config::load_from_env;
use finance_gateway::lifecycle;
use finance_gateway::observability::logging::init_logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_from_env()?;
    init_logging(config.environment, &config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = config.environment.as_str(),
        bind_address = %config.bind_address(),
        allowed_origins = ?config.security.allowed_origins,
        drain_timeout_secs = config.shutdown.drain_timeout_secs,
        "finance-gateway starting"
    );

    lifecycle::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
