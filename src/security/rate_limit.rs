//! Fixed-window rate limiting.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{HeaderMap, Request};
use dashmap::DashMap;
use futures_util::future::{self, FutureExt};

use crate::auth::X_API_KEY;
use crate::config::{Environment, RateLimitConfig};
use crate::error::GatewayError;
use crate::http::context::RequestContext;
use crate::lifecycle::Lifecycle;
use crate::observability::metrics;
use crate::pipeline::stage::{Flow, Stage, StageFuture};

/// Counter for one key within its current window.
#[derive(Debug)]
struct Bucket {
    window_start: Instant,
    count: u64,
}

/// Snapshot of a key's allowance after a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit: u64,
    pub remaining: u64,
    pub reset_after: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed(RateLimitStatus),
    Limited(RateLimitStatus),
}

/// Shared fixed-window counters keyed by API key or client address.
pub struct RateLimiter {
    buckets: DashMap<String, Bucket>,
    limit: u64,
    window: Duration,
}

impl RateLimiter {
    pub fn new(limit: u64, window: Duration) -> Self {
        Self {
            buckets: DashMap::new(),
            limit,
            window,
        }
    }

    pub fn from_config(config: &RateLimitConfig, environment: Environment) -> Self {
        Self::new(config.limit_for(environment), config.window())
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    /// Count one request for `key` at `now`.
    ///
    /// The bucket's map entry stays locked for the whole read-modify-write, so
    /// concurrent requests sharing a key are serialized. A request over the
    /// limit leaves the count untouched.
    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut bucket = match self.buckets.get_mut(key) {
            Some(bucket) => bucket,
            None => self.buckets.entry(key.to_owned()).or_insert_with(|| Bucket {
                window_start: now,
                count: 0,
            }),
        };

        if now.saturating_duration_since(bucket.window_start) >= self.window {
            bucket.window_start = now;
            bucket.count = 0;
        }

        let reset_after = self
            .window
            .saturating_sub(now.saturating_duration_since(bucket.window_start));

        if bucket.count >= self.limit {
            return RateDecision::Limited(RateLimitStatus {
                limit: self.limit,
                remaining: 0,
                reset_after,
            });
        }

        bucket.count += 1;
        RateDecision::Allowed(RateLimitStatus {
            limit: self.limit,
            remaining: self.limit - bucket.count,
            reset_after,
        })
    }

    /// Current count for a key, if it has a bucket.
    pub fn count(&self, key: &str) -> Option<u64> {
        self.buckets.get(key).map(|bucket| bucket.count)
    }

    /// Drop buckets whose window has elapsed. Returns how many were removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.window_start) < self.window);
        before.saturating_sub(self.buckets.len())
    }

    pub fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }
}

/// Periodically purge expired buckets until the gateway stops draining.
pub async fn run_sweeper(limiter: Arc<RateLimiter>, every: Duration, lifecycle: Lifecycle) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = limiter.purge_expired(Instant::now());
                if removed > 0 {
                    tracing::debug!(removed, remaining = limiter.tracked_keys(), "Swept expired rate limit buckets");
                }
            }
            _ = lifecycle.stopped() => {
                tracing::debug!("Rate limit sweeper exiting");
                break;
            }
        }
    }
}

/// Rate limit key: the API key when supplied, else the client address.
pub fn rate_limit_key(headers: &HeaderMap, client_addr: Option<IpAddr>) -> (String, &'static str) {
    let api_key = headers
        .get(&X_API_KEY)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|key| !key.is_empty());

    match (api_key, client_addr) {
        (Some(key), _) => (format!("key:{key}"), "api_key"),
        (None, Some(addr)) => (format!("ip:{addr}"), "client_addr"),
        (None, None) => ("ip:unknown".to_string(), "client_addr"),
    }
}

/// Pipeline stage enforcing the limiter.
pub struct RateLimitStage {
    limiter: Arc<RateLimiter>,
}

impl RateLimitStage {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

impl Stage for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn apply<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: &'a mut Request<Body>,
    ) -> StageFuture<'a> {
        let (key, key_kind) = rate_limit_key(request.headers(), ctx.client_addr());

        let outcome = match self.limiter.check(&key) {
            RateDecision::Allowed(status) => {
                ctx.set_rate_limit(status);
                Ok(Flow::Continue)
            }
            RateDecision::Limited(status) => {
                ctx.set_rate_limit(status);
                tracing::warn!(
                    request_id = %ctx.request_id(),
                    key_kind,
                    limit = status.limit,
                    "Rate limit exceeded"
                );
                metrics::record_rate_limited(key_kind);
                Err(GatewayError::RateLimitExceeded {
                    retry_after_secs: status.reset_after.as_secs().max(1),
                })
            }
        };
        future::ready(outcome).boxed()
    }
}
