//! HTTP rate limiting middleware
//!
//! Sharded in-memory fixed-window limiter. Admitted requests are limited
//! per tenant (platform admins per actor); unauthenticated requests share a
//! per-path budget so a login flood cannot starve the rest of the surface.
//!
//! Adds `X-RateLimit-Limit` and `X-RateLimit-Remaining` to responses and
//! `Retry-After` on 429s.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tessera_core::context;
use tokio::sync::Mutex;

use crate::middleware::audit;

#[derive(Clone)]
struct RateLimitBucket {
    count: u32,
    reset_at: Instant,
}

impl RateLimitBucket {
    fn new(window: Duration) -> Self {
        Self {
            count: 0,
            reset_at: Instant::now() + window,
        }
    }

    fn check_and_increment(&mut self, limit: u32, window: Duration) -> (bool, u32) {
        let now = Instant::now();
        if now >= self.reset_at {
            self.count = 0;
            self.reset_at = now + window;
        }
        if self.count < limit {
            self.count += 1;
            (true, limit.saturating_sub(self.count))
        } else {
            (false, 0)
        }
    }

    fn reset_in(&self) -> Duration {
        self.reset_at.saturating_duration_since(Instant::now())
    }
}

/// Sharded to keep lock contention low under concurrent traffic.
pub struct HttpRateLimiter {
    shards: Vec<Arc<Mutex<HashMap<String, RateLimitBucket>>>>,
    shard_count: usize,
    limit_per_minute: u32,
    tenant_limit_per_minute: Option<u32>,
    window: Duration,
}

impl HttpRateLimiter {
    pub fn new(limit_per_minute: u32, tenant_limit_per_minute: Option<u32>) -> Self {
        Self::with_shards(limit_per_minute, tenant_limit_per_minute, 16)
    }

    pub fn with_shards(
        limit_per_minute: u32,
        tenant_limit_per_minute: Option<u32>,
        shard_count: usize,
    ) -> Self {
        let shards = (0..shard_count)
            .map(|_| Arc::new(Mutex::new(HashMap::new())))
            .collect();
        Self {
            shards,
            shard_count,
            limit_per_minute,
            tenant_limit_per_minute,
            window: Duration::from_secs(60),
        }
    }

    fn shard_index(&self, key: &str) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.shard_count
    }

    pub async fn check_rate_limit(&self, key: &str, limit: u32) -> Result<u32, Duration> {
        let shard = &self.shards[self.shard_index(key)];
        let mut buckets = shard.lock().await;
        let window = self.window;
        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| RateLimitBucket::new(window));
        let (allowed, remaining) = bucket.check_and_increment(limit, window);
        if allowed {
            Ok(remaining)
        } else {
            Err(bucket.reset_in())
        }
    }

    /// Drop buckets whose window has long expired.
    pub async fn cleanup_expired_buckets(&self) {
        let now = Instant::now();
        let grace = self.window;
        for shard in &self.shards {
            let mut buckets = shard.lock().await;
            buckets.retain(|_, bucket| bucket.reset_at > now || (now - bucket.reset_at) < grace);
        }
    }
}

pub async fn rate_limit_middleware(
    State(rate_limiter): State<Arc<HttpRateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    // Admitted requests carry a context; key on the tenant (or the actor
    // for unbound platform admins). Anonymous traffic shares a path bucket.
    let (key, limit) = match context::get_or_none() {
        Some(ctx) => {
            let limit = rate_limiter
                .tenant_limit_per_minute
                .unwrap_or(rate_limiter.limit_per_minute);
            match ctx.tenant_id {
                Some(tenant) => (format!("tenant:{}", tenant), limit),
                None => (format!("actor:{}", ctx.actor_id), limit),
            }
        }
        None => (
            format!("anon:{}", request.uri().path()),
            rate_limiter.limit_per_minute,
        ),
    };

    match rate_limiter.check_rate_limit(&key, limit).await {
        Ok(remaining) => {
            let mut response = next.run(request).await;
            if let Ok(value) = HeaderValue::from_str(&limit.to_string()) {
                response.headers_mut().insert("X-RateLimit-Limit", value);
            }
            if let Ok(value) = HeaderValue::from_str(&remaining.to_string()) {
                response
                    .headers_mut()
                    .insert("X-RateLimit-Remaining", value);
            }
            response
        }
        Err(reset_in) => {
            audit::log_rate_limit_exceeded(&key, request.uri().path(), limit);
            let reset_seconds = reset_in.as_secs().max(1);

            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                axum::Json(serde_json::json!({
                    "error": "Too many requests. Please slow down.",
                    "code": "RATE_LIMITED",
                    "recoverable": true,
                })),
            )
                .into_response();

            if let Ok(value) = HeaderValue::from_str(&limit.to_string()) {
                response.headers_mut().insert("X-RateLimit-Limit", value);
            }
            response
                .headers_mut()
                .insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));
            if let Ok(value) = HeaderValue::from_str(&reset_seconds.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }
            response
        }
    }
}
