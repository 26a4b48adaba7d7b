//! Token buckets keyed by (client, operation).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::RwLock;

/// Quota configuration for one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateCfg {
    /// Tokens replenished per minute.
    pub per_minute: u32,
    /// Bucket size (burst).
    pub burst: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RateKey {
    client: String,
    api: String,
}

/// One bucket's state. Refill is computed lazily from the elapsed time at
/// each consume attempt, so idle buckets cost nothing.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(cfg: RateCfg, now: Instant) -> Self {
        let capacity = f64::from(cfg.burst);
        Self {
            tokens: capacity,
            capacity,
            refill_per_sec: f64::from(cfg.per_minute) / 60.0,
            last_refill: now,
        }
    }

    fn allow(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.last_refill = now;
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.refill_per_sec)
            .min(self.capacity);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Per-(client, operation) token buckets.
///
/// Buckets are created lazily on first sight of a pair and live for the
/// process lifetime. The collection lock is held only for lookup/insert;
/// consuming from one bucket never serializes unrelated pairs.
#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: RwLock<HashMap<RateKey, Arc<Mutex<TokenBucket>>>>,
}

impl RateLimiter {
    /// Create an empty limiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one token from the (client, api) bucket, creating it at full
    /// burst if this is the pair's first request. Returns whether the
    /// request is admitted.
    ///
    /// The config is captured when the bucket is created; later calls with
    /// a different config do not reshape an existing bucket.
    pub async fn allow(&self, client: &str, api: &str, cfg: RateCfg) -> bool {
        let key = RateKey {
            client: client.to_string(),
            api: api.to_string(),
        };

        // The read guard must drop before the write lock is requested.
        let existing = self.buckets.read().await.get(&key).map(Arc::clone);
        let bucket = match existing {
            Some(bucket) => bucket,
            None => {
                let mut buckets = self.buckets.write().await;
                Arc::clone(buckets.entry(key).or_insert_with(|| {
                    Arc::new(Mutex::new(TokenBucket::new(cfg, Instant::now())))
                }))
            }
        };

        let mut bucket = bucket.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        bucket.allow(Instant::now())
    }

    /// Number of live buckets. There is no eviction; process lifetime is
    /// the growth bound.
    pub async fn len(&self) -> usize {
        self.buckets.read().await.len()
    }
}
