//! # Per-Provider Rate Budgets
//!
//! Token buckets shared across workers. A worker that cannot draw
//! capacity sleeps until the bucket refills — acquisition is an await
//! point, so blocked workers yield their thread.
//!
//! The set is process-wide state: built at startup from configuration
//! and passed explicitly to the pipeline.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// A token bucket: `capacity` burst, `refill_per_sec` sustained.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(capacity: f64, refill_per_sec: f64) -> Self {
        Self {
            capacity,
            refill_per_sec,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Draw `amount` tokens, sleeping until the bucket can cover it.
    pub async fn acquire(&self, amount: f64) {
        let amount = amount.min(self.capacity);
        loop {
            let wait = {
                let mut state = self.state.lock();
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
                state.last_refill = now;
                if state.tokens >= amount {
                    state.tokens -= amount;
                    None
                } else {
                    let deficit = amount - state.tokens;
                    Some(Duration::from_secs_f64(deficit / self.refill_per_sec))
                }
            };
            match wait {
                None => return,
                Some(delay) => tokio::time::sleep(delay).await,
            }
        }
    }

    /// Non-blocking draw; false when the bucket cannot cover it now.
    pub fn try_acquire(&self, amount: f64) -> bool {
        let mut state = self.state.lock();
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;
        if state.tokens >= amount {
            state.tokens -= amount;
            true
        } else {
            false
        }
    }
}

/// Named buckets, one per provider.
#[derive(Debug, Default)]
pub struct RateLimiterSet {
    buckets: HashMap<String, Arc<TokenBucket>>,
}

#[async_trait::async_trait]
impl fdd_extract::Throttle for RateLimiterSet {
    async fn acquire(&self, provider: &str) {
        RateLimiterSet::acquire(self, provider).await;
    }
}

impl RateLimiterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bucket for a provider name.
    pub fn insert(&mut self, provider: impl Into<String>, bucket: TokenBucket) {
        self.buckets.insert(provider.into(), Arc::new(bucket));
    }

    /// Draw one request's worth of budget for the provider, if a bucket
    /// is configured. Unconfigured providers are unlimited.
    pub async fn acquire(&self, provider: &str) {
        if let Some(bucket) = self.buckets.get(provider) {
            bucket.acquire(1.0).await;
        }
    }
}
