//! Rate Limiter (C3): per-tenant admission, one request per configured
//! interval, burst of one.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::QuantaClock;
use governor::{Quota, RateLimiter as GovernorRateLimiter};

type KeyedLimiter = GovernorRateLimiter<String, governor::state::keyed::DefaultKeyedStateStore<String>, QuantaClock>;

/// Keyed token-bucket limiter, one bucket per tenant partition key, created
/// lazily on first use and never evicted (bounded by active tenant count).
pub struct RateLimiter {
    limiter: KeyedLimiter,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        let quota = Quota::with_period(interval)
            .expect("rate-limit interval must be non-zero")
            .allow_burst(NonZeroU32::new(1).expect("1 is non-zero"));
        Self {
            limiter: GovernorRateLimiter::keyed(quota),
        }
    }

    /// Admits one request for `partition_key`. Returns `true` if a token
    /// was available, `false` if the caller should respond 429.
    pub fn admit(&self, partition_key: &str) -> bool {
        self.limiter.check_key(&partition_key.to_owned()).is_ok()
    }
}
