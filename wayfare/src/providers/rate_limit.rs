use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};

use crate::config::ProvidersConfig;
use crate::error::{Result, WayfareError};
use crate::models::Provider;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// One token bucket per provider, shared by every concept task.
///
/// Providers without a configured limit are not throttled.
pub struct ProviderRateLimiter {
    per_minute: HashMap<Provider, NonZeroU32>,
    limiters: RwLock<HashMap<Provider, Arc<DirectLimiter>>>,
}

impl std::fmt::Debug for ProviderRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRateLimiter")
            .field("per_minute", &self.per_minute)
            .finish()
    }
}

impl ProviderRateLimiter {
    pub fn new(limits: impl IntoIterator<Item = (Provider, u32)>) -> Self {
        let per_minute: HashMap<Provider, NonZeroU32> = limits
            .into_iter()
            .filter_map(|(provider, limit)| NonZeroU32::new(limit).map(|n| (provider, n)))
            .collect();
        let limiters = RwLock::new(Self::build(&per_minute));

        Self {
            per_minute,
            limiters,
        }
    }

    pub fn from_config(config: &ProvidersConfig) -> Self {
        Self::new(
            [
                Provider::Google,
                Provider::Yelp,
                Provider::Amadeus,
                Provider::Weather,
            ]
            .map(|p| (p, config.get(p).rate_limit_per_minute)),
        )
    }

    pub fn unlimited() -> Self {
        Self::new(std::iter::empty())
    }

    fn build(per_minute: &HashMap<Provider, NonZeroU32>) -> HashMap<Provider, Arc<DirectLimiter>> {
        per_minute
            .iter()
            .map(|(provider, limit)| {
                (
                    *provider,
                    Arc::new(RateLimiter::direct(Quota::per_minute(*limit))),
                )
            })
            .collect()
    }

    fn limiter(&self, provider: Provider) -> Option<Arc<DirectLimiter>> {
        match self.limiters.read() {
            Ok(guard) => guard.get(&provider).cloned(),
            Err(poisoned) => poisoned.into_inner().get(&provider).cloned(),
        }
    }

    /// Wait for a permit, giving up after `max_wait`.
    pub async fn acquire(&self, provider: Provider, max_wait: Duration) -> Result<()> {
        let Some(limiter) = self.limiter(provider) else {
            return Ok(());
        };

        if limiter.check().is_ok() {
            return Ok(());
        }

        tracing::debug!(%provider, "Rate limit reached, waiting for permit");
        tokio::time::timeout(max_wait, limiter.until_ready())
            .await
            .map_err(|_| WayfareError::RateLimited { provider })
    }

    /// Refill every bucket.
    pub fn clear(&self) {
        let fresh = Self::build(&self.per_minute);
        match self.limiters.write() {
            Ok(mut guard) => *guard = fresh,
            Err(poisoned) => *poisoned.into_inner() = fresh,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unlimited_provider_never_waits() {
        let limiter = ProviderRateLimiter::unlimited();
        for _ in 0..100 {
            limiter
                .acquire(Provider::Google, Duration::from_millis(1))
                .await
                .expect("no limit configured");
        }
    }

    #[tokio::test]
    async fn exhausted_bucket_times_out() {
        let limiter = ProviderRateLimiter::new([(Provider::Yelp, 2)]);
        let wait = Duration::from_millis(20);

        limiter.acquire(Provider::Yelp, wait).await.expect("first");
        limiter.acquire(Provider::Yelp, wait).await.expect("second");
        let err = limiter.acquire(Provider::Yelp, wait).await.unwrap_err();
        assert!(matches!(err, WayfareError::RateLimited { provider: Provider::Yelp }));

        // Other providers are unaffected.
        limiter.acquire(Provider::Google, wait).await.expect("google");
    }

    #[tokio::test]
    async fn clear_refills_buckets() {
        let limiter = ProviderRateLimiter::new([(Provider::Amadeus, 1)]);
        let wait = Duration::from_millis(10);

        limiter.acquire(Provider::Amadeus, wait).await.expect("first");
        assert!(limiter.acquire(Provider::Amadeus, wait).await.is_err());

        limiter.clear();
        limiter.acquire(Provider::Amadeus, wait).await.expect("after clear");
    }

    #[test]
    fn zero_limit_means_unlimited() {
        let limiter = ProviderRateLimiter::new([(Provider::Google, 0)]);
        assert!(limiter.limiter(Provider::Google).is_none());
    }
}
