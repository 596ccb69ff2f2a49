//! Per-tenant usage accounting and best-effort admission
//!
//! The request path only calls [`UsageTracker::should_block`], a lookup in a
//! mutex-guarded set of blocked tenants. Counting happens out of band:
//! [`UsageTracker::record_usage`] spawns a detached task that increments the
//! tenant's windowed counter, compares it with the daily limit and sets the
//! blocked marker once the limit is reached.
//!
//! Enforcement is eventually consistent. A burst of concurrent requests can
//! go past the limit before the marker is set, and racing increments for the
//! same tenant are expected.

use crate::config::RateLimitConfig;
use crate::core::error::{CrudlyResult, RequestError};
use crate::core::store::{RateLimitStore, UsageStore};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct UsageTracker {
    usage_store: Arc<dyn UsageStore>,
    limit_store: Arc<dyn RateLimitStore>,
    blocked: Arc<Mutex<HashSet<String>>>,
    config: RateLimitConfig,
}

impl UsageTracker {
    pub fn new(
        usage_store: Arc<dyn UsageStore>,
        limit_store: Arc<dyn RateLimitStore>,
        config: RateLimitConfig,
    ) -> Self {
        Self {
            usage_store,
            limit_store,
            blocked: Arc::new(Mutex::new(HashSet::new())),
            config,
        }
    }

    /// Whether requests from `tenant` should be turned away
    pub fn should_block(&self, tenant: &str) -> bool {
        self.blocked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(tenant)
    }

    /// [`should_block`](Self::should_block) as a typed error
    pub fn admit(&self, tenant: &str) -> Result<(), RequestError> {
        if self.should_block(tenant) {
            return Err(RequestError::RateLimited {
                tenant: tenant.to_string(),
            });
        }
        Ok(())
    }

    /// Count one call without waiting for the result
    ///
    /// Failures are logged and otherwise ignored. The handle may be dropped;
    /// the task keeps running.
    pub fn record_usage(&self, tenant: &str) -> JoinHandle<()> {
        let tracker = self.clone();
        let tenant = tenant.to_string();

        tokio::spawn(async move {
            if let Err(err) = tracker.handle_usage(&tenant).await {
                tracing::warn!(tenant = %tenant, error = %err, "failed to record usage");
            }
        })
    }

    /// Increment, compare with the limit and block if it is reached
    ///
    /// Returns whether the tenant is now blocked.
    pub async fn handle_usage(&self, tenant: &str) -> CrudlyResult<bool> {
        let (count, limit) = tokio::try_join!(
            self.usage_store.increment(tenant, self.config.window()),
            self.daily_limit(tenant),
        )?;

        if count < limit {
            return Ok(false);
        }

        let newly_blocked = self
            .blocked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tenant.to_string());
        if newly_blocked {
            tracing::info!(tenant = %tenant, count, limit, "tenant reached daily limit");
        }

        Ok(true)
    }

    /// The tenant's configured limit, or the default when none is stored
    pub async fn daily_limit(&self, tenant: &str) -> CrudlyResult<u64> {
        Ok(self
            .limit_store
            .daily_limit(tenant)
            .await?
            .unwrap_or(self.config.default_daily_limit))
    }

    pub async fn set_daily_limit(&self, tenant: &str, limit: u64) -> CrudlyResult<()> {
        self.limit_store.set_daily_limit(tenant, limit).await
    }

    pub async fn current_usage(&self, tenant: &str) -> CrudlyResult<u64> {
        self.usage_store.current_count(tenant).await
    }

    pub fn blocked_tenants(&self) -> Vec<String> {
        let mut tenants: Vec<String> = self
            .blocked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        tenants.sort();
        tenants
    }

    /// Clear markers for tenants whose window reset or whose limit was raised
    ///
    /// Returns how many tenants were unblocked.
    pub async fn refresh_blocked(&self) -> CrudlyResult<usize> {
        let mut released = 0;

        for tenant in self.blocked_tenants() {
            let (count, limit) = tokio::try_join!(
                self.usage_store.current_count(&tenant),
                self.daily_limit(&tenant),
            )?;

            if count < limit {
                self.blocked
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&tenant);
                tracing::debug!(tenant = %tenant, count, limit, "tenant unblocked");
                released += 1;
            }
        }

        Ok(released)
    }

    /// Run [`refresh_blocked`](Self::refresh_blocked) on the configured interval
    pub fn spawn_refresh(&self) -> JoinHandle<()> {
        let tracker = self.clone();
        let period = self.config.refresh_interval();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if let Err(err) = tracker.refresh_blocked().await {
                    tracing::warn!(error = %err, "failed to refresh blocked tenants");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Every tenant sits at `count` calls; only `capped` has a stored limit
    struct FixedStore {
        count: u64,
    }

    #[async_trait]
    impl UsageStore for FixedStore {
        async fn increment(&self, _tenant: &str, _window: Duration) -> CrudlyResult<u64> {
            Ok(self.count)
        }

        async fn current_count(&self, _tenant: &str) -> CrudlyResult<u64> {
            Ok(self.count)
        }
    }

    #[async_trait]
    impl RateLimitStore for FixedStore {
        async fn daily_limit(&self, tenant: &str) -> CrudlyResult<Option<u64>> {
            Ok((tenant == "capped").then_some(3))
        }

        async fn set_daily_limit(&self, _tenant: &str, _limit: u64) -> CrudlyResult<()> {
            Ok(())
        }
    }

    fn tracker(count: u64) -> UsageTracker {
        let store = Arc::new(FixedStore { count });
        let config = RateLimitConfig {
            default_daily_limit: 10,
            ..Default::default()
        };
        UsageTracker::new(store.clone(), store, config)
    }

    #[test]
    fn test_unknown_tenant_is_admitted() {
        let tracker = tracker(0);
        assert!(!tracker.should_block("acme"));
        assert!(tracker.admit("acme").is_ok());
        assert!(tracker.blocked_tenants().is_empty());
    }

    #[tokio::test]
    async fn test_block_at_stored_limit_only() {
        let tracker = tracker(3);

        assert!(tracker.handle_usage("capped").await.unwrap());
        assert!(!tracker.handle_usage("acme").await.unwrap());

        assert!(tracker.should_block("capped"));
        assert!(!tracker.should_block("acme"));
        assert!(matches!(
            tracker.admit("capped"),
            Err(RequestError::RateLimited { ref tenant }) if tenant == "capped"
        ));
        assert_eq!(tracker.blocked_tenants(), vec!["capped".to_string()]);
    }

    #[tokio::test]
    async fn test_clones_share_blocked_set() {
        let tracker = tracker(10);
        let clone = tracker.clone();

        assert!(clone.handle_usage("acme").await.unwrap());
        assert!(tracker.should_block("acme"));
        assert_eq!(tracker.daily_limit("acme").await.unwrap(), 10);
    }
}
