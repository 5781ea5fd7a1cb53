//! Dynamic Limit Resolver
//!
//! Resolves the effective quota limits from the persisted subscription
//! record. An expired or lapsed subscription is downgraded to the free
//! plan as a side effect, so the stored record converges to what the
//! limits say.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::storage::{load_record, save_record, RecordStore};

use super::limits::QuotaLimits;
use super::subscription::{
    Subscription, SubscriptionStatus, SUBSCRIPTION_RECORD, SUBSCRIPTION_RECORD_VERSION,
};

/// Source of effective quota limits.
///
/// The tracker only needs the resolved limit set; this seam lets tests
/// (and fixed-limit deployments) bypass the subscription lookup.
#[async_trait]
pub trait LimitSource: Send + Sync {
    /// The limit set currently in force
    async fn effective_limits(&self) -> QuotaLimits;
}

/// A limit source that always returns the same limits
#[derive(Debug, Clone)]
pub struct FixedLimits {
    limits: QuotaLimits,
}

impl FixedLimits {
    /// Wrap a fixed limit set
    pub fn new(limits: QuotaLimits) -> Self {
        Self { limits }
    }
}

#[async_trait]
impl LimitSource for FixedLimits {
    async fn effective_limits(&self) -> QuotaLimits {
        self.limits
    }
}

/// Resolves effective quota limits from the subscription record
#[derive(Clone)]
pub struct LimitResolver {
    clock: Arc<dyn Clock>,
    store: Arc<dyn RecordStore>,
    warning_threshold: Option<f64>,
}

impl LimitResolver {
    /// Create a resolver over the given clock and store
    pub fn new(clock: Arc<dyn Clock>, store: Arc<dyn RecordStore>) -> Self {
        Self {
            clock,
            store,
            warning_threshold: None,
        }
    }

    /// Override the plan's warning threshold (from configuration)
    pub fn with_warning_threshold(mut self, threshold: f64) -> Self {
        self.warning_threshold = Some(threshold);
        self
    }

    /// Effective limits for the current user.
    ///
    /// An active, unexpired subscription yields its plan's limits. A
    /// lapsed one is downgraded to the free plan first (persisted), then
    /// free-tier limits are returned. A missing or corrupt record is
    /// free tier (fail-open).
    pub async fn effective_limits(&self) -> QuotaLimits {
        let mut limits = self.current_subscription().await.plan.limits();
        if let Some(threshold) = self.warning_threshold {
            limits.warning_threshold = threshold;
        }
        limits
    }

    /// The subscription after the expiry check, downgrading if needed
    pub async fn current_subscription(&self) -> Subscription {
        let now = self.clock.now();
        let Some(sub) = load_record::<Subscription>(
            self.store.as_ref(),
            SUBSCRIPTION_RECORD,
            SUBSCRIPTION_RECORD_VERSION,
        )
        .await
        else {
            debug!("No subscription record, using free tier");
            return Subscription::free();
        };

        if sub.is_active(now) {
            return sub;
        }

        info!(
            "Subscription to plan {:?} lapsed (status {:?}, expires {:?}), downgrading to free",
            sub.plan, sub.status, sub.expires_at
        );
        let downgraded = Subscription {
            version: SUBSCRIPTION_RECORD_VERSION,
            plan: crate::quota::PlanId::Free,
            status: SubscriptionStatus::Active,
            subscription_id: None,
            started_at: sub.started_at,
            expires_at: None,
        };
        if let Err(e) = save_record(self.store.as_ref(), SUBSCRIPTION_RECORD, &downgraded).await {
            warn!("Failed to persist subscription downgrade: {}", e);
        }
        downgraded
    }
}

#[async_trait]
impl LimitSource for LimitResolver {
    async fn effective_limits(&self) -> QuotaLimits {
        LimitResolver::effective_limits(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::quota::PlanId;
    use crate::storage::MemoryStore;
    use chrono::{Duration, TimeZone, Utc};

    fn setup() -> (ManualClock, Arc<MemoryStore>, LimitResolver) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap());
        let store = Arc::new(MemoryStore::new());
        let resolver = LimitResolver::new(Arc::new(clock.clone()), store.clone());
        (clock, store, resolver)
    }

    #[tokio::test]
    async fn test_missing_record_resolves_to_free() {
        let (_clock, _store, resolver) = setup();
        let limits = resolver.effective_limits().await;
        assert_eq!(limits, PlanId::Free.limits());
    }

    #[tokio::test]
    async fn test_active_subscription_overrides_defaults() {
        let (clock, store, resolver) = setup();
        let sub = Subscription {
            plan: PlanId::ProMonthly,
            expires_at: Some(clock.now() + Duration::days(20)),
            ..Subscription::free()
        };
        save_record(store.as_ref(), SUBSCRIPTION_RECORD, &sub)
            .await
            .unwrap();

        let limits = resolver.effective_limits().await;
        assert_eq!(limits, PlanId::ProMonthly.limits());
    }

    #[tokio::test]
    async fn test_expired_subscription_downgrades_and_persists() {
        let (clock, store, resolver) = setup();
        let sub = Subscription {
            plan: PlanId::PremiumMonthly,
            subscription_id: Some("sub_42".to_string()),
            expires_at: Some(clock.now() - Duration::hours(1)),
            ..Subscription::free()
        };
        save_record(store.as_ref(), SUBSCRIPTION_RECORD, &sub)
            .await
            .unwrap();

        // Scenario: expired plan resolves to free-tier limits
        let limits = resolver.effective_limits().await;
        assert_eq!(limits, PlanId::Free.limits());

        // And the stored record was downgraded as a side effect
        let stored: Subscription = load_record(
            store.as_ref(),
            SUBSCRIPTION_RECORD,
            SUBSCRIPTION_RECORD_VERSION,
        )
        .await
        .unwrap();
        assert_eq!(stored.plan, PlanId::Free);
        assert_eq!(stored.status, SubscriptionStatus::Active);
        assert!(stored.expires_at.is_none());
        assert!(stored.subscription_id.is_none());
    }

    #[tokio::test]
    async fn test_subscription_expiring_while_running() {
        let (clock, store, resolver) = setup();
        let sub = Subscription {
            plan: PlanId::BasicMonthly,
            expires_at: Some(clock.now() + Duration::days(1)),
            ..Subscription::free()
        };
        save_record(store.as_ref(), SUBSCRIPTION_RECORD, &sub)
            .await
            .unwrap();

        assert_eq!(
            resolver.effective_limits().await,
            PlanId::BasicMonthly.limits()
        );

        clock.advance(Duration::days(2));
        assert_eq!(resolver.effective_limits().await, PlanId::Free.limits());
    }

    #[tokio::test]
    async fn test_corrupt_record_resolves_to_free() {
        let (_clock, store, resolver) = setup();
        store.put(SUBSCRIPTION_RECORD, "garbage").await.unwrap();

        let limits = resolver.effective_limits().await;
        assert_eq!(limits, PlanId::Free.limits());
    }
}
