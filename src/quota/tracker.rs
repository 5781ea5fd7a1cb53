//! Usage Quota Tracker
//!
//! Maintains the rolling daily/monthly counters for each resource class,
//! performs admission checks against the resolved limits, and persists the
//! whole usage record in one write per mutation.
//!
//! All state sits behind a single async mutex: `track()` holds it across
//! rollover, limit check, increment, and persist, so check-then-increment
//! is atomic on a multithreaded runtime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::storage::{load_record, save_record, RecordStore};

use super::counter::{
    DailyUsageRecord, ResourceClass, UsageData, WindowScope, USAGE_RECORD, USAGE_RECORD_VERSION,
};
use super::limits::QuotaLimits;
use super::resolver::LimitSource;

/// Counter view for one window scope
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScopeSnapshot {
    /// Operations counted in the current window
    pub count: u32,

    /// Effective limit for the window
    pub limit: u32,

    /// Operations left before the limit
    pub remaining: u32,

    /// Usage as a percentage of the limit, capped at 100
    pub percentage: f64,
}

impl ScopeSnapshot {
    fn new(count: u32, limit: u32) -> Self {
        let percentage = if limit > 0 {
            (f64::from(count) / f64::from(limit) * 100.0).min(100.0)
        } else {
            100.0
        };
        Self {
            count,
            limit,
            remaining: limit.saturating_sub(count),
            percentage,
        }
    }
}

/// Usage view for one resource class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Resource class this snapshot describes
    pub class: ResourceClass,

    /// Current-day window
    pub daily: ScopeSnapshot,

    /// Current-month window
    pub monthly: ScopeSnapshot,

    /// Whether either window is at or past the warning threshold
    pub near_limit: bool,

    /// Whether either window has reached its limit
    pub limit_reached: bool,
}

/// Full usage report across resource classes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub generation: UsageSnapshot,
    pub download: UsageSnapshot,

    /// Finished-day history, most recent first
    pub history: Vec<DailyUsageRecord>,

    /// Current daily window key, `YYYY-MM-DD`
    pub today: String,

    /// Current monthly window key, `YYYY-MM`
    pub current_month: String,

    /// Next daily reset (midnight UTC)
    pub next_daily_reset: DateTime<Utc>,

    /// Whether tracking is enabled at all
    pub tracking_enabled: bool,
}

/// Tracks usage against quota limits
pub struct UsageTracker {
    clock: Arc<dyn Clock>,
    store: Arc<dyn RecordStore>,
    limits: Arc<dyn LimitSource>,
    enabled: bool,
    state: Mutex<Option<UsageData>>,
}

impl UsageTracker {
    /// Create a tracker over the given clock, store, and limit source
    pub fn new(
        clock: Arc<dyn Clock>,
        store: Arc<dyn RecordStore>,
        limits: Arc<dyn LimitSource>,
    ) -> Self {
        Self {
            clock,
            store,
            limits,
            enabled: true,
            state: Mutex::new(None),
        }
    }

    /// Create a tracker that admits everything (tracking disabled)
    pub fn disabled(
        clock: Arc<dyn Clock>,
        store: Arc<dyn RecordStore>,
        limits: Arc<dyn LimitSource>,
    ) -> Self {
        Self {
            enabled: false,
            ..Self::new(clock, store, limits)
        }
    }

    /// Whether tracking is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether one more operation of this class would be admitted
    pub async fn check_limit(&self, class: ResourceClass) -> bool {
        if !self.enabled {
            return true;
        }
        let limits = self.limits.effective_limits().await;
        let now = self.clock.now();

        let mut guard = self.state.lock().await;
        let data = Self::loaded(&mut guard, self.store.as_ref(), now).await;
        if data.roll_over(now) {
            Self::persist(self.store.as_ref(), data).await;
        }
        Self::within_limits(data, class, &limits)
    }

    /// Record one operation of this class.
    ///
    /// Returns `false` and mutates nothing if either the daily or monthly
    /// limit is already reached; otherwise increments both windows and
    /// persists the updated record in one write.
    pub async fn track(&self, class: ResourceClass) -> bool {
        if !self.enabled {
            return true;
        }
        let limits = self.limits.effective_limits().await;
        let now = self.clock.now();

        let mut guard = self.state.lock().await;
        let data = Self::loaded(&mut guard, self.store.as_ref(), now).await;
        let rolled = data.roll_over(now);

        if !Self::within_limits(data, class, &limits) {
            if rolled {
                Self::persist(self.store.as_ref(), data).await;
            }
            debug!("{} blocked by quota", class);
            return false;
        }

        let usage = data.class_mut(class);
        usage.daily.count += 1;
        usage.monthly.count += 1;
        data.last_updated = now;
        debug!(
            "Tracked {}: {} today, {} this month",
            class,
            data.class(class).daily.count,
            data.class(class).monthly.count
        );
        Self::persist(self.store.as_ref(), data).await;
        true
    }

    /// Whether usage of this class is at or past the warning threshold
    /// in either window
    pub async fn is_near_limit(&self, class: ResourceClass) -> bool {
        if !self.enabled {
            return false;
        }
        let limits = self.limits.effective_limits().await;
        let now = self.clock.now();

        let mut guard = self.state.lock().await;
        let data = Self::loaded(&mut guard, self.store.as_ref(), now).await;
        if data.roll_over(now) {
            Self::persist(self.store.as_ref(), data).await;
        }

        let usage = data.class(class);
        Self::near(usage.daily.count, limits.limit_for(class, WindowScope::Daily), limits.warning_threshold)
            || Self::near(
                usage.monthly.count,
                limits.limit_for(class, WindowScope::Monthly),
                limits.warning_threshold,
            )
    }

    /// Snapshot of one resource class
    pub async fn usage(&self, class: ResourceClass) -> UsageSnapshot {
        let limits = self.limits.effective_limits().await;
        let now = self.clock.now();

        let mut guard = self.state.lock().await;
        let data = Self::loaded(&mut guard, self.store.as_ref(), now).await;
        if data.roll_over(now) {
            Self::persist(self.store.as_ref(), data).await;
        }
        Self::snapshot(data, class, &limits)
    }

    /// Full report across resource classes
    pub async fn summary(&self) -> UsageSummary {
        let limits = self.limits.effective_limits().await;
        let now = self.clock.now();

        let mut guard = self.state.lock().await;
        let data = Self::loaded(&mut guard, self.store.as_ref(), now).await;
        if data.roll_over(now) {
            Self::persist(self.store.as_ref(), data).await;
        }

        UsageSummary {
            generation: Self::snapshot(data, ResourceClass::Generation, &limits),
            download: Self::snapshot(data, ResourceClass::Download, &limits),
            history: data.history.clone(),
            today: super::counter::daily_key(now),
            current_month: super::counter::monthly_key(now),
            next_daily_reset: next_midnight(now),
            tracking_enabled: self.enabled,
        }
    }

    /// Reset every counter to the zero state and persist it
    pub async fn reset_all(&self) {
        let now = self.clock.now();
        let mut guard = self.state.lock().await;
        let fresh = UsageData::zero(now);
        Self::persist(self.store.as_ref(), &fresh).await;
        *guard = Some(fresh);
    }

    async fn loaded<'a>(
        guard: &'a mut Option<UsageData>,
        store: &dyn RecordStore,
        now: DateTime<Utc>,
    ) -> &'a mut UsageData {
        if guard.is_none() {
            // Fail-open: a missing or corrupt record starts from zero
            let data = load_record::<UsageData>(store, USAGE_RECORD, USAGE_RECORD_VERSION)
                .await
                .unwrap_or_else(|| UsageData::zero(now));
            *guard = Some(data);
        }
        guard.as_mut().unwrap()
    }

    async fn persist(store: &dyn RecordStore, data: &UsageData) {
        // A failed write must not block the operation that was admitted;
        // the in-memory state stays authoritative for this process.
        if let Err(e) = save_record(store, USAGE_RECORD, data).await {
            warn!("Failed to persist usage record: {}", e);
        }
    }

    fn within_limits(data: &UsageData, class: ResourceClass, limits: &QuotaLimits) -> bool {
        let usage = data.class(class);
        usage.daily.count < limits.limit_for(class, WindowScope::Daily)
            && usage.monthly.count < limits.limit_for(class, WindowScope::Monthly)
    }

    fn near(count: u32, limit: u32, threshold: f64) -> bool {
        if limit == 0 {
            return true;
        }
        f64::from(count) / f64::from(limit) >= threshold
    }

    fn snapshot(data: &UsageData, class: ResourceClass, limits: &QuotaLimits) -> UsageSnapshot {
        let usage = data.class(class);
        let daily = ScopeSnapshot::new(usage.daily.count, limits.limit_for(class, WindowScope::Daily));
        let monthly = ScopeSnapshot::new(
            usage.monthly.count,
            limits.limit_for(class, WindowScope::Monthly),
        );
        let near_limit = Self::near(daily.count, daily.limit, limits.warning_threshold)
            || Self::near(monthly.count, monthly.limit, limits.warning_threshold);
        UsageSnapshot {
            class,
            near_limit,
            limit_reached: daily.remaining == 0 || monthly.remaining == 0,
            daily,
            monthly,
        }
    }
}

fn next_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or(now)
}
