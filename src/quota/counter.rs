//! Usage Counters and Window Keys
//!
//! Counters roll over when their window key (date or year-month) no longer
//! matches the key derived from the current time. Daily and monthly
//! windows roll independently; the daily counter's final value is kept in
//! a bounded history ring.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version tag for the persisted usage record
pub const USAGE_RECORD_VERSION: u32 = 1;

/// Name of the persisted usage record
pub const USAGE_RECORD: &str = "usage_tracker";

/// Maximum entries kept in the daily history ring
pub const HISTORY_CAPACITY: usize = 30;

/// Resource classes tracked against quotas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceClass {
    /// Remote image generations
    Generation,
    /// Image downloads
    Download,
}

impl std::fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceClass::Generation => write!(f, "generation"),
            ResourceClass::Download => write!(f, "download"),
        }
    }
}

/// Counter window scopes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowScope {
    /// Calendar day (UTC)
    Daily,
    /// Calendar month (UTC)
    Monthly,
}

impl std::fmt::Display for WindowScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowScope::Daily => write!(f, "daily"),
            WindowScope::Monthly => write!(f, "monthly"),
        }
    }
}

/// Window key for a calendar day, `YYYY-MM-DD`
pub fn daily_key(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}

/// Window key for a calendar month, `YYYY-MM`
pub fn monthly_key(at: DateTime<Utc>) -> String {
    at.format("%Y-%m").to_string()
}

/// One rolling counter window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageWindow {
    /// Operations counted in the current window
    pub count: u32,

    /// Key identifying the window the count belongs to
    pub window_key: String,

    /// When this window last started from zero
    pub last_reset: DateTime<Utc>,
}

impl UsageWindow {
    fn new(window_key: String, now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            window_key,
            last_reset: now,
        }
    }
}

/// Daily + monthly windows for one resource class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassUsage {
    pub daily: UsageWindow,
    pub monthly: UsageWindow,
}

impl ClassUsage {
    fn zero(now: DateTime<Utc>) -> Self {
        Self {
            daily: UsageWindow::new(daily_key(now), now),
            monthly: UsageWindow::new(monthly_key(now), now),
        }
    }
}

/// One finished day's usage, kept in the history ring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyUsageRecord {
    /// Resource class the count belongs to
    pub class: ResourceClass,

    /// The day that ended, `YYYY-MM-DD`
    pub window_key: String,

    /// Final count for that day
    pub count: u32,

    /// When the rollover happened
    pub recorded_at: DateTime<Utc>,
}

/// Persisted usage record for all tracked resource classes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageData {
    /// Record format version
    pub version: u32,

    /// Generation counters
    pub generation: ClassUsage,

    /// Download counters
    pub download: ClassUsage,

    /// Most-recent-first ring of finished days, bounded by
    /// [`HISTORY_CAPACITY`]
    pub history: Vec<DailyUsageRecord>,

    /// Timestamp of the last mutation
    pub last_updated: DateTime<Utc>,
}

impl UsageData {
    /// Fresh zero-usage record with windows anchored at `now`
    pub fn zero(now: DateTime<Utc>) -> Self {
        Self {
            version: USAGE_RECORD_VERSION,
            generation: ClassUsage::zero(now),
            download: ClassUsage::zero(now),
            history: Vec::new(),
            last_updated: now,
        }
    }

    /// Counters for one resource class
    pub fn class(&self, class: ResourceClass) -> &ClassUsage {
        match class {
            ResourceClass::Generation => &self.generation,
            ResourceClass::Download => &self.download,
        }
    }

    /// Mutable counters for one resource class
    pub fn class_mut(&mut self, class: ResourceClass) -> &mut ClassUsage {
        match class {
            ResourceClass::Generation => &mut self.generation,
            ResourceClass::Download => &mut self.download,
        }
    }

    /// Roll any window whose key no longer matches `now`.
    ///
    /// Daily and monthly windows roll independently; a finished day's
    /// count moves into the history ring before the daily counter resets.
    /// Idempotent within a window: a second call with the same `now`
    /// changes nothing. Returns whether any window rolled.
    pub fn roll_over(&mut self, now: DateTime<Utc>) -> bool {
        let today = daily_key(now);
        let this_month = monthly_key(now);
        let mut rolled = false;

        for class in [ResourceClass::Generation, ResourceClass::Download] {
            let usage = self.class(class).clone();

            if usage.daily.window_key != today {
                if usage.daily.count > 0 {
                    self.history.insert(
                        0,
                        DailyUsageRecord {
                            class,
                            window_key: usage.daily.window_key.clone(),
                            count: usage.daily.count,
                            recorded_at: now,
                        },
                    );
                    self.history.truncate(HISTORY_CAPACITY);
                }
                self.class_mut(class).daily = UsageWindow::new(today.clone(), now);
                rolled = true;
            }

            if usage.monthly.window_key != this_month {
                self.class_mut(class).monthly = UsageWindow::new(this_month.clone(), now);
                rolled = true;
            }
        }

        if rolled {
            self.last_updated = now;
        }
        rolled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 10, 30, 0).unwrap()
    }

    #[test]
    fn test_window_keys() {
        let t = at(2025, 3, 7);
        assert_eq!(daily_key(t), "2025-03-07");
        assert_eq!(monthly_key(t), "2025-03");
    }

    #[test]
    fn test_zero_data_anchored_at_now() {
        let now = at(2025, 3, 7);
        let data = UsageData::zero(now);
        assert_eq!(data.generation.daily.count, 0);
        assert_eq!(data.generation.daily.window_key, "2025-03-07");
        assert_eq!(data.download.monthly.window_key, "2025-03");
        assert!(data.history.is_empty());
    }

    #[test]
    fn test_rollover_same_window_is_noop() {
        let now = at(2025, 3, 7);
        let mut data = UsageData::zero(now);
        data.generation.daily.count = 5;

        let before = data.clone();
        assert!(!data.roll_over(now + Duration::hours(3)));
        assert_eq!(data, before);
    }

    #[test]
    fn test_daily_rollover_moves_count_to_history() {
        let day1 = at(2025, 3, 7);
        let mut data = UsageData::zero(day1);
        data.generation.daily.count = 12;
        data.generation.monthly.count = 12;

        let day2 = at(2025, 3, 8);
        assert!(data.roll_over(day2));

        assert_eq!(data.generation.daily.count, 0);
        assert_eq!(data.generation.daily.window_key, "2025-03-08");
        // Monthly counter untouched by a daily rollover
        assert_eq!(data.generation.monthly.count, 12);

        assert_eq!(data.history.len(), 1);
        assert_eq!(data.history[0].count, 12);
        assert_eq!(data.history[0].window_key, "2025-03-07");
    }

    #[test]
    fn test_rollover_is_idempotent_within_window() {
        let day1 = at(2025, 3, 7);
        let mut data = UsageData::zero(day1);
        data.generation.daily.count = 4;

        let day2 = at(2025, 3, 8);
        assert!(data.roll_over(day2));
        let after_first = data.clone();

        // Second trigger inside the same real window changes nothing
        assert!(!data.roll_over(day2 + Duration::minutes(5)));
        assert_eq!(data, after_first);
    }

    #[test]
    fn test_month_rollover_resets_monthly_only_counters() {
        let march = at(2025, 3, 31);
        let mut data = UsageData::zero(march);
        data.download.monthly.count = 900;
        data.download.daily.count = 3;

        let april = at(2025, 4, 1);
        assert!(data.roll_over(april));

        // Both windows rolled here because the date changed too, but the
        // monthly reset must not depend on the daily one.
        assert_eq!(data.download.monthly.count, 0);
        assert_eq!(data.download.monthly.window_key, "2025-04");
        assert_eq!(data.download.daily.window_key, "2025-04-01");
    }

    #[test]
    fn test_zero_count_days_skip_history() {
        let day1 = at(2025, 3, 7);
        let mut data = UsageData::zero(day1);

        assert!(data.roll_over(at(2025, 3, 8)));
        assert!(data.history.is_empty());
    }

    #[test]
    fn test_history_ring_is_bounded() {
        let mut day = at(2025, 1, 1);
        let mut data = UsageData::zero(day);

        for _ in 0..40 {
            data.generation.daily.count = 1;
            day = day + Duration::days(1);
            data.roll_over(day);
        }

        assert_eq!(data.history.len(), HISTORY_CAPACITY);
        // Most recent first
        assert!(data.history[0].window_key > data.history[29].window_key);
    }
}
