//! Property-Based Tests for the Quota Subsystem
//!
//! Verifies counter invariants over random operation sequences:
//!
//! - Admitted operations never exceed the configured limit
//! - Counters never go negative (they are unsigned, so the interesting
//!   property is that blocked calls leave them untouched)
//! - Rollover is idempotent regardless of how often checks run

use proptest::prelude::*;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use crate::clock::ManualClock;
use crate::quota::counter::{ResourceClass, UsageData};
use crate::quota::limits::QuotaLimits;
use crate::quota::resolver::FixedLimits;
use crate::quota::tracker::UsageTracker;
use crate::storage::MemoryStore;

fn small_limits(daily: u32, monthly: u32) -> QuotaLimits {
    QuotaLimits {
        daily_generation_limit: daily,
        monthly_generation_limit: monthly,
        daily_download_limit: daily,
        monthly_download_limit: monthly,
        warning_threshold: 0.8,
    }
}

proptest! {
    #[test]
    fn prop_admitted_count_is_min_of_calls_and_limit(
        calls in 0u32..40,
        daily in 1u32..20,
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        rt.block_on(async move {
            let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 15, 9, 0, 0).unwrap());
            let tracker = UsageTracker::new(
                Arc::new(clock),
                Arc::new(MemoryStore::new()),
                Arc::new(FixedLimits::new(small_limits(daily, 10_000))),
            );

            let mut admitted = 0u32;
            for _ in 0..calls {
                if tracker.track(ResourceClass::Generation).await {
                    admitted += 1;
                }
            }

            prop_assert_eq!(admitted, calls.min(daily));
            let usage = tracker.usage(ResourceClass::Generation).await;
            prop_assert_eq!(usage.daily.count, calls.min(daily));
            prop_assert!(usage.daily.count <= daily);
            Ok(())
        })?;
    }

    #[test]
    fn prop_interleaved_classes_stay_independent(
        ops in prop::collection::vec(any::<bool>(), 0..60),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        rt.block_on(async move {
            let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 15, 9, 0, 0).unwrap());
            let tracker = UsageTracker::new(
                Arc::new(clock),
                Arc::new(MemoryStore::new()),
                Arc::new(FixedLimits::new(small_limits(10, 10_000))),
            );

            let mut gen_expected = 0u32;
            let mut dl_expected = 0u32;
            for &is_generation in &ops {
                let class = if is_generation {
                    ResourceClass::Generation
                } else {
                    ResourceClass::Download
                };
                let admitted = tracker.track(class).await;
                let expected = if is_generation { &mut gen_expected } else { &mut dl_expected };
                if *expected < 10 {
                    prop_assert!(admitted);
                    *expected += 1;
                } else {
                    prop_assert!(!admitted);
                }
            }

            prop_assert_eq!(tracker.usage(ResourceClass::Generation).await.daily.count, gen_expected);
            prop_assert_eq!(tracker.usage(ResourceClass::Download).await.daily.count, dl_expected);
            Ok(())
        })?;
    }

    #[test]
    fn prop_rollover_idempotent_for_any_hour_offset(
        count in 0u32..30,
        hours in 0i64..72,
    ) {
        let start = Utc.with_ymd_and_hms(2025, 3, 30, 12, 0, 0).unwrap();
        let mut data = UsageData::zero(start);
        data.generation.daily.count = count;
        data.generation.monthly.count = count;

        let later = start + Duration::hours(hours);
        data.roll_over(later);
        let after_first = data.clone();

        // Running the check again at the same instant must change nothing
        data.roll_over(later);
        prop_assert_eq!(data, after_first);
    }
}
