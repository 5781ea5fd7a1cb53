//! Subscription Record
//!
//! The persisted view of the user's current plan. The quota subsystem only
//! reads this (and downgrades it when expired); checkout and payment flows
//! live outside this crate and write the record through their own path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::limits::PlanId;

/// Version tag for the persisted subscription record
pub const SUBSCRIPTION_RECORD_VERSION: u32 = 1;

/// Name of the persisted subscription record
pub const SUBSCRIPTION_RECORD: &str = "subscription";

/// Lifecycle state of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Paid up (or free tier)
    Active,
    /// Cancelled by the user; lapses at `expires_at`
    Cancelled,
    /// Renewal payment failed
    PastDue,
}

/// The user's subscription as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    /// Record format version
    pub version: u32,

    /// Current plan
    pub plan: PlanId,

    /// Lifecycle status
    pub status: SubscriptionStatus,

    /// Provider-side subscription id, absent for the free tier
    pub subscription_id: Option<String>,

    /// When the subscription started
    pub started_at: Option<DateTime<Utc>>,

    /// When it lapses; `None` means it does not expire (free tier)
    pub expires_at: Option<DateTime<Utc>>,
}

impl Subscription {
    /// The default free-tier subscription
    pub fn free() -> Self {
        Self {
            version: SUBSCRIPTION_RECORD_VERSION,
            plan: PlanId::Free,
            status: SubscriptionStatus::Active,
            subscription_id: None,
            started_at: None,
            expires_at: None,
        }
    }

    /// Whether the subscription currently grants its plan's limits
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && !self.is_expired(now)
    }

    /// Whether `expires_at` has passed
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now,
            None => false,
        }
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::free()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_free_subscription_never_expires() {
        let sub = Subscription::free();
        assert!(sub.is_active(now()));
        assert!(!sub.is_expired(now() + Duration::days(10000)));
    }

    #[test]
    fn test_future_expiry_is_active() {
        let sub = Subscription {
            plan: PlanId::ProMonthly,
            subscription_id: Some("sub_123".to_string()),
            started_at: Some(now() - Duration::days(10)),
            expires_at: Some(now() + Duration::days(20)),
            ..Subscription::free()
        };
        assert!(sub.is_active(now()));
    }

    #[test]
    fn test_past_expiry_is_inactive() {
        let sub = Subscription {
            plan: PlanId::BasicMonthly,
            expires_at: Some(now() - Duration::seconds(1)),
            ..Subscription::free()
        };
        assert!(sub.is_expired(now()));
        assert!(!sub.is_active(now()));
    }

    #[test]
    fn test_non_active_status_is_inactive() {
        let sub = Subscription {
            plan: PlanId::BasicMonthly,
            status: SubscriptionStatus::PastDue,
            expires_at: Some(now() + Duration::days(5)),
            ..Subscription::free()
        };
        assert!(!sub.is_active(now()));
    }
}
