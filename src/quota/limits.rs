//! Quota Limits and Plan Catalog
//!
//! Effective limits come from the user's subscription plan; the free tier
//! is the fallback whenever no active subscription exists.

use serde::{Deserialize, Serialize};

use super::counter::{ResourceClass, WindowScope};

/// Fraction of a limit at which near-limit warnings start
pub const DEFAULT_WARNING_THRESHOLD: f64 = 0.8;

/// Resolved limit set for one user
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuotaLimits {
    /// Generations allowed per day
    pub daily_generation_limit: u32,

    /// Generations allowed per month
    pub monthly_generation_limit: u32,

    /// Downloads allowed per day
    pub daily_download_limit: u32,

    /// Downloads allowed per month
    pub monthly_download_limit: u32,

    /// Warning threshold as a fraction of the limit (0.0 to 1.0)
    pub warning_threshold: f64,
}

impl QuotaLimits {
    /// Limit for one resource class in one window scope
    pub fn limit_for(&self, class: ResourceClass, scope: WindowScope) -> u32 {
        match (class, scope) {
            (ResourceClass::Generation, WindowScope::Daily) => self.daily_generation_limit,
            (ResourceClass::Generation, WindowScope::Monthly) => self.monthly_generation_limit,
            (ResourceClass::Download, WindowScope::Daily) => self.daily_download_limit,
            (ResourceClass::Download, WindowScope::Monthly) => self.monthly_download_limit,
        }
    }
}

impl Default for QuotaLimits {
    fn default() -> Self {
        PlanId::Free.limits()
    }
}

/// Subscription plans offered by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanId {
    /// Free tier, the default for every user
    Free,
    /// Entry-level paid plan
    BasicMonthly,
    /// Professional plan
    ProMonthly,
    /// Highest-volume plan
    PremiumMonthly,
}

impl PlanId {
    /// Quota limits granted by this plan
    pub fn limits(&self) -> QuotaLimits {
        match self {
            PlanId::Free => QuotaLimits {
                daily_generation_limit: 100,
                monthly_generation_limit: 3000,
                daily_download_limit: 50,
                monthly_download_limit: 1000,
                warning_threshold: DEFAULT_WARNING_THRESHOLD,
            },
            PlanId::BasicMonthly => QuotaLimits {
                daily_generation_limit: 500,
                monthly_generation_limit: 15000,
                daily_download_limit: 250,
                monthly_download_limit: 5000,
                warning_threshold: DEFAULT_WARNING_THRESHOLD,
            },
            PlanId::ProMonthly => QuotaLimits {
                daily_generation_limit: 2000,
                monthly_generation_limit: 60000,
                daily_download_limit: 1000,
                monthly_download_limit: 20000,
                warning_threshold: DEFAULT_WARNING_THRESHOLD,
            },
            PlanId::PremiumMonthly => QuotaLimits {
                daily_generation_limit: 10000,
                monthly_generation_limit: 300000,
                daily_download_limit: 5000,
                monthly_download_limit: 100000,
                warning_threshold: DEFAULT_WARNING_THRESHOLD,
            },
        }
    }

    /// Human-readable plan name
    pub fn display_name(&self) -> &'static str {
        match self {
            PlanId::Free => "Free",
            PlanId::BasicMonthly => "Basic",
            PlanId::ProMonthly => "Pro",
            PlanId::PremiumMonthly => "Premium",
        }
    }

    /// Monthly price in cents; zero for the free tier
    pub fn monthly_price_cents(&self) -> u32 {
        match self {
            PlanId::Free => 0,
            PlanId::BasicMonthly => 990,
            PlanId::ProMonthly => 2990,
            PlanId::PremiumMonthly => 5990,
        }
    }
}
