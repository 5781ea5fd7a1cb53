//! Usage Quota Subsystem
//!
//! Rolling daily/monthly usage counters for generation and download
//! operations, with limits resolved from the user's subscription plan.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Usage Tracker                         │
//! │   check_limit / track / is_near_limit / usage / summary     │
//! ├───────────────────────────┬─────────────────────────────────┤
//! │      Limit Resolver       │        Usage Counters           │
//! │  subscription → limits,   │  daily + monthly windows per    │
//! │  expiry downgrade         │  class, rollover, history ring  │
//! ├───────────────────────────┴─────────────────────────────────┤
//! │            Record Store (versioned JSON records)            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod counter;
pub mod limits;
pub mod resolver;
pub mod subscription;
pub mod tracker;

// Property-based tests module
#[cfg(test)]
mod proptests;

pub use counter::{
    DailyUsageRecord, ResourceClass, UsageData, UsageWindow, WindowScope, USAGE_RECORD,
};
pub use limits::{PlanId, QuotaLimits, DEFAULT_WARNING_THRESHOLD};
pub use resolver::{FixedLimits, LimitResolver, LimitSource};
pub use subscription::{Subscription, SubscriptionStatus, SUBSCRIPTION_RECORD};
pub use tracker::{ScopeSnapshot, UsageSnapshot, UsageSummary, UsageTracker};
