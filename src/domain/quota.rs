use super::listing::{CarListing, ListingStatus};
use super::plan::quota_for_plan;
use super::subscription::Subscription;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// How the listing quota is derived when the subscription row is missing or stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaPolicy {
    /// Limit used when a dealer has no subscription. `0` denies every submission.
    pub fallback_limit: i32,
    /// Rejected listings keep counting against the limit when set.
    pub count_rejected: bool,
    /// An inactive or expired subscription grants nothing when set.
    pub require_active: bool,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            fallback_limit: 0,
            count_rejected: true,
            require_active: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub limit: i64,
    pub used: i64,
}

impl QuotaDecision {
    pub fn remaining(&self) -> i64 {
        (self.limit - self.used).max(0)
    }
}

impl QuotaPolicy {
    pub fn limit_for(&self, subscription: Option<&Subscription>, today: NaiveDate) -> i64 {
        match subscription {
            Some(sub) if self.require_active && !sub.is_active(today) => 0,
            Some(sub) => i64::from(quota_for_plan(sub.plan)),
            None => i64::from(self.fallback_limit.max(0)),
        }
    }

    /// Number of a dealer's listings that count against the quota.
    pub fn count_used(&self, listings: &[CarListing]) -> i64 {
        listings
            .iter()
            .filter(|l| self.count_rejected || l.status != ListingStatus::Rejected)
            .count() as i64
    }

    pub fn can_submit(
        &self,
        current_listing_count: i64,
        subscription: Option<&Subscription>,
        today: NaiveDate,
    ) -> QuotaDecision {
        let limit = self.limit_for(subscription, today);
        let used = current_listing_count.max(0);
        QuotaDecision {
            allowed: used < limit,
            limit,
            used,
        }
    }
}

/// Gate with the default policy.
pub fn can_submit(
    current_listing_count: i64,
    subscription: Option<&Subscription>,
    today: NaiveDate,
) -> QuotaDecision {
    QuotaPolicy::default().can_submit(current_listing_count, subscription, today)
}
