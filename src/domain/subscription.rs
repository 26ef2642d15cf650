use super::plan::{quota_for_plan, Plan};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Inactive,
    Expired,
    Cancelled,
}

/// A dealer's plan record.
///
/// `plan` and `listing_limit` always move together: the only ways to set them are
/// [`Subscription::provision`] and [`Subscription::change_plan`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub listing_limit: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn provision(user_id: Uuid, plan: Plan, today: NaiveDate, days: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            plan,
            status: SubscriptionStatus::Active,
            listing_limit: quota_for_plan(plan),
            start_date: today,
            end_date: add_days(today, days),
            created_at: now,
            updated_at: now,
        }
    }

    /// Active means the stored status says so and the end date has not passed.
    pub fn is_active(&self, today: NaiveDate) -> bool {
        self.status == SubscriptionStatus::Active && self.end_date >= today
    }

    /// Looks only at the end date, so a stale `active` row still reports expired.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.end_date < today
    }

    pub fn remaining_days(&self, today: NaiveDate) -> i64 {
        (self.end_date - today).num_days().max(0)
    }

    /// Pushes the end date out from the current end date, not from today.
    pub fn extend(mut self, days: u32) -> Self {
        self.end_date = add_days(self.end_date, days);
        self.touch()
    }

    pub fn change_plan(mut self, plan: Plan) -> Self {
        self.plan = plan;
        self.listing_limit = quota_for_plan(plan);
        self.touch()
    }

    pub fn activate(self) -> Self {
        self.with_status(SubscriptionStatus::Active)
    }

    pub fn deactivate(self) -> Self {
        self.with_status(SubscriptionStatus::Inactive)
    }

    pub fn cancel(self) -> Self {
        self.with_status(SubscriptionStatus::Cancelled)
    }

    pub fn mark_expired(self) -> Self {
        self.with_status(SubscriptionStatus::Expired)
    }

    /// Stored as active but already past its end date.
    pub fn is_lapsed(&self, today: NaiveDate) -> bool {
        self.status == SubscriptionStatus::Active && self.is_expired(today)
    }

    fn with_status(mut self, status: SubscriptionStatus) -> Self {
        self.status = status;
        self.touch()
    }

    fn touch(mut self) -> Self {
        self.updated_at = Utc::now();
        self
    }
}

fn add_days(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX)
}

/// Listings the dealer may still create; zero unless the subscription is active.
pub fn remaining_listings(subscription: Option<&Subscription>, used: i64, today: NaiveDate) -> i64 {
    match subscription {
        Some(sub) if sub.is_active(today) => (i64::from(sub.listing_limit) - used).max(0),
        _ => 0,
    }
}

/// Sum of plan prices over subscriptions whose stored status is active.
pub fn monthly_revenue(subscriptions: &[Subscription]) -> i64 {
    subscriptions
        .iter()
        .filter(|s| s.status == SubscriptionStatus::Active)
        .map(|s| s.plan.amount())
        .sum()
}
