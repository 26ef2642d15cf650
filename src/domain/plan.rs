use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Subscription tier a dealer pays for.
///
/// Price and listing quota are fixed per tier; nothing else in the crate should
/// hardcode either number.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Plan {
    Basic,
    Premium,
    Enterprise,
}

impl Plan {
    pub const ALL: [Plan; 3] = [Plan::Basic, Plan::Premium, Plan::Enterprise];

    /// Monthly price in whole rupees.
    pub fn amount(self) -> i64 {
        match self {
            Plan::Basic => 999,
            Plan::Premium => 1999,
            Plan::Enterprise => 4999,
        }
    }

    /// Maximum number of listings a dealer on this plan may hold.
    pub fn listing_quota(self) -> i32 {
        match self {
            Plan::Basic => 15,
            Plan::Premium => 50,
            Plan::Enterprise => 100,
        }
    }

    pub fn names() -> Vec<String> {
        Self::ALL.iter().map(|p| p.to_string()).collect()
    }
}

pub fn amount_for_plan(plan: Plan) -> i64 {
    plan.amount()
}

pub fn quota_for_plan(plan: Plan) -> i32 {
    plan.listing_quota()
}
