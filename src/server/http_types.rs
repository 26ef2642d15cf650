use crate::domain::{
    DealerProfileUpdate, ListingFilters, ListingStatus, QuotaDecision, Subscription, User,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Serialize, ToSchema)]
pub(super) struct HealthResponse {
    pub(super) status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) error: Option<String>,
}

#[derive(Deserialize, Validate, ToSchema)]
pub(super) struct RegisterRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    #[schema(example = "Asha Patil")]
    pub(super) name: String,
    #[validate(email(message = "Enter a valid email"))]
    #[schema(example = "asha@example.com")]
    pub(super) email: String,
    #[validate(length(min = 1, message = "Phone number is required"))]
    #[schema(example = "9960456992")]
    pub(super) phone: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub(super) password: String,
}

#[derive(Deserialize, Validate, ToSchema)]
pub(super) struct SignInRequest {
    #[validate(email(message = "Enter a valid email"))]
    pub(super) email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub(super) password: String,
}

#[derive(Serialize, ToSchema)]
pub(super) struct UserResponse {
    pub(super) id: Uuid,
    pub(super) name: String,
    pub(super) email: String,
    pub(super) phone: String,
    #[schema(example = "dealer")]
    pub(super) role: String,
    #[schema(example = "pending")]
    pub(super) status: String,
    pub(super) company_name: Option<String>,
    pub(super) address: Option<String>,
    pub(super) created_at: chrono::DateTime<chrono::Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone,
            role: user.role.to_string(),
            status: user.status.to_string(),
            company_name: user.company_name,
            address: user.address,
            created_at: user.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub(super) struct SessionResponse {
    pub(super) token: String,
    pub(super) user: UserResponse,
}

#[derive(Serialize, ToSchema)]
pub(super) struct SubscriptionResponse {
    pub(super) id: Uuid,
    pub(super) user_id: Uuid,
    #[schema(example = "basic")]
    pub(super) plan: String,
    #[schema(example = "active")]
    pub(super) status: String,
    pub(super) listing_limit: i32,
    /// Plan price, derived from the plan.
    pub(super) amount: i64,
    pub(super) start_date: chrono::NaiveDate,
    pub(super) end_date: chrono::NaiveDate,
    pub(super) remaining_days: i64,
    pub(super) is_active: bool,
}

impl SubscriptionResponse {
    pub(super) fn new(sub: Subscription, today: chrono::NaiveDate) -> Self {
        Self {
            id: sub.id,
            user_id: sub.user_id,
            plan: sub.plan.to_string(),
            status: sub.status.to_string(),
            listing_limit: sub.listing_limit,
            amount: sub.plan.amount(),
            start_date: sub.start_date,
            end_date: sub.end_date,
            remaining_days: sub.remaining_days(today),
            is_active: sub.is_active(today),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub(super) struct QuotaResponse {
    pub(super) allowed: bool,
    pub(super) limit: i64,
    pub(super) used: i64,
    pub(super) remaining: i64,
}

impl From<QuotaDecision> for QuotaResponse {
    fn from(d: QuotaDecision) -> Self {
        Self {
            allowed: d.allowed,
            limit: d.limit,
            used: d.used,
            remaining: d.remaining(),
        }
    }
}

/// List screen query: scope plus the search form.
#[derive(Deserialize, Debug, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub(super) struct ListingQuery {
    /// `marketplace` (default), `mine` or `all`
    pub(super) scope: Option<String>,
    pub(super) rto: Option<String>,
    pub(super) color: Option<String>,
    pub(super) brand: Option<String>,
    pub(super) fuel_type: Option<String>,
    pub(super) transmission_type: Option<String>,
    pub(super) min_price: Option<String>,
    pub(super) max_price: Option<String>,
    /// `pending`, `approved` or `rejected`
    pub(super) status: Option<String>,
}

impl ListingQuery {
    pub(super) fn filters(&self, status: Option<ListingStatus>) -> ListingFilters {
        let text = |v: &Option<String>| v.as_deref().unwrap_or_default().trim().to_string();
        ListingFilters {
            rto: text(&self.rto),
            color: text(&self.color),
            brand: text(&self.brand),
            fuel_type: text(&self.fuel_type),
            transmission_type: text(&self.transmission_type),
            min_price: text(&self.min_price),
            max_price: text(&self.max_price),
            status,
        }
    }
}

#[derive(Deserialize, Debug, IntoParams)]
#[into_params(parameter_in = Query)]
pub(super) struct ScopeQuery {
    pub(super) scope: Option<String>,
}

#[derive(Deserialize, Debug, IntoParams)]
#[into_params(parameter_in = Query)]
pub(super) struct ImageUploadQuery {
    #[param(example = "1718000000000-0.jpg")]
    pub(super) file_name: String,
}

#[derive(Deserialize, Validate, ToSchema)]
pub(super) struct AssignSubscriptionRequest {
    pub(super) user_id: Uuid,
    #[schema(example = "premium")]
    pub(super) plan: String,
    #[validate(range(min = 1, max = 3650, message = "Days must be between 1 and 3650"))]
    #[schema(example = 30)]
    pub(super) days: u32,
}

#[derive(Deserialize, Validate, ToSchema)]
pub(super) struct ExtendSubscriptionRequest {
    #[validate(range(min = 1, max = 3650, message = "Days must be between 1 and 3650"))]
    #[schema(example = 30)]
    pub(super) days: u32,
}

#[derive(Deserialize, ToSchema)]
pub(super) struct ChangePlanRequest {
    #[schema(example = "enterprise")]
    pub(super) plan: String,
}

#[derive(Deserialize, Validate, ToSchema)]
pub(super) struct DealerProfileRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub(super) name: Option<String>,
    #[validate(length(min = 1, message = "Phone number is required"))]
    pub(super) phone: Option<String>,
    pub(super) company_name: Option<String>,
    pub(super) address: Option<String>,
}

impl From<DealerProfileRequest> for DealerProfileUpdate {
    fn from(req: DealerProfileRequest) -> Self {
        Self {
            name: req.name,
            phone: req.phone,
            company_name: req.company_name,
            address: req.address,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub(super) struct RouteResponse {
    #[schema(example = "allow")]
    pub(super) decision: String,
}
