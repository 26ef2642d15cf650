use crate::domain::{
    can_access_user, can_administer, monthly_revenue, Actor, Dealer, DealerProfileUpdate,
    FieldErrors, ListingStatus, Plan, Role, Subscription, SubscriptionStatus, User, UserStatus,
};
use crate::infrastructure::{
    ListingRepository, RepositoryError, Session, SessionError, SessionGateway,
    SubscriptionRepository, UserRepository,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
    #[error("Registration is invalid")]
    Validation(FieldErrors),
    #[error("User not found: {0}")]
    NotFound(Uuid),
    #[error("Not allowed: {0}")]
    Unauthorized(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

impl Registration {
    fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if self.name.trim().is_empty() {
            errors.insert("name".into(), "Name is required".into());
        }
        if !validator::validate_email(self.email.trim()) {
            errors.insert("email".into(), "Enter a valid email".into());
        }
        if self.phone.trim().is_empty() {
            errors.insert("phone".into(), "Phone number is required".into());
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            errors.insert(
                "password".into(),
                format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
            );
        }
        errors
    }
}

/// Admin dashboard counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_dealers: i64,
    pub active_dealers: i64,
    pub pending_dealers: i64,
    pub total_listings: i64,
    pub pending_listings: i64,
    pub active_subscriptions: i64,
    pub monthly_revenue: i64,
}

/// Subscription handed to a dealer when an admin approves them.
#[derive(Debug, Clone, Copy)]
pub struct DefaultSubscription {
    pub plan: Plan,
    pub days: u32,
}

impl Default for DefaultSubscription {
    fn default() -> Self {
        Self {
            plan: Plan::Basic,
            days: 30,
        }
    }
}

pub struct AccountService<U, S, L, G>
where
    U: UserRepository,
    S: SubscriptionRepository,
    L: ListingRepository,
    G: SessionGateway,
{
    user_repo: Arc<U>,
    subscription_repo: Arc<S>,
    listing_repo: Arc<L>,
    sessions: Arc<G>,
    default_subscription: DefaultSubscription,
}

impl<U, S, L, G> AccountService<U, S, L, G>
where
    U: UserRepository,
    S: SubscriptionRepository,
    L: ListingRepository,
    G: SessionGateway,
{
    pub fn new(
        user_repo: Arc<U>,
        subscription_repo: Arc<S>,
        listing_repo: Arc<L>,
        sessions: Arc<G>,
        default_subscription: DefaultSubscription,
    ) -> Self {
        Self {
            user_repo,
            subscription_repo,
            listing_repo,
            sessions,
            default_subscription,
        }
    }

    fn require_admin(actor: &Actor) -> Result<(), AccountError> {
        if !can_administer(actor) {
            return Err(AccountError::Unauthorized("admin only".to_string()));
        }
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<User, AccountError> {
        match self.user_repo.get_by_id(id).await {
            Ok(user) => Ok(user),
            Err(RepositoryError::NotFound(_)) => Err(AccountError::NotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn load_dealer(&self, id: Uuid) -> Result<User, AccountError> {
        let user = self.load(id).await?;
        if user.role != Role::Dealer {
            return Err(AccountError::NotFound(id));
        }
        Ok(user)
    }

    /// Public sign-up. The account waits in `pending` until an admin reviews it.
    pub async fn register(&self, registration: Registration) -> Result<User, AccountError> {
        let errors = registration.validate();
        if !errors.is_empty() {
            return Err(AccountError::Validation(errors));
        }

        let user = User::register(
            registration.name.trim().to_string(),
            registration.email.trim().to_lowercase(),
            registration.phone.trim().to_string(),
        );
        self.sessions.sign_up(&user, &registration.password).await?;
        info!(user_id = %user.id, "Dealer registered, awaiting approval");
        Ok(user)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AccountError> {
        Ok(self.sessions.sign_in(email.trim(), password).await?)
    }

    pub async fn current_user(&self, token: &str) -> Result<Option<User>, AccountError> {
        Ok(self.sessions.current_user(token).await?)
    }

    pub async fn sign_out(&self, token: &str) -> Result<(), AccountError> {
        Ok(self.sessions.sign_out(token).await?)
    }

    pub async fn purge_expired_sessions(&self) -> Result<u64, AccountError> {
        let purged = self.sessions.purge_expired().await?;
        if purged > 0 {
            info!(count = purged, "Purged expired sessions");
        }
        Ok(purged)
    }

    pub async fn pending_users(&self, actor: &Actor) -> Result<Vec<User>, AccountError> {
        Self::require_admin(actor)?;
        Ok(self.user_repo.list_by_status(UserStatus::Pending).await?)
    }

    /// Activates the dealer and provisions the default subscription unless they hold a
    /// non-cancelled one.
    pub async fn approve_user(&self, actor: &Actor, user_id: Uuid) -> Result<Dealer, AccountError> {
        Self::require_admin(actor)?;
        let mut user = self.load_dealer(user_id).await?;
        if user.status == UserStatus::Active {
            return Err(AccountError::InvalidState(format!(
                "user {} is already active",
                user_id
            )));
        }

        self.user_repo
            .update_status(user_id, UserStatus::Active)
            .await?;
        user.status = UserStatus::Active;
        user.updated_at = Utc::now();

        let subscription = match self.subscription_repo.get_for_user(user_id).await? {
            Some(existing) if existing.status != SubscriptionStatus::Cancelled => existing,
            _ => {
                let DefaultSubscription { plan, days } = self.default_subscription;
                let sub = Subscription::provision(user_id, plan, Utc::now().date_naive(), days);
                self.subscription_repo.create(&sub).await?;
                info!(user_id = %user_id, plan = %plan, days, "Provisioned default subscription");
                sub
            }
        };

        info!(user_id = %user_id, admin_id = %actor.id, "Dealer approved");
        Ok(Dealer {
            user,
            subscription: Some(subscription),
        })
    }

    pub async fn reject_user(&self, actor: &Actor, user_id: Uuid) -> Result<User, AccountError> {
        Self::require_admin(actor)?;
        let mut user = self.load_dealer(user_id).await?;

        self.user_repo
            .update_status(user_id, UserStatus::Inactive)
            .await?;
        user.status = UserStatus::Inactive;
        user.updated_at = Utc::now();

        info!(user_id = %user_id, admin_id = %actor.id, "Dealer rejected");
        Ok(user)
    }

    pub async fn list_dealers(&self, actor: &Actor) -> Result<Vec<Dealer>, AccountError> {
        Self::require_admin(actor)?;
        let users = self.user_repo.list_by_role(Role::Dealer).await?;

        // list() is newest first, so the first row per user is their current one
        let mut by_user: HashMap<Uuid, Subscription> = HashMap::new();
        for sub in self.subscription_repo.list().await? {
            by_user.entry(sub.user_id).or_insert(sub);
        }

        Ok(users
            .into_iter()
            .map(|user| {
                let subscription = by_user.remove(&user.id);
                Dealer { user, subscription }
            })
            .collect())
    }

    /// Admin, or the dealer looking at themself.
    pub async fn get_dealer(&self, actor: &Actor, user_id: Uuid) -> Result<Dealer, AccountError> {
        if !can_access_user(actor, user_id) {
            return Err(AccountError::Unauthorized(
                "cannot view another dealer".to_string(),
            ));
        }
        let user = self.load_dealer(user_id).await?;
        let subscription = self.subscription_repo.get_for_user(user_id).await?;
        Ok(Dealer { user, subscription })
    }

    pub async fn update_dealer_profile(
        &self,
        actor: &Actor,
        user_id: Uuid,
        update: DealerProfileUpdate,
    ) -> Result<User, AccountError> {
        if !can_access_user(actor, user_id) {
            return Err(AccountError::Unauthorized(
                "cannot edit another dealer".to_string(),
            ));
        }
        if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            let mut errors = FieldErrors::new();
            errors.insert("name".into(), "Name is required".into());
            return Err(AccountError::Validation(errors));
        }

        let user = update.apply(self.load_dealer(user_id).await?);
        self.user_repo.update(&user).await?;
        info!(user_id = %user_id, actor_id = %actor.id, "Dealer profile updated");
        Ok(user)
    }

    pub async fn delete_dealer(&self, actor: &Actor, user_id: Uuid) -> Result<(), AccountError> {
        Self::require_admin(actor)?;
        self.load_dealer(user_id).await?;
        self.user_repo.delete(user_id).await?;
        info!(user_id = %user_id, admin_id = %actor.id, "Dealer deleted");
        Ok(())
    }

    pub async fn dashboard(&self, actor: &Actor) -> Result<DashboardStats, AccountError> {
        Self::require_admin(actor)?;

        let dealers = self.user_repo.list_by_role(Role::Dealer).await?;
        let listings = self.listing_repo.list().await?;
        // Stored `active` rows past their end date are lapsed even before the sweep runs.
        let today = Utc::now().date_naive();
        let current: Vec<Subscription> = self
            .subscription_repo
            .list()
            .await?
            .into_iter()
            .filter(|s| s.is_active(today))
            .collect();

        let count_dealers =
            |status: UserStatus| dealers.iter().filter(|d| d.status == status).count() as i64;

        Ok(DashboardStats {
            total_dealers: dealers.len() as i64,
            active_dealers: count_dealers(UserStatus::Active),
            pending_dealers: count_dealers(UserStatus::Pending),
            total_listings: listings.len() as i64,
            pending_listings: listings
                .iter()
                .filter(|l| l.status == ListingStatus::Pending)
                .count() as i64,
            active_subscriptions: current.len() as i64,
            monthly_revenue: monthly_revenue(&current),
        })
    }
}
