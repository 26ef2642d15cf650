use crate::domain::{
    can_access_user, can_administer, Actor, Plan, Role, Subscription, SubscriptionStatus,
};
use crate::infrastructure::{RepositoryError, SubscriptionRepository, UserRepository};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum SubscriptionError {
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("Subscription not found: {0}")]
    NotFound(Uuid),
    #[error("Not allowed: {0}")]
    Unauthorized(String),
    #[error("User {0} already has a subscription")]
    AlreadySubscribed(Uuid),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub struct SubscriptionService<S, U>
where
    S: SubscriptionRepository,
    U: UserRepository,
{
    subscription_repo: Arc<S>,
    user_repo: Arc<U>,
}

impl<S, U> SubscriptionService<S, U>
where
    S: SubscriptionRepository,
    U: UserRepository,
{
    pub fn new(subscription_repo: Arc<S>, user_repo: Arc<U>) -> Self {
        Self {
            subscription_repo,
            user_repo,
        }
    }

    fn require_admin(actor: &Actor) -> Result<(), SubscriptionError> {
        if !can_administer(actor) {
            return Err(SubscriptionError::Unauthorized(
                "subscriptions are managed by admins".to_string(),
            ));
        }
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Subscription, SubscriptionError> {
        match self.subscription_repo.get_by_id(id).await {
            Ok(sub) => Ok(sub),
            Err(RepositoryError::NotFound(_)) => Err(SubscriptionError::NotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list(&self, actor: &Actor) -> Result<Vec<Subscription>, SubscriptionError> {
        Self::require_admin(actor)?;
        Ok(self.subscription_repo.list().await?)
    }

    /// Admins may read anyone's subscription; dealers only their own.
    pub async fn for_user(
        &self,
        actor: &Actor,
        user_id: Uuid,
    ) -> Result<Option<Subscription>, SubscriptionError> {
        if !can_access_user(actor, user_id) {
            return Err(SubscriptionError::Unauthorized(
                "cannot read another dealer's subscription".to_string(),
            ));
        }
        Ok(self.subscription_repo.get_for_user(user_id).await?)
    }

    pub async fn assign(
        &self,
        actor: &Actor,
        user_id: Uuid,
        plan: Plan,
        days: u32,
    ) -> Result<Subscription, SubscriptionError> {
        Self::require_admin(actor)?;
        if days == 0 {
            return Err(SubscriptionError::InvalidInput(
                "duration must be at least one day".to_string(),
            ));
        }

        let user = self.user_repo.get_by_id(user_id).await?;
        if user.role != Role::Dealer {
            return Err(SubscriptionError::InvalidInput(format!(
                "user {} is not a dealer",
                user_id
            )));
        }
        if let Some(existing) = self.subscription_repo.get_for_user(user_id).await? {
            if existing.status != SubscriptionStatus::Cancelled {
                return Err(SubscriptionError::AlreadySubscribed(user_id));
            }
        }

        let subscription = Subscription::provision(user_id, plan, Utc::now().date_naive(), days);
        self.subscription_repo.create(&subscription).await?;
        info!(
            subscription_id = %subscription.id,
            user_id = %user_id,
            plan = %plan,
            "Subscription assigned"
        );
        Ok(subscription)
    }

    pub async fn activate(&self, actor: &Actor, id: Uuid) -> Result<Subscription, SubscriptionError> {
        self.modify(actor, id, "activated", Subscription::activate).await
    }

    pub async fn deactivate(&self, actor: &Actor, id: Uuid) -> Result<Subscription, SubscriptionError> {
        self.modify(actor, id, "deactivated", Subscription::deactivate).await
    }

    /// Soft cancel; the record is kept.
    pub async fn cancel(&self, actor: &Actor, id: Uuid) -> Result<Subscription, SubscriptionError> {
        self.modify(actor, id, "cancelled", Subscription::cancel).await
    }

    pub async fn extend(
        &self,
        actor: &Actor,
        id: Uuid,
        days: u32,
    ) -> Result<Subscription, SubscriptionError> {
        if days == 0 {
            return Err(SubscriptionError::InvalidInput(
                "extension must be at least one day".to_string(),
            ));
        }
        self.modify(actor, id, "extended", |s| s.extend(days)).await
    }

    pub async fn change_plan(
        &self,
        actor: &Actor,
        id: Uuid,
        plan: Plan,
    ) -> Result<Subscription, SubscriptionError> {
        self.modify(actor, id, "plan changed", |s| s.change_plan(plan))
            .await
    }

    /// Applies one domain mutation and writes the whole record back.
    async fn modify<F>(
        &self,
        actor: &Actor,
        id: Uuid,
        action: &str,
        mutate: F,
    ) -> Result<Subscription, SubscriptionError>
    where
        F: FnOnce(Subscription) -> Subscription + Send,
    {
        Self::require_admin(actor)?;
        let updated = mutate(self.load(id).await?);
        self.subscription_repo.update(&updated).await?;
        info!(
            subscription_id = %id,
            plan = %updated.plan,
            status = %updated.status,
            end_date = %updated.end_date,
            "Subscription {}", action
        );
        Ok(updated)
    }

    /// Marks stored-active subscriptions past their end date as expired.
    /// Returns the ids that changed; a failure on one record does not stop the rest.
    pub async fn sweep_lapsed(&self, today: NaiveDate) -> Result<Vec<Uuid>, SubscriptionError> {
        let lapsed = self.subscription_repo.list_lapsed(today).await?;
        let mut swept = Vec::with_capacity(lapsed.len());

        for sub in lapsed {
            if !sub.is_lapsed(today) {
                continue;
            }
            let id = sub.id;
            match self.subscription_repo.update(&sub.mark_expired()).await {
                Ok(()) => swept.push(id),
                Err(e) => error!(subscription_id = %id, error = %e, "Failed to expire subscription"),
            }
        }

        if !swept.is_empty() {
            info!(count = swept.len(), "Expired lapsed subscriptions");
        }
        Ok(swept)
    }
}
