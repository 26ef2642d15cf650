use crate::application::{AccountService, DefaultSubscription, ListingService, SubscriptionService};
use crate::infrastructure::{
    AppConfig, HttpMediaStorage, PostgresListingRepository, PostgresSessionGateway,
    PostgresSubscriptionRepository, PostgresUserRepository,
};
use anyhow::Context;
use sqlx::PgPool;
use std::sync::Arc;

pub type ListingServiceType =
    ListingService<PostgresListingRepository, PostgresSubscriptionRepository, HttpMediaStorage>;

pub type SubscriptionServiceType =
    SubscriptionService<PostgresSubscriptionRepository, PostgresUserRepository>;

pub type AccountServiceType = AccountService<
    PostgresUserRepository,
    PostgresSubscriptionRepository,
    PostgresListingRepository,
    PostgresSessionGateway,
>;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub accounts: Arc<AccountServiceType>,
    pub listings: Arc<ListingServiceType>,
    pub subscriptions: Arc<SubscriptionServiceType>,
}

/// Wires repositories, media storage and services onto a pool the caller owns.
pub async fn build_state_with_pool(
    config: AppConfig,
    pool: PgPool,
    run_migrations: bool,
) -> anyhow::Result<AppState> {
    if run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("run migrations")?;
    }

    let media = Arc::new(
        HttpMediaStorage::new(
            config.media_base_url.clone(),
            config.media_bucket.clone(),
            &config.media_token,
        )
        .context("init media storage")?,
    );

    let user_repo = Arc::new(PostgresUserRepository::new(pool.clone()));
    let subscription_repo = Arc::new(PostgresSubscriptionRepository::new(pool.clone()));
    let listing_repo = Arc::new(PostgresListingRepository::new(pool.clone()));
    let sessions = Arc::new(PostgresSessionGateway::new(pool.clone()));

    let accounts = Arc::new(AccountService::new(
        user_repo.clone(),
        subscription_repo.clone(),
        listing_repo.clone(),
        sessions,
        DefaultSubscription {
            plan: config.default_plan,
            days: config.default_subscription_days,
        },
    ));

    let listings = Arc::new(ListingService::new(
        listing_repo,
        subscription_repo.clone(),
        media,
        config.quota_policy(),
        config.validation_rules(),
    ));

    let subscriptions = Arc::new(SubscriptionService::new(subscription_repo, user_repo));

    Ok(AppState {
        pool,
        accounts,
        listings,
        subscriptions,
    })
}

/// Connects to `database_url` and always migrates.
pub async fn build_state_from_env(config: AppConfig) -> anyhow::Result<AppState> {
    let pool = PgPool::connect(&config.database_url)
        .await
        .context("connect database")?;
    build_state_with_pool(config, pool, true).await
}
