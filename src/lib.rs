//! Dealer Market
//!
//! Backend for a used-car marketplace. Dealers register and wait for admin approval,
//! hold a subscription plan that caps their listings, and submit car listings that an
//! admin approves or rejects. Approved listings form the searchable marketplace.
//!
//! Layers:
//! - [`domain`]: plan catalog, subscription rules, quota gate, listing lifecycle,
//!   access rules and search filters. Pure and synchronous.
//! - [`application`]: services that apply those rules against the repositories.
//! - [`infrastructure`]: Postgres repositories, media storage, sessions, config.
//! - `server` (feature `server`): the HTTP API, run as `dealer-market-server` or
//!   mounted inside another axum app:
//!
//! ```rust,ignore
//! let cfg = dealer_market::infrastructure::AppConfig::from_env()?;
//! let pool = sqlx::PgPool::connect(&cfg.database_url).await?;
//! let state = dealer_market::server::build_state_with_pool(cfg, pool, true).await?;
//! let app = axum::Router::new().nest("/market", dealer_market::server::router(state));
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;

#[cfg(feature = "server")]
pub mod server;

pub use application::*;
pub use domain::*;
pub use infrastructure::*;

#[cfg(feature = "server")]
pub use server::*;
