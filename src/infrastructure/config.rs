use crate::domain::{Plan, QuotaPolicy, ValidationRules};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,

    // Object storage for listing photos and voice notes
    pub media_base_url: String,
    pub media_bucket: String,
    pub media_token: String,

    // Listing quota gate
    pub quota_fallback_limit: i32,
    pub quota_count_rejected: bool,
    pub quota_require_active: bool,

    pub require_insurance: bool,

    // Subscription provisioning on dealer approval
    pub default_plan: Plan,
    pub default_subscription_days: u32,

    /// Seconds between maintenance sweeps (lapsed subscriptions, expired sessions). `0` disables them.
    pub sweep_interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("MARKET")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("server_host", "0.0.0.0")?
            .set_default("server_port", 8080)?
            .set_default("media_base_url", "http://localhost:54321/storage/v1")?
            .set_default("media_bucket", "car-images")?
            .set_default("media_token", "")?
            .set_default("quota_fallback_limit", 0)?
            .set_default("quota_count_rejected", true)?
            .set_default("quota_require_active", false)?
            .set_default("require_insurance", true)?
            .set_default("default_plan", "basic")?
            .set_default("default_subscription_days", 30)?
            .set_default("sweep_interval_secs", 3600)?
            .build()?;

        config.try_deserialize()
    }

    pub fn quota_policy(&self) -> QuotaPolicy {
        QuotaPolicy {
            fallback_limit: self.quota_fallback_limit,
            count_rejected: self.quota_count_rejected,
            require_active: self.quota_require_active,
        }
    }

    pub fn validation_rules(&self) -> ValidationRules {
        ValidationRules {
            require_insurance: self.require_insurance,
        }
    }
}
