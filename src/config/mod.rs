use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub billing: BillingConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub uploads: UploadConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BillingConfig {
    /// Days of continued access after end_date before hard expiration.
    pub grace_period_days: i64,
    /// Tolerance (whole currency units) when matching split payment amounts
    /// against the plan price.
    pub amount_tolerance: i64,
    pub currency: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Seconds between expiry-warning / auto-renewal sweeps.
    pub daily_sweep_interval_secs: u64,
    /// Seconds between expiration sweeps. Runs more often than the daily
    /// sweeps to bound how long a lapsed entitlement still reads as active.
    pub expiration_sweep_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NotifierConfig {
    #[serde(default)]
    pub enabled: bool,
    pub webhook_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    pub dir: String,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.max_connections", 10)?
            .set_default("billing.grace_period_days", 7)?
            .set_default("billing.amount_tolerance", 1)?
            .set_default("billing.currency", "INR")?
            .set_default("scheduler.enabled", true)?
            .set_default("scheduler.daily_sweep_interval_secs", 86_400)?
            .set_default("scheduler.expiration_sweep_interval_secs", 14_400)?
            .set_default("notifier.enabled", false)?
            .set_default("uploads.dir", "uploads")?
            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Environment variables (BANDHAN__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("BANDHAN").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "sqlite://bandhan.db".to_string(),
                max_connections: 10,
            },
            billing: BillingConfig::default(),
            scheduler: SchedulerConfig::default(),
            notifier: NotifierConfig::default(),
            uploads: UploadConfig::default(),
        }
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            grace_period_days: 7,
            amount_tolerance: 1,
            currency: "INR".to_string(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            daily_sweep_interval_secs: 86_400,
            expiration_sweep_interval_secs: 14_400,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: "uploads".to_string(),
        }
    }
}
