use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub scheduling: SchedulingConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Background-task cadence and the civil time zone every trip day is
/// anchored to. The zone is fixed per deployment, never per request.
#[derive(Debug, Deserialize, Clone)]
pub struct SchedulingConfig {
    #[serde(default = "default_timezone")]
    pub operating_timezone: String,
    #[serde(default = "default_generation_interval")]
    pub generation_interval_seconds: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default = "default_hold_minutes")]
    pub default_hold_minutes: i64,
}

fn default_timezone() -> String {
    "America/Santiago".to_string()
}

fn default_generation_interval() -> u64 {
    86_400
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_hold_minutes() -> i64 {
    10
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("RUTERO").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
