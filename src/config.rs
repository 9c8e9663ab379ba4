use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub oracle: OracleSettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OracleSettings {
    pub endpoint: String,
    pub api_key: String,
    #[serde(default = "default_oracle_model")]
    pub model: String,
    #[serde(default = "default_oracle_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_min_call_interval_ms")]
    pub min_call_interval_ms: u64,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

fn default_oracle_model() -> String {
    "gemini-pro".to_string()
}
fn default_oracle_timeout_secs() -> u64 {
    30
}
fn default_max_attempts() -> u32 {
    3
}
fn default_min_call_interval_ms() -> u64 {
    500
}
fn default_backoff_base_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingSettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_top_candidates")]
    pub top_candidates: usize,
    #[serde(default = "default_fallback_threshold")]
    pub fallback_threshold: f64,
    #[serde(default = "default_credit_buffer")]
    pub credit_buffer: i32,
    #[serde(default = "default_income_buffer_percent")]
    pub income_buffer_percent: f64,
    #[serde(default = "default_age_buffer")]
    pub age_buffer: i32,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            top_candidates: default_top_candidates(),
            fallback_threshold: default_fallback_threshold(),
            credit_buffer: default_credit_buffer(),
            income_buffer_percent: default_income_buffer_percent(),
            age_buffer: default_age_buffer(),
        }
    }
}

fn default_batch_size() -> u32 {
    100
}
fn default_top_candidates() -> usize {
    5
}
fn default_fallback_threshold() -> f64 {
    0.6
}
fn default_credit_buffer() -> i32 {
    50
}
fn default_income_buffer_percent() -> f64 {
    0.15
}
fn default_age_buffer() -> i32 {
    2
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoringSettings {
    #[serde(default)]
    pub weights: WeightsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_credit_weight")]
    pub credit: f64,
    #[serde(default = "default_income_weight")]
    pub income: f64,
    #[serde(default = "default_employment_weight")]
    pub employment: f64,
    #[serde(default = "default_age_weight")]
    pub age: f64,
    #[serde(default = "default_rate_weight")]
    pub rate: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            credit: default_credit_weight(),
            income: default_income_weight(),
            employment: default_employment_weight(),
            age: default_age_weight(),
            rate: default_rate_weight(),
        }
    }
}

fn default_credit_weight() -> f64 {
    0.35
}
fn default_income_weight() -> f64 {
    0.25
}
fn default_employment_weight() -> f64 {
    0.20
}
fn default_age_weight() -> f64 {
    0.10
}
fn default_rate_weight() -> f64 {
    0.10
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml, then config/local.toml)
    /// 3. Environment variables (prefixed with LENDMATCH_)
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            // Local config file (for development overrides)
            .add_source(File::with_name("config/local").required(false))
            // e.g., LENDMATCH_MATCHING__BATCH_SIZE -> matching.batch_size
            .add_source(
                Environment::with_prefix("LENDMATCH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings = substitute_env_vars(settings)?;

        settings.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("LENDMATCH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

/// Apply the conventional standalone environment variables on top of the
/// layered config: DATABASE_URL and ORACLE_API_KEY.
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let mut builder = Config::builder().add_source(settings);

    if let Ok(url) = env::var("DATABASE_URL") {
        builder = builder.set_override("database.url", url)?;
    }
    if let Ok(api_key) = env::var("ORACLE_API_KEY") {
        builder = builder.set_override("oracle.api_key", api_key)?;
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights() {
        let weights = WeightsConfig::default();
        assert_eq!(weights.credit, 0.35);
        assert_eq!(weights.income, 0.25);
        assert_eq!(weights.employment, 0.20);
        assert_eq!(weights.age, 0.10);
        assert_eq!(weights.rate, 0.10);
    }

    #[test]
    fn test_default_matching_settings() {
        let matching = MatchingSettings::default();
        assert_eq!(matching.batch_size, 100);
        assert_eq!(matching.top_candidates, 5);
        assert_eq!(matching.fallback_threshold, 0.6);
        assert_eq!(matching.credit_buffer, 50);
        assert_eq!(matching.income_buffer_percent, 0.15);
        assert_eq!(matching.age_buffer, 2);
    }

    #[test]
    fn test_default_logging() {
        let logging = LoggingSettings::default();
        assert_eq!(logging.level, "info");
        assert_eq!(logging.format, "json");
    }
}
