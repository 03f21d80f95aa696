use crate::reward::{
    default_collectibles, RewardConfig, DEFAULT_BASE_REWARD, DEFAULT_BONUS_CHANCE,
    DEFAULT_BONUS_REWARD, DEFAULT_COLLECTIBLE_CHANCE, DEFAULT_MINING_COLLECTIBLE_CHANCE,
};
use crate::service::{Options, DEFAULT_ACTIVE_WINDOW_SECS, DEFAULT_LEADERBOARD_LIMIT};
use crate::settlement::DEFAULT_CLAIM_NOTE;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::Level;
use url::Url;

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379/0".to_string()
}

fn default_ledger_url() -> String {
    "http://localhost:8081/api".to_string()
}

fn default_ledger_timeout_ms() -> u64 {
    5_000
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_leaderboard_limit() -> usize {
    DEFAULT_LEADERBOARD_LIMIT
}

fn default_active_window_seconds() -> u64 {
    DEFAULT_ACTIVE_WINDOW_SECS
}

/// Reward tuning, read from the `rewards` block.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct RewardSettings {
    pub base_reward: u64,
    pub bonus_reward: u64,
    pub bonus_chance: f64,
    pub collectible_chance: f64,
    pub mining_collectible_chance: f64,
    pub collectibles: Vec<String>,
    pub claim_note: String,
    /// Seed for the reward RNG; draws from OS entropy when unset.
    pub deterministic_seed: Option<u64>,
}

impl Default for RewardSettings {
    fn default() -> Self {
        Self {
            base_reward: DEFAULT_BASE_REWARD,
            bonus_reward: DEFAULT_BONUS_REWARD,
            bonus_chance: DEFAULT_BONUS_CHANCE,
            collectible_chance: DEFAULT_COLLECTIBLE_CHANCE,
            mining_collectible_chance: DEFAULT_MINING_COLLECTIBLE_CHANCE,
            collectibles: default_collectibles(),
            claim_note: DEFAULT_CLAIM_NOTE.to_string(),
            deterministic_seed: None,
        }
    }
}

/// Service configuration as read from YAML.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Prepended to every store key.
    #[serde(default)]
    pub key_prefix: String,
    #[serde(default = "default_ledger_url")]
    pub ledger_url: String,
    #[serde(default = "default_ledger_timeout_ms")]
    pub ledger_timeout_ms: u64,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_leaderboard_limit")]
    pub leaderboard_limit: usize,
    #[serde(default = "default_active_window_seconds")]
    pub active_window_seconds: u64,
    #[serde(default)]
    pub rewards: RewardSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            key_prefix: String::new(),
            ledger_url: default_ledger_url(),
            ledger_timeout_ms: default_ledger_timeout_ms(),
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            leaderboard_limit: default_leaderboard_limit(),
            active_window_seconds: default_active_window_seconds(),
            rewards: RewardSettings::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid log level: {value}")]
    InvalidLogLevel { value: String },
    #[error("{field} must be > 0 (got {value})")]
    InvalidNonZero { field: &'static str, value: u64 },
    #[error("{field} must be a valid URL: {value}")]
    InvalidUrl { field: &'static str, value: String },
    #[error("{field} URL scheme must be {expected}: {value}")]
    InvalidUrlScheme {
        field: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("{field} must be within [0, 1] (got {value})")]
    InvalidProbability { field: &'static str, value: f64 },
    #[error("{field} is non-zero but the collectible catalog is empty")]
    EmptyCatalog { field: &'static str },
    #[error("invalid listen host: {value}")]
    InvalidHost { value: String },
    #[error("base_reward + bonus_reward must not exceed {max} (base={base}, bonus={bonus})")]
    RewardTooLarge { base: u64, bonus: u64, max: u64 },
}

/// Largest claim total the store can count (Redis integers are signed 64-bit).
pub const MAX_CLAIM_TOTAL: u64 = i64::MAX as u64;

#[derive(Clone, Debug)]
pub struct ValidatedConfig {
    pub redis_url: String,
    pub key_prefix: String,
    pub ledger_url: Url,
    pub ledger_timeout: Duration,
    pub listen: SocketAddr,
    pub log_level: Level,
    pub rewards: RewardConfig,
    pub deterministic_seed: Option<u64>,
    pub options: Options,
}

fn ensure_nonzero(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidNonZero { field, value });
    }
    Ok(())
}

fn ensure_probability(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::InvalidProbability { field, value });
    }
    Ok(())
}

fn parse_url(
    field: &'static str,
    value: &str,
    schemes: &[&str],
    expected: &'static str,
) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|_| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
    })?;
    if !schemes.contains(&url.scheme()) {
        return Err(ConfigError::InvalidUrlScheme {
            field,
            expected,
            value: value.to_string(),
        });
    }
    Ok(url)
}

fn validate_http_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    let url = parse_url(field, value, &["http", "https"], "http or https")?;
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl {
            field,
            value: value.to_string(),
        });
    }
    Ok(url)
}

impl Config {
    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        parse_url(
            "redis_url",
            &self.redis_url,
            &["redis", "rediss", "redis+unix", "unix"],
            "redis or rediss",
        )?;
        let ledger_url = validate_http_url("ledger_url", &self.ledger_url)?;
        ensure_nonzero("ledger_timeout_ms", self.ledger_timeout_ms)?;
        ensure_nonzero("leaderboard_limit", self.leaderboard_limit as u64)?;
        ensure_nonzero("active_window_seconds", self.active_window_seconds)?;

        let log_level = Level::from_str(&self.log_level).map_err(|_| ConfigError::InvalidLogLevel {
            value: self.log_level.clone(),
        })?;
        let host = IpAddr::from_str(&self.host).map_err(|_| ConfigError::InvalidHost {
            value: self.host.clone(),
        })?;

        let settings = self.rewards;
        ensure_nonzero("rewards.base_reward", settings.base_reward)?;
        match settings.base_reward.checked_add(settings.bonus_reward) {
            Some(total) if total <= MAX_CLAIM_TOTAL => {}
            _ => {
                return Err(ConfigError::RewardTooLarge {
                    base: settings.base_reward,
                    bonus: settings.bonus_reward,
                    max: MAX_CLAIM_TOTAL,
                })
            }
        }
        ensure_probability("rewards.bonus_chance", settings.bonus_chance)?;
        ensure_probability("rewards.collectible_chance", settings.collectible_chance)?;
        ensure_probability(
            "rewards.mining_collectible_chance",
            settings.mining_collectible_chance,
        )?;
        if settings.collectibles.is_empty() {
            if settings.collectible_chance > 0.0 {
                return Err(ConfigError::EmptyCatalog {
                    field: "rewards.collectible_chance",
                });
            }
            if settings.mining_collectible_chance > 0.0 {
                return Err(ConfigError::EmptyCatalog {
                    field: "rewards.mining_collectible_chance",
                });
            }
        }

        Ok(ValidatedConfig {
            redis_url: self.redis_url,
            key_prefix: self.key_prefix,
            ledger_url,
            ledger_timeout: Duration::from_millis(self.ledger_timeout_ms),
            listen: SocketAddr::new(host, self.port),
            log_level,
            rewards: RewardConfig {
                base_reward: settings.base_reward,
                bonus_reward: settings.bonus_reward,
                bonus_chance: settings.bonus_chance,
                collectible_chance: settings.collectible_chance,
                mining_collectible_chance: settings.mining_collectible_chance,
                collectibles: settings.collectibles,
            },
            deterministic_seed: settings.deterministic_seed,
            options: Options {
                claim_note: settings.claim_note,
                leaderboard_limit: self.leaderboard_limit,
                active_window_seconds: self.active_window_seconds,
            },
        })
    }
}
