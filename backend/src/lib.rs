//! Reward economy for the quantum mining bot.
//!
//! Users are registered in a shared [store::UserStore], receive a single ledger wallet
//! through [wallet::WalletProvisioner] and turn probabilistic grants from
//! [reward::RewardEngine] into ledger transfers with [settlement::ClaimSettlement].
//! [service::Rewards] bundles every command; [api] exposes it over HTTP.

pub mod api;
pub mod config;
mod error;
pub mod ledger;
pub mod metrics;
pub mod mining;
pub mod reward;
pub mod service;
pub mod settlement;
pub mod stats;
pub mod store;
pub mod wallet;

pub use config::{Config, ConfigError, ValidatedConfig};
pub use error::{Error, Result};
pub use service::{Options, Rewards};

use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}
