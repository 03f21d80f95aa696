use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Key of the set holding every known user id.
pub const USERS_KEY: &str = "users";

/// Prefix of the per-user hash key (`user:<id>`).
pub const USER_KEY_PREFIX: &str = "user:";

pub const FIELD_NAME: &str = "name";
pub const FIELD_JOINED_AT: &str = "joined_at";
pub const FIELD_LAST_ACTIVE: &str = "last_active";
pub const FIELD_MINING_COUNT: &str = "mining_count";
pub const FIELD_REFERRAL_COUNT: &str = "referral_count";
pub const FIELD_WALLET: &str = "wallet";
pub const FIELD_TOTAL_EARNED: &str = "total_qc_earned";

/// Name reported for records written without one.
pub const UNKNOWN_NAME: &str = "Unknown";

pub fn user_key(id: &str) -> String {
    format!("{USER_KEY_PREFIX}{id}")
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    #[error("field {field} is not a valid number (value={value})")]
    InvalidNumber { field: &'static str, value: String },
}

/// Persistent state tracked for a single user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    /// Set once by provisioning and never reassigned.
    pub wallet_address: Option<String>,
    pub joined_at: u64,
    pub last_active_at: u64,
    pub mining_count: u64,
    pub referral_count: u64,
    pub total_rewards_earned: u64,
}

impl UserRecord {
    pub fn new(id: &str, name: &str, now: u64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            wallet_address: None,
            joined_at: now,
            last_active_at: now,
            mining_count: 0,
            referral_count: 0,
            total_rewards_earned: 0,
        }
    }

    /// Rebuild a record from the fields of its `user:<id>` hash.
    ///
    /// Missing counters read as zero and an empty wallet reads as unset, matching
    /// records written before those fields existed.
    pub fn from_fields(id: &str, fields: &HashMap<String, String>) -> Result<Self, FieldError> {
        let name = fields
            .get(FIELD_NAME)
            .filter(|name| !name.is_empty())
            .cloned()
            .unwrap_or_else(|| UNKNOWN_NAME.to_string());
        let wallet_address = fields
            .get(FIELD_WALLET)
            .map(|wallet| wallet.trim())
            .filter(|wallet| !wallet.is_empty())
            .map(str::to_string);
        Ok(Self {
            id: id.to_string(),
            name,
            wallet_address,
            joined_at: read_counter(fields, FIELD_JOINED_AT)?,
            last_active_at: read_counter(fields, FIELD_LAST_ACTIVE)?,
            mining_count: read_counter(fields, FIELD_MINING_COUNT)?,
            referral_count: read_counter(fields, FIELD_REFERRAL_COUNT)?,
            total_rewards_earned: read_counter(fields, FIELD_TOTAL_EARNED)?,
        })
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            name: self.name.clone(),
            wallet_address: self.wallet_address.clone(),
            joined_at: self.joined_at,
            last_active_at: self.last_active_at,
            mining_count: self.mining_count,
            referral_count: self.referral_count,
            total_rewards_earned: self.total_rewards_earned,
        }
    }
}

// Counters are written with HINCRBY, so only integers are valid.
fn read_counter(fields: &HashMap<String, String>, field: &'static str) -> Result<u64, FieldError> {
    let Some(raw) = fields.get(field).map(|raw| raw.trim()) else {
        return Ok(0);
    };
    if raw.is_empty() {
        return Ok(0);
    }
    raw.parse::<u64>().map_err(|_| FieldError::InvalidNumber {
        field,
        value: raw.to_string(),
    })
}

/// Public snapshot of a [UserRecord].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub wallet_address: Option<String>,
    pub joined_at: u64,
    pub last_active_at: u64,
    pub mining_count: u64,
    pub referral_count: u64,
    pub total_rewards_earned: u64,
}
