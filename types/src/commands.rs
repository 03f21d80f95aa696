//! Structured results returned by each command; the transport layer formats them.

use crate::reward::RewardGrant;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartOutcome {
    pub created: bool,
    pub name: String,
    /// `None` when the ledger could not provision a wallet right now.
    pub wallet_address: Option<String>,
    /// Referrer credited for this registration, if any.
    pub referred_by: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MineOutcome {
    pub address: String,
    pub reward: f64,
    pub block_hash: String,
    pub collectible: Option<String>,
    pub mining_count: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WalletInfo {
    pub address: String,
    pub balance: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    /// The ledger accepted the transfer and local totals were credited.
    Sent,
    /// The ledger answered but declined the transfer.
    Rejected,
    /// The ledger could not be reached or answered with garbage.
    Unreachable,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimResult {
    pub claim_id: String,
    pub status: ClaimStatus,
    pub amount: u64,
    pub address: String,
    pub grant: RewardGrant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralInfo {
    /// Payload to embed in the invite link.
    pub code: String,
    pub referral_count: u64,
    pub total_users: u64,
}
