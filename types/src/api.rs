//! Messages exchanged with the ledger service.

use serde::{Deserialize, Serialize};

/// Response to `POST /wallet/new`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NewWallet {
    #[serde(default)]
    pub address: Option<String>,
}

/// Response to `GET /wallet/balance/{address}`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Balance {
    #[serde(default)]
    pub balance: f64,
}

/// Body of `POST /mine`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MineRequest {
    pub address: String,
}

/// Response to `POST /mine`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MineResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub reward: Option<f64>,
    #[serde(default)]
    pub block_hash: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl MineResponse {
    pub fn declined(message: impl Into<String>) -> Self {
        Self {
            success: false,
            reward: None,
            block_hash: None,
            message: Some(message.into()),
        }
    }
}

/// Body of `POST /wallet/claim`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub address: String,
    pub amount: u64,
    pub note: String,
}

/// Response to `POST /wallet/claim`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ClaimResponse {
    #[serde(default)]
    pub success: bool,
}
