use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GrantError {
    #[error("total mismatch (base={base}, bonus={bonus}, total={total})")]
    TotalMismatch { base: u64, bonus: u64, total: u64 },
    #[error("collectible flag does not match collectible name")]
    CollectibleMismatch,
}

/// Outcome of a single reward computation.
///
/// Fields are private so the only way to build a grant is [RewardGrant::new], which
/// keeps `total_amount == base_amount + bonus_amount` and ties the collectible flag
/// to the presence of a collectible name. A sum beyond `u64::MAX` saturates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawGrant")]
pub struct RewardGrant {
    base_amount: u64,
    bonus_amount: u64,
    total_amount: u64,
    collectible_won: bool,
    collectible_name: Option<String>,
}

impl RewardGrant {
    pub fn new(base_amount: u64, bonus_amount: u64, collectible: Option<String>) -> Self {
        Self {
            base_amount,
            bonus_amount,
            total_amount: base_amount.saturating_add(bonus_amount),
            collectible_won: collectible.is_some(),
            collectible_name: collectible,
        }
    }

    pub fn base_amount(&self) -> u64 {
        self.base_amount
    }

    pub fn bonus_amount(&self) -> u64 {
        self.bonus_amount
    }

    pub fn total_amount(&self) -> u64 {
        self.total_amount
    }

    pub fn collectible_won(&self) -> bool {
        self.collectible_won
    }

    pub fn collectible_name(&self) -> Option<&str> {
        self.collectible_name.as_deref()
    }
}

#[derive(Deserialize)]
struct RawGrant {
    base_amount: u64,
    bonus_amount: u64,
    total_amount: u64,
    collectible_won: bool,
    collectible_name: Option<String>,
}

impl TryFrom<RawGrant> for RewardGrant {
    type Error = GrantError;

    fn try_from(raw: RawGrant) -> Result<Self, Self::Error> {
        if raw.base_amount.checked_add(raw.bonus_amount) != Some(raw.total_amount) {
            return Err(GrantError::TotalMismatch {
                base: raw.base_amount,
                bonus: raw.bonus_amount,
                total: raw.total_amount,
            });
        }
        if raw.collectible_won != raw.collectible_name.is_some() {
            return Err(GrantError::CollectibleMismatch);
        }
        Ok(Self {
            base_amount: raw.base_amount,
            bonus_amount: raw.bonus_amount,
            total_amount: raw.total_amount,
            collectible_won: raw.collectible_won,
            collectible_name: raw.collectible_name,
        })
    }
}
