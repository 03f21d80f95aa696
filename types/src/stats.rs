use serde::{Deserialize, Serialize};

/// Totals recomputed from every stored user record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalStats {
    pub total_users: u64,
    pub total_mining_events: u64,
    pub total_rewards_distributed: u64,
    pub total_referrals: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub mining_count: u64,
}

/// Global totals plus the number of users seen within a recent window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsReport {
    #[serde(flatten)]
    pub totals: GlobalStats,
    pub active_users: u64,
    pub window_seconds: u64,
}
