pub mod api;
pub mod commands;
pub mod reward;
pub mod stats;
pub mod user;

pub use commands::{
    ClaimResult, ClaimStatus, MineOutcome, ReferralInfo, StartOutcome, WalletInfo,
};
pub use reward::RewardGrant;
pub use stats::{GlobalStats, LeaderboardEntry, StatsReport};
pub use user::{FieldError, UserProfile, UserRecord};
