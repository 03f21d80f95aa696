//! Read-only aggregates over the stored user records.
//!
//! Every query rescans the store; no incremental aggregate is kept.

use crate::{store::UserStore, Error, Result};
use quantum_types::{GlobalStats, LeaderboardEntry, UserProfile, UserRecord};
use std::sync::Arc;

pub struct StatsAggregator<S> {
    store: Arc<S>,
}

impl<S> Clone for StatsAggregator<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: UserStore> StatsAggregator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn profile(&self, id: &str) -> Result<UserProfile> {
        self.store
            .record(id)
            .await?
            .map(|record| record.profile())
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    pub async fn global_stats(&self) -> Result<GlobalStats> {
        let records = self.store.records().await?;
        Ok(sum_records(&records))
    }

    /// Users active strictly after `now - window_seconds`.
    pub async fn active_user_count(&self, window_seconds: u64, now: u64) -> Result<u64> {
        let cutoff = now.saturating_sub(window_seconds);
        let records = self.store.records().await?;
        Ok(records
            .iter()
            .filter(|record| record.last_active_at > cutoff)
            .count() as u64)
    }

    /// Users ordered by mining count, highest first. Ties keep id order.
    pub async fn top_miners(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        let records = self.store.records().await?;
        Ok(rank_miners(records, limit))
    }
}

fn sum_records(records: &[UserRecord]) -> GlobalStats {
    records.iter().fold(
        GlobalStats {
            total_users: records.len() as u64,
            ..GlobalStats::default()
        },
        |mut stats, record| {
            stats.total_mining_events = stats.total_mining_events.saturating_add(record.mining_count);
            stats.total_rewards_distributed = stats
                .total_rewards_distributed
                .saturating_add(record.total_rewards_earned);
            stats.total_referrals = stats.total_referrals.saturating_add(record.referral_count);
            stats
        },
    )
}

fn rank_miners(mut records: Vec<UserRecord>, limit: usize) -> Vec<LeaderboardEntry> {
    records.sort_by(|a, b| {
        b.mining_count
            .cmp(&a.mining_count)
            .then_with(|| a.id.cmp(&b.id))
    });
    records
        .into_iter()
        .take(limit)
        .map(|record| LeaderboardEntry {
            name: record.name,
            mining_count: record.mining_count,
        })
        .collect()
}
