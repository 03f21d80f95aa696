//! Command entry points consumed by the transport layer.

use crate::{
    ledger::Ledger,
    metrics::Metrics,
    mining::Miner,
    now_secs,
    reward::RewardEngine,
    settlement::{ClaimSettlement, DEFAULT_CLAIM_NOTE},
    stats::StatsAggregator,
    store::{register, UserStore},
    wallet::WalletProvisioner,
    Error, Result,
};
use quantum_types::{
    ClaimResult, LeaderboardEntry, MineOutcome, ReferralInfo, StartOutcome, StatsReport,
    UserProfile, WalletInfo,
};
use rand::Rng;
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_LEADERBOARD_LIMIT: usize = 10;
pub const DEFAULT_ACTIVE_WINDOW_SECS: u64 = 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct Options {
    pub claim_note: String,
    pub leaderboard_limit: usize,
    pub active_window_seconds: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            claim_note: DEFAULT_CLAIM_NOTE.to_string(),
            leaderboard_limit: DEFAULT_LEADERBOARD_LIMIT,
            active_window_seconds: DEFAULT_ACTIVE_WINDOW_SECS,
        }
    }
}

type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// The reward economy: every command a user can issue, plus read-only queries.
pub struct Rewards<S, L, R> {
    store: Arc<S>,
    ledger: Arc<L>,
    wallets: WalletProvisioner<S, L>,
    settlement: ClaimSettlement<S, L, R>,
    miner: Miner<S, L, R>,
    stats: StatsAggregator<S>,
    metrics: Arc<Metrics>,
    options: Options,
    clock: Clock,
}

impl<S: UserStore, L: Ledger, R: Rng + Send + 'static> Rewards<S, L, R> {
    pub fn new(store: Arc<S>, ledger: Arc<L>, engine: RewardEngine<R>, options: Options) -> Self {
        let metrics = Arc::new(Metrics::default());
        let engine = Arc::new(engine);
        let wallets = WalletProvisioner::new(store.clone(), ledger.clone(), metrics.clone());
        let settlement = ClaimSettlement::new(
            store.clone(),
            ledger.clone(),
            wallets.clone(),
            engine.clone(),
            metrics.clone(),
            options.claim_note.clone(),
        );
        let miner = Miner::new(
            store.clone(),
            ledger.clone(),
            wallets.clone(),
            engine,
            metrics.clone(),
        );
        let stats = StatsAggregator::new(store.clone());
        Self {
            store,
            ledger,
            wallets,
            settlement,
            miner,
            stats,
            metrics,
            options,
            clock: Arc::new(now_secs),
        }
    }

    /// Replace the wall clock used to stamp activity.
    pub fn with_clock(mut self, clock: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    fn now(&self) -> u64 {
        (self.clock)()
    }

    /// Register a user, provision their wallet and credit the referrer of a new user.
    ///
    /// A wallet that cannot be provisioned yet is reported as `None` rather than
    /// failing the registration.
    pub async fn start(&self, id: &str, name: &str, referrer: Option<&str>) -> Result<StartOutcome> {
        let created = register(self.store.as_ref(), id, name, self.now()).await?;
        if created {
            info!(user = id, "user registered");
        }

        let wallet_address = match self.wallets.provision(id).await {
            Ok(address) => Some(address),
            Err(Error::WalletUnavailable(_)) => None,
            Err(err) => return Err(err),
        };

        let mut referred_by = None;
        if let Some(referrer) = referrer.filter(|referrer| created && *referrer != id) {
            if self.store.record(referrer).await?.is_some() {
                let count = self.store.increment_referral_count(referrer).await?;
                info!(user = id, referrer, referral_count = count, "referral credited");
                referred_by = Some(referrer.to_string());
            } else {
                warn!(user = id, referrer, "ignoring unknown referrer");
            }
        }

        Ok(StartOutcome {
            created,
            name: name.to_string(),
            wallet_address,
            referred_by,
        })
    }

    pub async fn mine(&self, id: &str, name: &str) -> Result<MineOutcome> {
        self.miner.mine(id, name, self.now()).await
    }

    /// Wallet address and balance. The balance reads 0 when the ledger cannot answer.
    pub async fn wallet(&self, id: &str, name: &str) -> Result<WalletInfo> {
        register(self.store.as_ref(), id, name, self.now()).await?;
        let address = self.wallets.provision(id).await?;
        let balance = self.ledger.get_balance(&address).await;
        Ok(WalletInfo { address, balance })
    }

    pub async fn claim(&self, id: &str, name: &str) -> Result<ClaimResult> {
        self.settlement.claim(id, name, self.now()).await
    }

    pub async fn referral(&self, id: &str, name: &str) -> Result<ReferralInfo> {
        register(self.store.as_ref(), id, name, self.now()).await?;
        let referral_count = self
            .store
            .record(id)
            .await?
            .map(|record| record.referral_count)
            .unwrap_or_default();
        let total_users = self.store.user_count().await?;
        Ok(ReferralInfo {
            code: id.to_string(),
            referral_count,
            total_users,
        })
    }

    pub async fn profile(&self, id: &str) -> Result<UserProfile> {
        self.stats.profile(id).await
    }

    pub async fn leaderboard(&self, limit: Option<usize>) -> Result<Vec<LeaderboardEntry>> {
        self.stats
            .top_miners(limit.unwrap_or(self.options.leaderboard_limit))
            .await
    }

    pub async fn stats(&self, window_seconds: Option<u64>) -> Result<StatsReport> {
        let window_seconds = window_seconds.unwrap_or(self.options.active_window_seconds);
        let totals = self.stats.global_stats().await?;
        let active_users = self
            .stats
            .active_user_count(window_seconds, self.now())
            .await?;
        Ok(StatsReport {
            totals,
            active_users,
            window_seconds,
        })
    }

    pub async fn user_count(&self) -> Result<u64> {
        Ok(self.store.user_count().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Behavior, MockLedger};
    use crate::reward::RewardConfig;
    use crate::store::Memory;
    use proptest::prelude::*;
    use quantum_types::ClaimStatus;
    use rand::rngs::mock::StepRng;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn rewards() -> (
        Arc<Memory>,
        Arc<MockLedger>,
        Rewards<Memory, MockLedger, StepRng>,
    ) {
        let store = Arc::new(Memory::new());
        let ledger = Arc::new(MockLedger::new());
        let engine = RewardEngine::new(RewardConfig::default(), StepRng::new(u64::MAX, 0));
        let rewards = Rewards::new(store.clone(), ledger.clone(), engine, Options::default());
        (store, ledger, rewards)
    }

    #[tokio::test]
    async fn start_registers_and_provisions() {
        let (store, ledger, rewards) = rewards();
        let first = rewards.start("42", "Nova", None).await.unwrap();
        assert!(first.created);
        assert!(first.wallet_address.is_some());

        let second = rewards.start("42", "Nova", None).await.unwrap();
        assert!(!second.created);
        assert_eq!(second.wallet_address, first.wallet_address);
        assert_eq!(ledger.wallets_created(), 1);
        assert_eq!(store.user_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn start_without_ledger_still_registers() {
        let (store, ledger, rewards) = rewards();
        ledger.set_wallets(Behavior::Unreachable);
        let outcome = rewards.start("42", "Nova", None).await.unwrap();
        assert!(outcome.created);
        assert_eq!(outcome.wallet_address, None);
        assert!(store.record("42").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn referral_is_credited_once() {
        let (store, _, rewards) = rewards();
        rewards.start("1", "Host", None).await.unwrap();

        let outcome = rewards.start("2", "Guest", Some("1")).await.unwrap();
        assert_eq!(outcome.referred_by.as_deref(), Some("1"));
        let again = rewards.start("2", "Guest", Some("1")).await.unwrap();
        assert_eq!(again.referred_by, None);

        let info = rewards.referral("1", "Host").await.unwrap();
        assert_eq!(info.code, "1");
        assert_eq!(info.referral_count, 1);
        assert_eq!(info.total_users, 2);
        assert_eq!(store.record("2").await.unwrap().unwrap().referral_count, 0);
    }

    #[tokio::test]
    async fn self_and_unknown_referrers_are_ignored() {
        let (store, _, rewards) = rewards();
        let own = rewards.start("1", "Solo", Some("1")).await.unwrap();
        assert_eq!(own.referred_by, None);
        let ghost = rewards.start("2", "Guest", Some("404")).await.unwrap();
        assert_eq!(ghost.referred_by, None);
        assert!(store.record("404").await.unwrap().is_none());
        assert_eq!(store.record("1").await.unwrap().unwrap().referral_count, 0);
    }

    #[tokio::test]
    async fn wallet_reports_ledger_balance() {
        let (_, ledger, rewards) = rewards();
        rewards.claim("42", "Nova").await.unwrap();
        let info = rewards.wallet("42", "Nova").await.unwrap();
        assert_eq!(info.balance, 50.0);

        ledger.set_balances(Behavior::Unreachable);
        let info = rewards.wallet("42", "Nova").await.unwrap();
        assert_eq!(info.balance, 0.0);
    }

    #[tokio::test]
    async fn wallet_unavailable_skips_balance() {
        let (_, ledger, rewards) = rewards();
        ledger.set_wallets(Behavior::Unreachable);
        let err = rewards.wallet("42", "Nova").await.unwrap_err();
        assert!(matches!(err, Error::WalletUnavailable(_)));
    }

    #[tokio::test]
    async fn stats_use_the_clock() {
        let (_, _, rewards) = rewards();
        let now = Arc::new(AtomicU64::new(10_000));
        let clock = now.clone();
        let rewards = rewards.with_clock(move || clock.load(Ordering::SeqCst));

        rewards.start("old", "Old", None).await.unwrap();
        now.store(20_000, Ordering::SeqCst);
        rewards.start("new", "New", None).await.unwrap();
        rewards.mine("new", "New").await.unwrap();

        let report = rewards.stats(Some(3_600)).await.unwrap();
        assert_eq!(report.totals.total_users, 2);
        assert_eq!(report.totals.total_mining_events, 1);
        assert_eq!(report.active_users, 1);
        assert_eq!(report.window_seconds, 3_600);

        let report = rewards.stats(None).await.unwrap();
        assert_eq!(report.active_users, 2);
        assert_eq!(report.window_seconds, DEFAULT_ACTIVE_WINDOW_SECS);
    }

    #[tokio::test]
    async fn leaderboard_defaults_to_configured_limit() {
        let (_, _, rewards) = rewards();
        for i in 0..12 {
            let id = i.to_string();
            rewards.mine(&id, &format!("miner {i}")).await.unwrap();
        }
        assert_eq!(rewards.leaderboard(None).await.unwrap().len(), DEFAULT_LEADERBOARD_LIMIT);
        assert_eq!(rewards.leaderboard(Some(3)).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn profile_reflects_commands() {
        let (_, _, rewards) = rewards();
        rewards.claim("42", "Nova").await.unwrap();
        rewards.mine("42", "Nova").await.unwrap();
        let profile = rewards.profile("42").await.unwrap();
        assert_eq!(profile.name, "Nova");
        assert_eq!(profile.total_rewards_earned, 50);
        assert_eq!(profile.mining_count, 1);
        assert!(matches!(
            rewards.profile("7").await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[derive(Clone, Debug)]
    enum Step {
        Start { user: u8, referrer: Option<u8> },
        Mine(u8),
        Wallet(u8),
        Claim(u8),
        Referral(u8),
        Ledger {
            wallets: Behavior,
            claims: Behavior,
            mining: Behavior,
        },
    }

    fn behavior() -> impl Strategy<Value = Behavior> {
        prop_oneof![
            Just(Behavior::Accept),
            Just(Behavior::Decline),
            Just(Behavior::Unreachable),
        ]
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            (0..4u8, proptest::option::of(0..4u8))
                .prop_map(|(user, referrer)| Step::Start { user, referrer }),
            (0..4u8).prop_map(Step::Mine),
            (0..4u8).prop_map(Step::Wallet),
            (0..4u8).prop_map(Step::Claim),
            (0..4u8).prop_map(Step::Referral),
            (behavior(), behavior(), behavior()).prop_map(|(wallets, claims, mining)| {
                Step::Ledger {
                    wallets,
                    claims,
                    mining,
                }
            }),
        ]
    }

    fn user_id(user: u8) -> String {
        format!("u{user}")
    }

    proptest! {
        #[test]
        fn counters_never_decrease(
            seed in any::<u64>(),
            steps in proptest::collection::vec(step(), 1..40),
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                let store = Arc::new(Memory::new());
                let ledger = Arc::new(MockLedger::new());
                let engine = RewardEngine::with_seed(RewardConfig::default(), Some(seed));
                let rewards = Rewards::new(store.clone(), ledger.clone(), engine, Options::default());

                let mut seen: HashMap<String, (u64, u64, u64)> = HashMap::new();
                let mut credited: HashMap<String, u64> = HashMap::new();
                for step in steps {
                    // Command failures are expected here; only the counters matter.
                    match step {
                        Step::Start { user, referrer } => {
                            let referrer = referrer.map(user_id);
                            let _ = rewards.start(&user_id(user), "Nova", referrer.as_deref()).await;
                        }
                        Step::Mine(user) => {
                            let _ = rewards.mine(&user_id(user), "Nova").await;
                        }
                        Step::Wallet(user) => {
                            let _ = rewards.wallet(&user_id(user), "Nova").await;
                        }
                        Step::Claim(user) => {
                            if let Ok(result) = rewards.claim(&user_id(user), "Nova").await {
                                if result.status == ClaimStatus::Sent {
                                    *credited.entry(user_id(user)).or_default() += result.amount;
                                }
                            }
                        }
                        Step::Referral(user) => {
                            let _ = rewards.referral(&user_id(user), "Nova").await;
                        }
                        Step::Ledger { wallets, claims, mining } => {
                            ledger.set_wallets(wallets);
                            ledger.set_claims(claims);
                            ledger.set_mining(mining);
                        }
                    }

                    for record in store.records().await.unwrap() {
                        let now = (
                            record.mining_count,
                            record.referral_count,
                            record.total_rewards_earned,
                        );
                        if let Some(before) = seen.insert(record.id.clone(), now) {
                            prop_assert!(
                                now.0 >= before.0 && now.1 >= before.1 && now.2 >= before.2,
                                "counters of {} went from {:?} to {:?}",
                                record.id,
                                before,
                                now
                            );
                        }
                    }
                }

                for record in store.records().await.unwrap() {
                    let expected = credited.get(&record.id).copied().unwrap_or_default();
                    prop_assert_eq!(record.total_rewards_earned, expected);
                }
                Ok::<(), TestCaseError>(())
            })?;
        }
    }
}
