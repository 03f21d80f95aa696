use crate::{
    ledger::Ledger,
    metrics::Metrics,
    reward::RewardEngine,
    store::{register, UserStore},
    wallet::WalletProvisioner,
    Error, Result,
};
use quantum_types::MineOutcome;
use rand::Rng;
use std::sync::Arc;
use tracing::{info, warn};

/// Block hash reported when the ledger omits one.
pub const UNKNOWN_BLOCK_HASH: &str = "unknown";

/// Mining attempts against the ledger on behalf of a user's wallet.
pub struct Miner<S, L, R> {
    store: Arc<S>,
    ledger: Arc<L>,
    wallets: WalletProvisioner<S, L>,
    engine: Arc<RewardEngine<R>>,
    metrics: Arc<Metrics>,
}

impl<S: UserStore, L: Ledger, R: Rng + Send> Miner<S, L, R> {
    pub fn new(
        store: Arc<S>,
        ledger: Arc<L>,
        wallets: WalletProvisioner<S, L>,
        engine: Arc<RewardEngine<R>>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            ledger,
            wallets,
            engine,
            metrics,
        }
    }

    /// Trigger one mining attempt. The mining count moves only once the ledger
    /// reports a found block.
    pub async fn mine(&self, id: &str, name: &str, now: u64) -> Result<MineOutcome> {
        register(self.store.as_ref(), id, name, now).await?;
        let address = self.wallets.provision(id).await?;

        let response = match self.ledger.trigger_mine(&address).await {
            Ok(response) => response,
            Err(err) => {
                self.metrics.inc_mine_failed();
                warn!(user = id, %address, "Mining request failed: {err}");
                return Err(Error::Unreachable(err.to_string()));
            }
        };
        if !response.success {
            self.metrics.inc_mine_failed();
            let message = response
                .message
                .unwrap_or_else(|| "mining attempt declined".to_string());
            warn!(user = id, %address, %message, "mining declined by ledger");
            return Err(Error::Rejected(message));
        }

        let mining_count = self.store.increment_mining_count(id).await?;
        self.metrics.inc_mine_found();
        let reward = response
            .reward
            .unwrap_or(self.engine.config().base_reward as f64);
        let block_hash = response
            .block_hash
            .unwrap_or_else(|| UNKNOWN_BLOCK_HASH.to_string());
        let collectible = self.engine.mining_collectible();
        info!(user = id, %address, reward, %block_hash, mining_count, "block mined");

        Ok(MineOutcome {
            address,
            reward,
            block_hash,
            collectible,
            mining_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Behavior, MockLedger};
    use crate::reward::{RewardConfig, DEFAULT_BASE_REWARD};
    use crate::store::Memory;
    use quantum_types::api::MineResponse;
    use rand::rngs::mock::StepRng;

    fn miner(rng: StepRng) -> (Arc<Memory>, Arc<MockLedger>, Miner<Memory, MockLedger, StepRng>) {
        let store = Arc::new(Memory::new());
        let ledger = Arc::new(MockLedger::new());
        let metrics = Arc::new(Metrics::default());
        let wallets = WalletProvisioner::new(store.clone(), ledger.clone(), metrics.clone());
        let engine = Arc::new(RewardEngine::new(RewardConfig::default(), rng));
        let miner = Miner::new(store.clone(), ledger.clone(), wallets, engine, metrics);
        (store, ledger, miner)
    }

    async fn mining_count(store: &Memory, id: &str) -> u64 {
        store.record(id).await.unwrap().unwrap().mining_count
    }

    #[tokio::test]
    async fn found_block_counts() {
        let (store, ledger, miner) = miner(StepRng::new(u64::MAX, 0));
        let outcome = miner.mine("42", "Nova", 1_000).await.unwrap();
        assert_eq!(outcome.mining_count, 1);
        assert_eq!(outcome.reward, 50.0);
        assert_eq!(outcome.collectible, None);
        assert_eq!(ledger.mine_calls(), 1);

        let outcome = miner.mine("42", "Nova", 1_001).await.unwrap();
        assert_eq!(outcome.mining_count, 2);
        assert_eq!(mining_count(&store, "42").await, 2);
    }

    #[tokio::test]
    async fn missing_fields_fall_back() {
        let (_, ledger, miner) = miner(StepRng::new(0, 0));
        ledger.set_mine_response(MineResponse {
            success: true,
            ..MineResponse::default()
        });
        let outcome = miner.mine("42", "Nova", 1_000).await.unwrap();
        assert_eq!(outcome.reward, DEFAULT_BASE_REWARD as f64);
        assert_eq!(outcome.block_hash, UNKNOWN_BLOCK_HASH);
        assert_eq!(outcome.collectible.as_deref(), Some("Galaxy Map"));
    }

    #[tokio::test]
    async fn declined_mine_does_not_count() {
        let (store, ledger, miner) = miner(StepRng::new(u64::MAX, 0));
        ledger.set_mining(Behavior::Decline);
        let err = miner.mine("42", "Nova", 1_000).await.unwrap_err();
        assert!(matches!(err, Error::Rejected(ref message) if message == "no block found"));
        assert_eq!(mining_count(&store, "42").await, 0);
    }

    #[tokio::test]
    async fn unreachable_ledger_does_not_count() {
        let (store, ledger, miner) = miner(StepRng::new(u64::MAX, 0));
        ledger.set_mining(Behavior::Unreachable);
        let err = miner.mine("42", "Nova", 1_000).await.unwrap_err();
        assert!(matches!(err, Error::Unreachable(_)));
        assert_eq!(mining_count(&store, "42").await, 0);
    }

    #[tokio::test]
    async fn missing_wallet_skips_the_ledger() {
        let (_, ledger, miner) = miner(StepRng::new(u64::MAX, 0));
        ledger.set_wallets(Behavior::Decline);
        let err = miner.mine("42", "Nova", 1_000).await.unwrap_err();
        assert!(matches!(err, Error::WalletUnavailable(_)));
        assert_eq!(ledger.mine_calls(), 0);
    }
}
