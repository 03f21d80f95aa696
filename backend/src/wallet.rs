use crate::{ledger::Ledger, metrics::Metrics, store::UserStore, Error, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Obtains and durably associates at most one ledger wallet per user.
pub struct WalletProvisioner<S, L> {
    store: Arc<S>,
    ledger: Arc<L>,
    metrics: Arc<Metrics>,
}

impl<S, L> Clone for WalletProvisioner<S, L> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            ledger: self.ledger.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl<S: UserStore, L: Ledger> WalletProvisioner<S, L> {
    pub fn new(store: Arc<S>, ledger: Arc<L>, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            ledger,
            metrics,
        }
    }

    /// Return the wallet of `id`, creating one on the ledger if none is stored.
    ///
    /// Concurrent calls for the same user all return the single stored address. A
    /// wallet created by a call that loses the race is left unused on the ledger.
    pub async fn provision(&self, id: &str) -> Result<String> {
        if let Some(address) = self.store.wallet_address(id).await? {
            return Ok(address);
        }

        let created = match self.ledger.create_wallet().await {
            Ok(address) => address,
            Err(err) => {
                self.metrics.inc_wallet_failure();
                warn!(user = id, "Wallet creation failed: {err}");
                return Err(Error::WalletUnavailable(id.to_string()));
            }
        };
        self.metrics.inc_wallet_created();

        if self.store.set_wallet_address(id, &created).await? {
            info!(user = id, address = %created, "wallet provisioned");
            return Ok(created);
        }

        self.metrics.inc_wallet_race_lost();
        match self.store.wallet_address(id).await? {
            Some(stored) => {
                warn!(
                    user = id,
                    orphaned = %created,
                    address = %stored,
                    "wallet already provisioned concurrently, discarding new address"
                );
                Ok(stored)
            }
            None => Err(Error::WalletUnavailable(id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Behavior, MockLedger};
    use crate::store::{register, Memory};
    use std::collections::HashSet;

    async fn setup(id: &str) -> (Arc<Memory>, Arc<MockLedger>, WalletProvisioner<Memory, MockLedger>) {
        let store = Arc::new(Memory::new());
        let ledger = Arc::new(MockLedger::new());
        register(store.as_ref(), id, "Nova", 1_000).await.unwrap();
        let provisioner =
            WalletProvisioner::new(store.clone(), ledger.clone(), Arc::new(Metrics::default()));
        (store, ledger, provisioner)
    }

    #[tokio::test]
    async fn provisioning_is_idempotent() {
        let (store, ledger, provisioner) = setup("42").await;
        let first = provisioner.provision("42").await.unwrap();
        let second = provisioner.provision("42").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(ledger.wallets_created(), 1);
        assert_eq!(store.wallet_address("42").await.unwrap(), Some(first));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_provisioning_stores_one_wallet() {
        let (store, ledger, provisioner) = setup("7").await;
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let provisioner = provisioner.clone();
                tokio::spawn(async move { provisioner.provision("7").await })
            })
            .collect();

        let mut addresses = HashSet::new();
        for handle in handles {
            addresses.insert(handle.await.unwrap().unwrap());
        }
        assert_eq!(addresses.len(), 1);
        let stored = store.wallet_address("7").await.unwrap().unwrap();
        assert!(addresses.contains(&stored));
        assert!(ledger.wallets_created() >= 1);

        let snapshot = provisioner.metrics.snapshot();
        assert_eq!(
            snapshot.wallets_created,
            snapshot.wallet_races_lost + 1,
            "every created wallet but one lost the race"
        );
    }

    #[tokio::test]
    async fn ledger_failure_leaves_user_without_wallet() {
        let (store, ledger, provisioner) = setup("42").await;
        ledger.set_wallets(Behavior::Unreachable);
        let err = provisioner.provision("42").await.unwrap_err();
        assert!(matches!(err, Error::WalletUnavailable(ref id) if id == "42"));
        assert_eq!(store.wallet_address("42").await.unwrap(), None);
        assert_eq!(provisioner.metrics.snapshot().wallet_failures, 1);

        ledger.set_wallets(Behavior::Accept);
        assert!(provisioner.provision("42").await.is_ok());
    }

    #[tokio::test]
    async fn stored_wallet_skips_the_ledger() {
        let (store, ledger, provisioner) = setup("42").await;
        store.set_wallet_address("42", "qc1existing").await.unwrap();
        ledger.set_wallets(Behavior::Unreachable);
        assert_eq!(provisioner.provision("42").await.unwrap(), "qc1existing");
        assert_eq!(ledger.wallets_created(), 0);
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let (store, _, provisioner) = setup("42").await;
        store.set_unavailable(true);
        let err = provisioner.provision("42").await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }
}
