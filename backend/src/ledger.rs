//! The ledger service as seen by the reward workflows.

use quantum_types::api::MineResponse;
use std::future::Future;
use tracing::warn;

#[cfg(any(test, feature = "mocks"))]
pub use mock::{Behavior, MockLedger};

/// Trait for interacting with the ledger service.
///
/// Implementations make a single attempt per call and report every transport or
/// protocol failure as `Err`; they never retry.
pub trait Ledger: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Request a fresh wallet address.
    fn create_wallet(&self) -> impl Future<Output = Result<String, Self::Error>> + Send;

    /// Balance held by `address`, or 0 when it cannot be determined.
    fn get_balance(&self, address: &str) -> impl Future<Output = f64> + Send;

    /// Submit a reward transfer. `Ok(false)` means the ledger declined it.
    fn submit_reward(
        &self,
        address: &str,
        amount: u64,
        note: &str,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send;

    /// Trigger a mining attempt crediting `address`.
    fn trigger_mine(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<MineResponse, Self::Error>> + Send;
}

impl Ledger for quantum_client::Client {
    type Error = quantum_client::Error;

    async fn create_wallet(&self) -> Result<String, Self::Error> {
        quantum_client::Client::create_wallet(self).await
    }

    async fn get_balance(&self, address: &str) -> f64 {
        match self.balance(address).await {
            Ok(balance) => balance,
            Err(err) => {
                warn!(address, "Ledger balance query failed, reporting 0: {err}");
                0.0
            }
        }
    }

    async fn submit_reward(&self, address: &str, amount: u64, note: &str) -> Result<bool, Self::Error> {
        quantum_client::Client::submit_reward(self, address, amount, note).await
    }

    async fn trigger_mine(&self, address: &str) -> Result<MineResponse, Self::Error> {
        self.mine(address).await
    }
}

#[cfg(any(test, feature = "mocks"))]
mod mock {
    use super::Ledger;
    use quantum_types::api::{ClaimRequest, MineResponse};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// How the mock answers a class of requests.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub enum Behavior {
        #[default]
        Accept,
        Decline,
        Unreachable,
    }

    /// A mock ledger for testing.
    #[derive(Default)]
    pub struct MockLedger {
        wallets: Mutex<Behavior>,
        balances_behavior: Mutex<Behavior>,
        claims: Mutex<Behavior>,
        mining: Mutex<Behavior>,
        mine_response: Mutex<Option<MineResponse>>,
        balances: Mutex<HashMap<String, f64>>,
        submitted: Mutex<Vec<ClaimRequest>>,
        wallets_created: AtomicUsize,
        mine_calls: AtomicUsize,
    }

    fn unreachable() -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "ledger unreachable")
    }

    impl MockLedger {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_wallets(&self, behavior: Behavior) {
            *self.wallets.lock().unwrap() = behavior;
        }

        pub fn set_balances(&self, behavior: Behavior) {
            *self.balances_behavior.lock().unwrap() = behavior;
        }

        pub fn set_claims(&self, behavior: Behavior) {
            *self.claims.lock().unwrap() = behavior;
        }

        pub fn set_mining(&self, behavior: Behavior) {
            *self.mining.lock().unwrap() = behavior;
        }

        /// Answer accepted mining attempts with `response` instead of the default.
        pub fn set_mine_response(&self, response: MineResponse) {
            *self.mine_response.lock().unwrap() = Some(response);
        }

        pub fn credit(&self, address: &str, amount: f64) {
            *self
                .balances
                .lock()
                .unwrap()
                .entry(address.to_string())
                .or_default() += amount;
        }

        pub fn wallets_created(&self) -> usize {
            self.wallets_created.load(Ordering::SeqCst)
        }

        pub fn mine_calls(&self) -> usize {
            self.mine_calls.load(Ordering::SeqCst)
        }

        /// Every transfer request received, accepted or not.
        pub fn submitted(&self) -> Vec<ClaimRequest> {
            self.submitted.lock().unwrap().clone()
        }
    }

    impl Ledger for MockLedger {
        type Error = std::io::Error;

        async fn create_wallet(&self) -> Result<String, Self::Error> {
            // Give concurrent callers a chance to interleave.
            tokio::task::yield_now().await;
            let behavior = *self.wallets.lock().unwrap();
            match behavior {
                Behavior::Accept => {
                    let n = self.wallets_created.fetch_add(1, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    Ok(format!("qc1mock{n:04}"))
                }
                Behavior::Decline => Err(std::io::Error::other("ledger returned no address")),
                Behavior::Unreachable => Err(unreachable()),
            }
        }

        async fn get_balance(&self, address: &str) -> f64 {
            let behavior = *self.balances_behavior.lock().unwrap();
            match behavior {
                Behavior::Accept => self
                    .balances
                    .lock()
                    .unwrap()
                    .get(address)
                    .copied()
                    .unwrap_or_default(),
                Behavior::Decline | Behavior::Unreachable => 0.0,
            }
        }

        async fn submit_reward(
            &self,
            address: &str,
            amount: u64,
            note: &str,
        ) -> Result<bool, Self::Error> {
            let behavior = *self.claims.lock().unwrap();
            if behavior == Behavior::Unreachable {
                return Err(unreachable());
            }
            self.submitted.lock().unwrap().push(ClaimRequest {
                address: address.to_string(),
                amount,
                note: note.to_string(),
            });
            if behavior == Behavior::Decline {
                return Ok(false);
            }
            self.credit(address, amount as f64);
            Ok(true)
        }

        async fn trigger_mine(&self, _address: &str) -> Result<MineResponse, Self::Error> {
            let n = self.mine_calls.fetch_add(1, Ordering::SeqCst);
            let behavior = *self.mining.lock().unwrap();
            match behavior {
                Behavior::Accept => {
                    if let Some(response) = self.mine_response.lock().unwrap().clone() {
                        return Ok(response);
                    }
                    Ok(MineResponse {
                        success: true,
                        reward: Some(50.0),
                        block_hash: Some(format!("{n:064x}")),
                        message: None,
                    })
                }
                Behavior::Decline => Ok(MineResponse::declined("no block found")),
                Behavior::Unreachable => Err(unreachable()),
            }
        }
    }
}
