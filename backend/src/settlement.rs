use crate::{
    ledger::Ledger,
    metrics::Metrics,
    reward::RewardEngine,
    store::{register, UserStore},
    wallet::WalletProvisioner,
    Result,
};
use quantum_types::{ClaimResult, ClaimStatus};
use rand::Rng;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const DEFAULT_CLAIM_NOTE: &str = "Telegram reward transfer";

/// Turns a computed reward grant into a ledger transfer for one user.
///
/// Each claim is a single attempt. Local totals move only after the ledger accepts
/// the transfer, so a declined or unreachable ledger never results in partial
/// credit. An acceptance whose acknowledgment is lost in transit is reported as
/// [ClaimStatus::Unreachable] and leaves local totals below the ledger's.
///
/// Besides the three statuses, a claim can fail outright with
/// [crate::Error::WalletUnavailable] when no wallet can be provisioned. Nothing is
/// computed or submitted in that case, and the HTTP surface answers 503.
pub struct ClaimSettlement<S, L, R> {
    store: Arc<S>,
    ledger: Arc<L>,
    wallets: WalletProvisioner<S, L>,
    engine: Arc<RewardEngine<R>>,
    metrics: Arc<Metrics>,
    note: String,
}

impl<S: UserStore, L: Ledger, R: Rng + Send> ClaimSettlement<S, L, R> {
    pub fn new(
        store: Arc<S>,
        ledger: Arc<L>,
        wallets: WalletProvisioner<S, L>,
        engine: Arc<RewardEngine<R>>,
        metrics: Arc<Metrics>,
        note: impl Into<String>,
    ) -> Self {
        Self {
            store,
            ledger,
            wallets,
            engine,
            metrics,
            note: note.into(),
        }
    }

    /// Settle one claim for `id`.
    ///
    /// Fails with [crate::Error::WalletUnavailable] before anything is submitted when
    /// no wallet can be provisioned.
    pub async fn claim(&self, id: &str, name: &str, now: u64) -> Result<ClaimResult> {
        register(self.store.as_ref(), id, name, now).await?;
        let address = self.wallets.provision(id).await?;
        let grant = self.engine.compute_claim_reward();
        let amount = grant.total_amount();
        let claim_id = Uuid::new_v4().to_string();
        let note = format!("{} ({claim_id})", self.note);

        let status = match self.ledger.submit_reward(&address, amount, &note).await {
            Ok(true) => {
                self.metrics.inc_claim_sent(amount);
                info!(user = id, %address, amount, %claim_id, "claim sent");
                if let Err(err) = self.store.add_rewards(id, amount).await {
                    error!(
                        user = id,
                        amount,
                        %claim_id,
                        "Ledger accepted claim but local credit failed: {err}"
                    );
                }
                ClaimStatus::Sent
            }
            Ok(false) => {
                self.metrics.inc_claim_rejected();
                warn!(user = id, %address, amount, %claim_id, "claim rejected by ledger");
                ClaimStatus::Rejected
            }
            Err(err) => {
                self.metrics.inc_claim_unreachable();
                warn!(user = id, %address, amount, %claim_id, "Claim submission failed: {err}");
                ClaimStatus::Unreachable
            }
        };

        Ok(ClaimResult {
            claim_id,
            status,
            amount,
            address,
            grant,
        })
    }
}
