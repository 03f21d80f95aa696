use crate::store::StoreError;
use thiserror::Error;

/// Failure kinds surfaced by the reward workflows.
#[derive(Debug, Error)]
pub enum Error {
    /// The ledger could not be reached, timed out, or answered with garbage.
    #[error("ledger unreachable: {0}")]
    Unreachable(String),
    /// The ledger answered but declined the request.
    #[error("ledger rejected request: {0}")]
    Rejected(String),
    #[error("user not found: {0}")]
    NotFound(String),
    /// No wallet address could be obtained for the user.
    #[error("wallet unavailable for user {0}")]
    WalletUnavailable(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl Error {
    /// Stable identifier for the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Unreachable(_) => "unreachable",
            Error::Rejected(_) => "rejected",
            Error::NotFound(_) => "not_found",
            Error::WalletUnavailable(_) => "wallet_unavailable",
            Error::Store(_) => "store",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
