pub mod client;

pub use client::{Client, DEFAULT_TIMEOUT};
use thiserror::Error;

/// Error type for ledger client operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("failed: {0}")]
    Failed(reqwest::StatusCode),
    #[error("ledger returned no wallet address")]
    MissingAddress,
    #[error("unexpected response")]
    UnexpectedResponse,
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid URL scheme: {0} (expected http or https)")]
    InvalidScheme(String),
}

impl Error {
    /// Whether the request timed out before the ledger answered.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Reqwest(err) if err.is_timeout())
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
