use crate::{Error, Result};
use quantum_types::api::{
    Balance, ClaimRequest, ClaimResponse, MineRequest, MineResponse, NewWallet,
};
use reqwest::Client as HttpClient;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Timeout applied to every ledger request unless overridden.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for the ledger service.
///
/// Every call is a single attempt bounded by the configured timeout. Retrying is
/// left to the caller.
#[derive(Clone)]
pub struct Client {
    base: Url,
    http: HttpClient,
}

impl Client {
    pub fn new(base: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base)?;
        match base.scheme() {
            "http" | "https" => {}
            scheme => return Err(Error::InvalidScheme(scheme.to_string())),
        }
        if base.cannot_be_a_base() {
            return Err(Error::InvalidScheme(base.to_string()));
        }
        let http = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self { base, http })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidScheme(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Request a fresh wallet address.
    pub async fn create_wallet(&self) -> Result<String> {
        let url = self.endpoint(&["wallet", "new"])?;
        let response = self.http.post(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Failed(status));
        }
        let body: NewWallet = response.json().await?;
        match body.address.map(|address| address.trim().to_string()) {
            Some(address) if !address.is_empty() => {
                debug!(%address, "ledger created wallet");
                Ok(address)
            }
            _ => Err(Error::MissingAddress),
        }
    }

    /// Query the balance held by `address`.
    pub async fn balance(&self, address: &str) -> Result<f64> {
        let url = self.endpoint(&["wallet", "balance", address])?;
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Failed(status));
        }
        let body: Balance = response.json().await?;
        if !body.balance.is_finite() {
            return Err(Error::UnexpectedResponse);
        }
        Ok(body.balance)
    }

    /// Submit a reward transfer. Returns whether the ledger accepted it.
    ///
    /// A non-success status means the ledger answered and declined, so it maps to
    /// `Ok(false)`; only transport and decoding failures are errors.
    pub async fn submit_reward(&self, address: &str, amount: u64, note: &str) -> Result<bool> {
        let url = self.endpoint(&["wallet", "claim"])?;
        let request = ClaimRequest {
            address: address.to_string(),
            amount,
            note: note.to_string(),
        };
        let response = self.http.post(url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            debug!(%status, address, amount, "ledger declined claim");
            return Ok(false);
        }
        let body: ClaimResponse = response.json().await?;
        Ok(body.success)
    }

    /// Ask the ledger to mine a block crediting `address`.
    pub async fn mine(&self, address: &str) -> Result<MineResponse> {
        let url = self.endpoint(&["mine"])?;
        let request = MineRequest {
            address: address.to_string(),
        };
        let response = self.http.post(url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Ok(MineResponse::declined(format!("HTTP {}", status.as_u16())));
        }
        Ok(response.json().await?)
    }
}
