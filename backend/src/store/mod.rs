//! Per-user records and the set of known users.

use quantum_types::{FieldError, UserRecord};
use std::future::Future;
use thiserror::Error;

#[cfg(any(test, feature = "mocks"))]
mod memory;
mod redis_store;

#[cfg(any(test, feature = "mocks"))]
pub use memory::Memory;
pub use redis_store::RedisStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("unknown user: {0}")]
    UnknownUser(String),
    #[error("corrupt record for user {id}: {source}")]
    Corrupt {
        id: String,
        #[source]
        source: FieldError,
    },
    #[error("store unavailable")]
    Unavailable,
}

/// Shared, concurrently accessed user storage.
///
/// Every mutation is a single atomic operation on the backing store; callers never
/// read-modify-write a field themselves.
pub trait UserStore: Send + Sync + 'static {
    /// Create the record for `id` (and add it to the user set) if it does not exist.
    ///
    /// For an existing record only `last_active` moves, and never backwards. Returns
    /// whether the record was created by this call.
    fn ensure_user(
        &self,
        id: &str,
        name: &str,
        now: u64,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Overwrite the display name of an existing record.
    fn set_name(&self, id: &str, name: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn wallet_address(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Store `address` unless a wallet is already set. Returns whether it was stored.
    fn set_wallet_address(
        &self,
        id: &str,
        address: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Returns the new mining count.
    fn increment_mining_count(&self, id: &str)
        -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Returns the new referral count.
    fn increment_referral_count(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Returns the new reward total.
    fn add_rewards(&self, id: &str, amount: u64)
        -> impl Future<Output = Result<u64, StoreError>> + Send;

    fn record(&self, id: &str) -> impl Future<Output = Result<Option<UserRecord>, StoreError>> + Send;

    /// Snapshot of every known user id.
    fn user_ids(&self) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;

    fn user_count(&self) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Snapshot of every stored record, skipping ids whose record is missing or unreadable.
    fn records(&self) -> impl Future<Output = Result<Vec<UserRecord>, StoreError>> + Send;
}

/// Record an interaction: create the user if needed and refresh the display name.
///
/// Returns whether the user was created.
pub async fn register<S: UserStore>(
    store: &S,
    id: &str,
    name: &str,
    now: u64,
) -> Result<bool, StoreError> {
    let created = store.ensure_user(id, name, now).await?;
    if !created {
        store.set_name(id, name).await?;
    }
    Ok(created)
}
