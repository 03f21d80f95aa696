use super::{StoreError, UserStore};
use quantum_types::UserRecord;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Default)]
struct Inner {
    records: HashMap<String, UserRecord>,
    order: Vec<String>,
}

/// In-memory [UserStore] for tests.
#[derive(Default)]
pub struct Memory {
    inner: Mutex<Inner>,
    unavailable: AtomicBool,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with [StoreError::Unavailable].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        Ok(())
    }

    fn update<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut UserRecord) -> T,
    ) -> Result<T, StoreError> {
        self.check()?;
        let mut inner = self.inner.lock().unwrap();
        let record = inner
            .records
            .get_mut(id)
            .ok_or_else(|| StoreError::UnknownUser(id.to_string()))?;
        Ok(f(record))
    }
}

impl UserStore for Memory {
    async fn ensure_user(&self, id: &str, name: &str, now: u64) -> Result<bool, StoreError> {
        self.check()?;
        let mut inner = self.inner.lock().unwrap();
        if let Some(record) = inner.records.get_mut(id) {
            record.last_active_at = record.last_active_at.max(now);
            return Ok(false);
        }
        inner
            .records
            .insert(id.to_string(), UserRecord::new(id, name, now));
        inner.order.push(id.to_string());
        Ok(true)
    }

    async fn set_name(&self, id: &str, name: &str) -> Result<(), StoreError> {
        self.update(id, |record| record.name = name.to_string())
    }

    async fn wallet_address(&self, id: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .records
            .get(id)
            .and_then(|record| record.wallet_address.clone()))
    }

    async fn set_wallet_address(&self, id: &str, address: &str) -> Result<bool, StoreError> {
        self.update(id, |record| {
            if record.wallet_address.is_some() {
                return false;
            }
            record.wallet_address = Some(address.to_string());
            true
        })
    }

    async fn increment_mining_count(&self, id: &str) -> Result<u64, StoreError> {
        self.update(id, |record| {
            record.mining_count = record.mining_count.saturating_add(1);
            record.mining_count
        })
    }

    async fn increment_referral_count(&self, id: &str) -> Result<u64, StoreError> {
        self.update(id, |record| {
            record.referral_count = record.referral_count.saturating_add(1);
            record.referral_count
        })
    }

    async fn add_rewards(&self, id: &str, amount: u64) -> Result<u64, StoreError> {
        self.update(id, |record| {
            record.total_rewards_earned = record.total_rewards_earned.saturating_add(amount);
            record.total_rewards_earned
        })
    }

    async fn record(&self, id: &str) -> Result<Option<UserRecord>, StoreError> {
        self.check()?;
        Ok(self.inner.lock().unwrap().records.get(id).cloned())
    }

    async fn user_ids(&self) -> Result<Vec<String>, StoreError> {
        self.check()?;
        Ok(self.inner.lock().unwrap().order.clone())
    }

    async fn user_count(&self) -> Result<u64, StoreError> {
        self.check()?;
        Ok(self.inner.lock().unwrap().order.len() as u64)
    }

    async fn records(&self) -> Result<Vec<UserRecord>, StoreError> {
        self.check()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.records.get(id).cloned())
            .collect())
    }
}
