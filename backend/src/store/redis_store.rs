use super::{StoreError, UserStore};
use quantum_types::user::{
    user_key, FIELD_MINING_COUNT, FIELD_NAME, FIELD_REFERRAL_COUNT, FIELD_TOTAL_EARNED,
    FIELD_WALLET, USERS_KEY,
};
use quantum_types::UserRecord;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisResult, Script};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Creates the record and joins the user set in one step, or bumps `last_active`
/// (monotonically) when the record already exists.
const ENSURE_USER: &str = r#"
local now = tonumber(ARGV[2])
if redis.call('EXISTS', KEYS[1]) == 0 then
  redis.call('HSET', KEYS[1],
    'name', ARGV[1],
    'joined_at', now,
    'last_active', now,
    'mining_count', 0,
    'referral_count', 0,
    'total_qc_earned', 0)
  redis.call('SADD', KEYS[2], ARGV[3])
  return 1
end
local last = tonumber(redis.call('HGET', KEYS[1], 'last_active') or '0') or 0
if now > last then
  redis.call('HSET', KEYS[1], 'last_active', now)
end
return 0
"#;

/// Increments a counter of an existing record; -1 when the record is missing.
const INCREMENT_FIELD: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
  return -1
end
return redis.call('HINCRBY', KEYS[1], ARGV[1], ARGV[2])
"#;

/// Sets a field only when the record exists and the field is unset or empty.
/// Returns -1 for a missing record, 1 when stored, 0 when already set.
const SET_ONCE: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
  return -1
end
local current = redis.call('HGET', KEYS[1], ARGV[1])
if current and current ~= '' then
  return 0
end
redis.call('HSET', KEYS[1], ARGV[1], ARGV[2])
return 1
"#;

/// Overwrites a field of an existing record; -1 when the record is missing.
const SET_EXISTING: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
  return -1
end
redis.call('HSET', KEYS[1], ARGV[1], ARGV[2])
return 1
"#;

/// [UserStore] backed by Redis hashes (`user:<id>`) and a `users` set.
pub struct RedisStore {
    client: redis::Client,
    connection: Mutex<Option<ConnectionManager>>,
    prefix: String,
    ensure_user: Script,
    increment_field: Script,
    set_once: Script,
    set_existing: Script,
}

impl RedisStore {
    pub fn new(url: &str, prefix: String) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            client,
            connection: Mutex::new(None),
            prefix,
            ensure_user: Script::new(ENSURE_USER),
            increment_field: Script::new(INCREMENT_FIELD),
            set_once: Script::new(SET_ONCE),
            set_existing: Script::new(SET_EXISTING),
        })
    }

    fn user_key(&self, id: &str) -> String {
        format!("{}{}", self.prefix, user_key(id))
    }

    fn users_key(&self) -> String {
        format!("{}{}", self.prefix, USERS_KEY)
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        let mut guard = self.connection.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self.client.get_connection_manager().await?;
        *guard = Some(conn.clone());
        Ok(conn)
    }

    /// Drop the cached connection after a connection-level failure so the next call
    /// dials again.
    async fn check<T>(&self, result: RedisResult<T>) -> Result<T, StoreError> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                if err.is_connection_dropped() || err.is_io_error() || err.is_timeout() {
                    tracing::warn!("Redis store connection failed: {err}");
                    *self.connection.lock().await = None;
                }
                Err(err.into())
            }
        }
    }

    async fn increment(&self, id: &str, field: &str, by: u64) -> Result<u64, StoreError> {
        let mut conn = self.connection().await?;
        let result: RedisResult<i64> = self
            .increment_field
            .key(self.user_key(id))
            .arg(field)
            .arg(by)
            .invoke_async(&mut conn)
            .await;
        let value = self.check(result).await?;
        u64::try_from(value).map_err(|_| StoreError::UnknownUser(id.to_string()))
    }

    fn parse(id: &str, fields: &HashMap<String, String>) -> Result<UserRecord, StoreError> {
        UserRecord::from_fields(id, fields).map_err(|source| StoreError::Corrupt {
            id: id.to_string(),
            source,
        })
    }
}

/// Parse a full scan, skipping members without a record and corrupt hashes.
fn collect_records(ids: &[String], hashes: &[HashMap<String, String>]) -> Vec<UserRecord> {
    let mut records = Vec::with_capacity(ids.len());
    for (id, fields) in ids.iter().zip(hashes.iter()) {
        if fields.is_empty() {
            tracing::warn!(user = %id, "user set member has no record");
            continue;
        }
        match RedisStore::parse(id, fields) {
            Ok(record) => records.push(record),
            Err(err) => tracing::warn!(user = %id, "Skipping unreadable user record: {err}"),
        }
    }
    records
}

impl UserStore for RedisStore {
    async fn ensure_user(&self, id: &str, name: &str, now: u64) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        let result: RedisResult<i64> = self
            .ensure_user
            .key(self.user_key(id))
            .key(self.users_key())
            .arg(name)
            .arg(now)
            .arg(id)
            .invoke_async(&mut conn)
            .await;
        Ok(self.check(result).await? == 1)
    }

    async fn set_name(&self, id: &str, name: &str) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let result: RedisResult<i64> = self
            .set_existing
            .key(self.user_key(id))
            .arg(FIELD_NAME)
            .arg(name)
            .invoke_async(&mut conn)
            .await;
        match self.check(result).await? {
            -1 => Err(StoreError::UnknownUser(id.to_string())),
            _ => Ok(()),
        }
    }

    async fn wallet_address(&self, id: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection().await?;
        let result: RedisResult<Option<String>> = conn.hget(self.user_key(id), FIELD_WALLET).await;
        Ok(self
            .check(result)
            .await?
            .map(|wallet| wallet.trim().to_string())
            .filter(|wallet| !wallet.is_empty()))
    }

    async fn set_wallet_address(&self, id: &str, address: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        let result: RedisResult<i64> = self
            .set_once
            .key(self.user_key(id))
            .arg(FIELD_WALLET)
            .arg(address)
            .invoke_async(&mut conn)
            .await;
        match self.check(result).await? {
            -1 => Err(StoreError::UnknownUser(id.to_string())),
            stored => Ok(stored == 1),
        }
    }

    async fn increment_mining_count(&self, id: &str) -> Result<u64, StoreError> {
        self.increment(id, FIELD_MINING_COUNT, 1).await
    }

    async fn increment_referral_count(&self, id: &str) -> Result<u64, StoreError> {
        self.increment(id, FIELD_REFERRAL_COUNT, 1).await
    }

    async fn add_rewards(&self, id: &str, amount: u64) -> Result<u64, StoreError> {
        self.increment(id, FIELD_TOTAL_EARNED, amount).await
    }

    async fn record(&self, id: &str) -> Result<Option<UserRecord>, StoreError> {
        let mut conn = self.connection().await?;
        let result: RedisResult<HashMap<String, String>> = conn.hgetall(self.user_key(id)).await;
        let fields = self.check(result).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        Self::parse(id, &fields).map(Some)
    }

    async fn user_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut conn = self.connection().await?;
        let result: RedisResult<Vec<String>> = conn.smembers(self.users_key()).await;
        self.check(result).await
    }

    async fn user_count(&self) -> Result<u64, StoreError> {
        let mut conn = self.connection().await?;
        let result: RedisResult<u64> = conn.scard(self.users_key()).await;
        self.check(result).await
    }

    async fn records(&self) -> Result<Vec<UserRecord>, StoreError> {
        let ids = self.user_ids().await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut pipe = redis::pipe();
        for id in &ids {
            pipe.hgetall(self.user_key(id));
        }
        let mut conn = self.connection().await?;
        let result: RedisResult<Vec<HashMap<String, String>>> = pipe.query_async(&mut conn).await;
        let hashes = self.check(result).await?;
        Ok(collect_records(&ids, &hashes))
    }
}
