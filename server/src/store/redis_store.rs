use super::{RedepositWrite, Result, StoreError};
use predictor_types::DepositRecord;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use tokio::sync::Mutex;

const FIELD_FIRST_DEPOSIT: &str = "firstDeposit";
const FIELD_REDEPOSITS: &str = "redeposits";

// Creates the hash when absent and reports whether this call created it.
const ENSURE_REGISTERED: &str = r"
local created = redis.call('HSETNX', KEYS[1], 'firstDeposit', 0)
redis.call('HSETNX', KEYS[1], 'redeposits', 0)
local fd = tonumber(redis.call('HGET', KEYS[1], 'firstDeposit')) or 0
local count = tonumber(redis.call('HGET', KEYS[1], 'redeposits')) or 0
return {created, fd, count}
";

// Conditional set: the flag only ever goes false -> true.
const MARK_FIRST_DEPOSIT: &str = r"
redis.call('HSETNX', KEYS[1], 'redeposits', 0)
local prev = tonumber(redis.call('HGET', KEYS[1], 'firstDeposit')) or 0
redis.call('HSET', KEYS[1], 'firstDeposit', 1)
local count = tonumber(redis.call('HGET', KEYS[1], 'redeposits')) or 0
if prev == 1 then return {0, count} else return {1, count} end
";

// Exists-guarded increment so a repeat deposit can never conjure a record.
const RECORD_REDEPOSIT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 0 then return {-1, -1} end
local count = redis.call('HINCRBY', KEYS[1], 'redeposits', 1)
local fd = tonumber(redis.call('HGET', KEYS[1], 'firstDeposit')) or 0
return {fd, count}
";

/// Redis-backed record store: one hash per user under `{prefix}{id}`.
///
/// The connection manager is created lazily and dropped on command failure
/// so the next request reconnects instead of reusing a dead connection.
pub struct RedisStore {
    client: redis::Client,
    connection: Mutex<Option<ConnectionManager>>,
    prefix: String,
    ensure_registered: redis::Script,
    mark_first_deposit: redis::Script,
    record_redeposit: redis::Script,
}

impl RedisStore {
    pub fn new(url: &str, prefix: String) -> std::result::Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            client,
            connection: Mutex::new(None),
            prefix,
            ensure_registered: redis::Script::new(ENSURE_REGISTERED),
            mark_first_deposit: redis::Script::new(MARK_FIRST_DEPOSIT),
            record_redeposit: redis::Script::new(RECORD_REDEPOSIT),
        })
    }

    fn key(&self, id: &str) -> String {
        format!("{}{}", self.prefix, id)
    }

    async fn connection(&self) -> Result<ConnectionManager> {
        let mut guard = self.connection.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self.client.get_connection_manager().await?;
        *guard = Some(conn.clone());
        Ok(conn)
    }

    async fn invalidate(&self) {
        *self.connection.lock().await = None;
    }

    async fn run_script<T: redis::FromRedisValue>(
        &self,
        script: &redis::Script,
        id: &str,
    ) -> Result<T> {
        let mut conn = self.connection().await?;
        match script.key(self.key(id)).invoke_async(&mut conn).await {
            Ok(value) => Ok(value),
            Err(err) => {
                self.invalidate().await;
                Err(err.into())
            }
        }
    }

    pub async fn ensure_registered(&self, id: &str) -> Result<(DepositRecord, bool)> {
        let (created, fd, count): (i64, i64, i64) =
            self.run_script(&self.ensure_registered, id).await?;
        Ok((
            DepositRecord {
                id: id.to_string(),
                has_first_deposit: fd == 1,
                redeposit_count: count.max(0) as u64,
            },
            created == 1,
        ))
    }

    pub async fn mark_first_deposit(&self, id: &str) -> Result<(DepositRecord, bool)> {
        let (newly_set, count): (i64, i64) =
            self.run_script(&self.mark_first_deposit, id).await?;
        Ok((
            DepositRecord {
                id: id.to_string(),
                has_first_deposit: true,
                redeposit_count: count.max(0) as u64,
            },
            newly_set == 1,
        ))
    }

    pub async fn record_redeposit(&self, id: &str) -> Result<RedepositWrite> {
        let (fd, count): (i64, i64) = self.run_script(&self.record_redeposit, id).await?;
        if count < 0 {
            return Ok(RedepositWrite::NoRecord);
        }
        Ok(RedepositWrite::Applied(DepositRecord {
            id: id.to_string(),
            has_first_deposit: fd == 1,
            redeposit_count: count as u64,
        }))
    }

    pub async fn fetch(&self, id: &str) -> Result<Option<DepositRecord>> {
        let mut conn = self.connection().await?;
        let fields: HashMap<String, String> = match conn.hgetall(self.key(id)).await {
            Ok(fields) => fields,
            Err(err) => {
                self.invalidate().await;
                return Err(err.into());
            }
        };
        if fields.is_empty() {
            return Ok(None);
        }
        let has_first_deposit = fields
            .get(FIELD_FIRST_DEPOSIT)
            .map(|value| value == "1")
            .unwrap_or(false);
        let redeposit_count = match fields.get(FIELD_REDEPOSITS) {
            Some(raw) => raw.parse::<u64>().map_err(|_| StoreError::Corrupt {
                id: id.to_string(),
                reason: format!("non-numeric redeposit counter: {raw}"),
            })?,
            None => 0,
        };
        Ok(Some(DepositRecord {
            id: id.to_string(),
            has_first_deposit,
            redeposit_count,
        }))
    }
}
