//! Record store backends.
//!
//! The store is the only shared mutable resource in the service, so every
//! mutation must be atomic per identifier: concurrent postback retries for
//! the same user race on read-modify-write otherwise. The redis backend
//! leans on per-key hash primitives (`HSETNX`, `HINCRBY`) and a guarded Lua
//! script; the in-memory backend serializes through a single mutex.

mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use predictor_types::DepositRecord;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("corrupt record for {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Outcome of a repeat-deposit write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RedepositWrite {
    /// Counter incremented by exactly one; the post-increment record.
    Applied(DepositRecord),
    /// No record exists for the identifier. A repeat deposit before any
    /// registration is a data-integrity anomaly and is rejected rather
    /// than auto-created.
    NoRecord,
}

/// A configured record store backend.
pub enum Store {
    Redis(RedisStore),
    Memory(MemoryStore),
}

impl Store {
    /// Create the record if absent. Returns the record and whether it was
    /// created by this call.
    pub async fn ensure_registered(&self, id: &str) -> Result<(DepositRecord, bool)> {
        match self {
            Store::Redis(store) => store.ensure_registered(id).await,
            Store::Memory(store) => store.ensure_registered(id).await,
        }
    }

    /// Set `has_first_deposit`, creating the record if absent. Returns the
    /// record and whether the flag was newly set. Idempotent: the flag is
    /// never unset, so replays report `false` and change nothing.
    pub async fn mark_first_deposit(&self, id: &str) -> Result<(DepositRecord, bool)> {
        match self {
            Store::Redis(store) => store.mark_first_deposit(id).await,
            Store::Memory(store) => store.mark_first_deposit(id).await,
        }
    }

    /// Atomically increment the redeposit counter if a record exists.
    pub async fn record_redeposit(&self, id: &str) -> Result<RedepositWrite> {
        match self {
            Store::Redis(store) => store.record_redeposit(id).await,
            Store::Memory(store) => store.record_redeposit(id).await,
        }
    }

    /// Pure read; never mutates the store.
    pub async fn fetch(&self, id: &str) -> Result<Option<DepositRecord>> {
        match self {
            Store::Redis(store) => store.fetch(id).await,
            Store::Memory(store) => store.fetch(id).await,
        }
    }
}
