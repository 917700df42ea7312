use super::{RedepositWrite, Result};
use predictor_types::DepositRecord;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// In-memory backend for local runs and tests. The single mutex serializes
/// every read-modify-write, which matches the atomicity the redis backend
/// gets from per-key hash operations.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, DepositRecord>>,
}

impl MemoryStore {
    pub async fn ensure_registered(&self, id: &str) -> Result<(DepositRecord, bool)> {
        let mut records = self.records.lock().await;
        match records.get(id) {
            Some(record) => Ok((record.clone(), false)),
            None => {
                let record = DepositRecord::new(id);
                records.insert(id.to_string(), record.clone());
                Ok((record, true))
            }
        }
    }

    pub async fn mark_first_deposit(&self, id: &str) -> Result<(DepositRecord, bool)> {
        let mut records = self.records.lock().await;
        let record = records
            .entry(id.to_string())
            .or_insert_with(|| DepositRecord::new(id));
        let newly_set = !record.has_first_deposit;
        record.has_first_deposit = true;
        Ok((record.clone(), newly_set))
    }

    pub async fn record_redeposit(&self, id: &str) -> Result<RedepositWrite> {
        let mut records = self.records.lock().await;
        match records.get_mut(id) {
            Some(record) => {
                record.redeposit_count += 1;
                Ok(RedepositWrite::Applied(record.clone()))
            }
            None => Ok(RedepositWrite::NoRecord),
        }
    }

    pub async fn fetch(&self, id: &str) -> Result<Option<DepositRecord>> {
        Ok(self.records.lock().await.get(id).cloned())
    }
}
