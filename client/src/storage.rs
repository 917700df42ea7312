//! Client-local persistence, modeled on the browser's localStorage:
//! synchronous string key-value with load-at-start, save-on-mutation.
//! Persistence is injected through [`UnlockStorage`] rather than accessed
//! ambiently, so the session state machine stays testable.

use crate::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Storage key layout. The per-user records and the active pointer share a
/// configurable prefix; the attempt-counter map keeps its historical name.
#[derive(Clone, Debug)]
pub struct StorageKeys {
    prefix: String,
}

pub const DEFAULT_PREFIX: &str = "minesPredictor";
const ATTEMPTS_KEY: &str = "loginAttempts";

impl StorageKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn active(&self) -> String {
        format!("{}ActiveUser", self.prefix)
    }

    pub fn user(&self, id: &str) -> String {
        format!("{}User:{id}", self.prefix)
    }

    pub fn attempts(&self) -> &'static str {
        ATTEMPTS_KEY
    }
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

pub trait UnlockStorage {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// Volatile storage for tests and one-shot flows.
#[derive(Default, Debug)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
}

impl UnlockStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// JSON-file-backed storage for the CLI. The whole map is rewritten on every
/// mutation; concurrent writers are last-writer-wins, same as localStorage
/// across tabs.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: HashMap<String, String>,
}

impl FileStorage {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw)?,
            Ok(_) => HashMap::new(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self { path, entries })
    }

    fn flush(&self) -> Result<()> {
        let raw = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

impl UnlockStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_match_original_layout() {
        let keys = StorageKeys::default();
        assert_eq!(keys.active(), "minesPredictorActiveUser");
        assert_eq!(keys.user("p7"), "minesPredictorUser:p7");
        assert_eq!(keys.attempts(), "loginAttempts");
    }

    #[test]
    fn memory_storage_round_trips() {
        let mut storage = MemoryStorage::default();
        storage.set("k", "v").unwrap();
        assert_eq!(storage.get("k").as_deref(), Some("v"));
        storage.remove("k").unwrap();
        assert_eq!(storage.get("k"), None);
    }
}
