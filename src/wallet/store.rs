//! Local key-value storage for encrypted wallet records and session state.
//!
//! [`KeyValueStore`] plays the part browser local storage plays for the web
//! client: a flat string-to-string map. [`JsonFileStore`] persists it as a
//! single JSON object so a session survives process restarts.

use crate::{Error, Result};
use alloy::primitives::Address;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Key holding the last active game id
pub const GAME_ID_KEY: &str = "gameId";

/// Prefix of the per-account encrypted wallet record key
pub const GAME_WALLET_PREFIX: &str = "gameWallet_";

/// Storage key for the encrypted game wallet of a connected account
pub fn game_wallet_key(account: Address) -> String {
    format!("{}{}", GAME_WALLET_PREFIX, account.to_checksum(None))
}

/// String key-value storage.
///
/// Implementations must be `Send + Sync`; the synchronizer shares one store
/// with background subscriptions.
pub trait KeyValueStore: Send + Sync {
    /// Look up a value. `Ok(None)` if the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or replace a value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a value. Returns `true` if something was removed.
    fn remove(&self, key: &str) -> Result<bool>;
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| Error::Storage("store lock poisoned".to_string()))
}

/// In-memory store; contents are lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.entries)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.entries)?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        Ok(lock(&self.entries)?.remove(key).is_some())
    }
}

/// Store persisted as a JSON object on disk
///
/// Every write rewrites the whole file through a temp file + rename, so a
/// crash mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Open the store at `path`, creating an empty one if the file is missing
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| Error::Storage(format!("read {}: {}", path.display(), e)))?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            BTreeMap::new()
        };

        tracing::debug!(path = %path.display(), entries = entries.len(), "Opened store");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| Error::Storage(format!("create {}: {}", parent.display(), e)))?;
            }
        }

        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| Error::Storage(format!("write {}: {}", tmp.display(), e)))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| Error::Storage(format!("rename {}: {}", self.path.display(), e)))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.entries)?.get(key).cloned())
    }

    // Memory is only updated once the file holds the new contents, so a
    // failed write never leaves a value visible that a restart would lose.
    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = lock(&self.entries)?;
        let mut next = entries.clone();
        next.insert(key.to_string(), value.to_string());
        self.flush(&next)?;
        *entries = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let mut entries = lock(&self.entries)?;
        if !entries.contains_key(key) {
            return Ok(false);
        }
        let mut next = entries.clone();
        next.remove(key);
        self.flush(&next)?;
        *entries = next;
        Ok(true)
    }
}
