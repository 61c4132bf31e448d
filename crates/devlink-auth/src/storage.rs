//! Registries backing the linking protocol
//!
//! - [`CodeRegistry`] holds issued codes in memory and expires them on its own
//!   after a fixed TTL.
//! - [`LinkRegistry`] holds account links and persists them as JSON in
//!   ~/.local/share/devlink/links.json (or the platform equivalent).
//!
//! Both guard their map with a single lock, so every upsert and delete is
//! atomic per record.

use crate::device::{AccountLink, DeviceCode};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Data directory not found")]
    NoDataDir,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

// ============================================================================
// Device codes
// ============================================================================

// Keeps `created_at + ttl` well inside chrono's range
const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Time-bounded registry of issued codes, keyed by device id
pub struct CodeRegistry {
    ttl: Duration,
    codes: RwLock<HashMap<String, DeviceCode>>,
}

impl CodeRegistry {
    /// Create an empty registry whose entries live for `ttl_secs`
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_secs.min(MAX_TTL_SECS) as i64),
            codes: RwLock::new(HashMap::new()),
        }
    }

    /// Entry lifetime in seconds
    pub fn ttl_secs(&self) -> u64 {
        self.ttl.num_seconds().max(0) as u64
    }

    /// Store the device's code, replacing whatever it had before
    pub async fn upsert(
        &self,
        device_id: &str,
        code: &str,
        created_at: DateTime<Utc>,
    ) -> DeviceCode {
        let record = DeviceCode::issued_at(device_id.to_string(), code.to_string(), created_at);
        let previous = {
            let mut codes = self.codes.write().await;
            codes.insert(device_id.to_string(), record.clone())
        };

        if let Some(previous) = previous {
            debug!(
                "Replaced code {} for device {} with {}",
                previous.code, device_id, record.code
            );
        }
        record
    }

    /// Find a live code
    pub async fn find_by_code(&self, code: &str) -> Option<DeviceCode> {
        self.find_by_code_at(code, Utc::now()).await
    }

    /// Find a code that is still live at `now`
    ///
    /// Codes are not unique across devices. If several live records match,
    /// the most recently issued one is returned.
    pub async fn find_by_code_at(&self, code: &str, now: DateTime<Utc>) -> Option<DeviceCode> {
        let codes = self.codes.read().await;
        codes
            .values()
            .filter(|c| c.code == code && !c.is_expired_at(now, self.ttl))
            .max_by_key(|c| c.created_at)
            .cloned()
    }

    /// Get the live code for a device
    #[cfg(test)]
    pub async fn get(&self, device_id: &str) -> Option<DeviceCode> {
        let now = Utc::now();
        let codes = self.codes.read().await;
        codes
            .get(device_id)
            .filter(|c| !c.is_expired_at(now, self.ttl))
            .cloned()
    }

    /// Evict every expired entry, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now()).await
    }

    /// Evict entries expired at `now`
    pub async fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut codes = self.codes.write().await;
        let before = codes.len();
        codes.retain(|_, c| !c.is_expired_at(now, self.ttl));
        before - codes.len()
    }

    /// List live codes, oldest first
    pub async fn list(&self) -> Vec<DeviceCode> {
        let now = Utc::now();
        let codes = self.codes.read().await;
        let mut live: Vec<DeviceCode> = codes
            .values()
            .filter(|c| !c.is_expired_at(now, self.ttl))
            .cloned()
            .collect();
        live.sort_by_key(|c| c.created_at);
        live
    }
}

// ============================================================================
// Account links
// ============================================================================

/// Stored data structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredLinks {
    /// Links indexed by device id
    links: HashMap<String, AccountLink>,
}

/// Durable registry of account links, keyed by device id
pub struct LinkRegistry {
    /// Path to the storage file
    path: PathBuf,
    /// In-memory copy of the file
    data: RwLock<StoredLinks>,
}

impl LinkRegistry {
    /// Open the registry at the default location
    pub async fn new() -> StorageResult<Self> {
        let path = Self::default_path()?;
        Self::with_path(path).await
    }

    /// Open the registry at a specific path
    ///
    /// Loads existing links from disk if present.
    pub async fn with_path(path: PathBuf) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let data = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<StoredLinks>(&contents) {
                Ok(data) => {
                    info!("Loaded {} account links from {:?}", data.links.len(), path);
                    data
                }
                Err(e) => {
                    warn!("Failed to parse link storage, starting fresh: {}", e);
                    StoredLinks::default()
                }
            }
        } else {
            debug!("No existing link storage, creating new");
            StoredLinks::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Get the default storage path (~/.local/share/devlink/links.json)
    pub fn default_path() -> StorageResult<PathBuf> {
        let data_dir = dirs::data_dir().ok_or(StorageError::NoDataDir)?;
        Ok(data_dir.join("devlink").join("links.json"))
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    // Called with the write lock held so the file matches memory
    fn persist(&self, data: &StoredLinks) -> StorageResult<()> {
        let json = serde_json::to_string_pretty(data)?;
        std::fs::write(&self.path, json)?;
        debug!("Saved link storage to {:?}", self.path);
        Ok(())
    }

    /// Create or replace the link for a device
    ///
    /// On a failed write the previous record is restored.
    pub async fn upsert(&self, device_id: &str, credential: Option<String>) -> StorageResult<()> {
        let link = AccountLink::new(device_id.to_string(), credential);
        let mut data = self.data.write().await;
        let previous = data.links.insert(device_id.to_string(), link);

        if let Err(e) = self.persist(&data) {
            match previous {
                Some(previous) => data.links.insert(device_id.to_string(), previous),
                None => data.links.remove(device_id),
            };
            return Err(e);
        }

        info!("Linked device {}", device_id);
        Ok(())
    }

    /// Credential for a device, if it is linked to one
    pub async fn find_linked(&self, device_id: &str) -> Option<String> {
        let data = self.data.read().await;
        data.links
            .get(device_id)
            .and_then(|l| l.linked_credential())
            .map(str::to_string)
    }

    /// Get the raw link record for a device
    #[cfg(test)]
    pub async fn get(&self, device_id: &str) -> Option<AccountLink> {
        let data = self.data.read().await;
        data.links.get(device_id).cloned()
    }

    /// Remove the link for a device
    ///
    /// Returns `false` when there was nothing to remove.
    pub async fn delete(&self, device_id: &str) -> StorageResult<bool> {
        let mut data = self.data.write().await;
        let Some(previous) = data.links.remove(device_id) else {
            return Ok(false);
        };

        if let Err(e) = self.persist(&data) {
            data.links.insert(device_id.to_string(), previous);
            return Err(e);
        }

        info!("Removed link for device {}", device_id);
        Ok(true)
    }

    /// List all links, most recent first
    pub async fn list(&self) -> Vec<AccountLink> {
        let data = self.data.read().await;
        let mut links: Vec<AccountLink> = data.links.values().cloned().collect();
        links.sort_by(|a, b| b.linked_at.cmp(&a.linked_at));
        links
    }

    /// Number of stored links
    pub async fn link_count(&self) -> usize {
        let data = self.data.read().await;
        data.links.len()
    }
}
