//! Session cart ID storage.
//!
//! The cart ID outlives any single [`CartSession`](crate::CartSession): it is
//! read on start-up to recover the shopper's cart and rewritten whenever a
//! new cart is created. Stores are shared behind `Arc` and perform no access
//! control, so the last writer wins.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use retail_cart_core::CartId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

/// Errors from reading or writing the stored cart ID.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("Store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backing file holds invalid JSON.
    #[error("Store data error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Read/write slot for the session's cart ID.
#[async_trait]
pub trait CartIdStore: Send + Sync {
    /// The cart ID recorded for this session, if any.
    async fn cart_id(&self) -> Result<Option<CartId>, StoreError>;

    /// Record a new cart ID, replacing any previous one.
    async fn set_cart_id(&self, id: &CartId) -> Result<(), StoreError>;

    /// Forget the recorded cart ID.
    async fn clear(&self) -> Result<(), StoreError>;
}

// =============================================================================
// In-memory store
// =============================================================================

/// Cart ID held in process memory.
#[derive(Debug, Default)]
pub struct MemoryCartIdStore {
    slot: RwLock<Option<CartId>>,
}

impl MemoryCartIdStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already knows a cart ID.
    #[must_use]
    pub fn with_cart_id(id: impl Into<CartId>) -> Self {
        Self {
            slot: RwLock::new(Some(id.into())),
        }
    }
}

#[async_trait]
impl CartIdStore for MemoryCartIdStore {
    async fn cart_id(&self) -> Result<Option<CartId>, StoreError> {
        Ok(self.slot.read().await.clone())
    }

    async fn set_cart_id(&self, id: &CartId) -> Result<(), StoreError> {
        *self.slot.write().await = Some(id.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.slot.write().await = None;
        Ok(())
    }
}

// =============================================================================
// File store
// =============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cart_id: Option<CartId>,
}

/// Cart ID persisted as a small JSON document on disk, `{"cart_id": "..."}`.
///
/// A missing file reads as "no cart yet". Writes go to a sibling `.tmp`
/// file that is renamed over the target, so readers never see a partial
/// document.
#[derive(Debug, Clone)]
pub struct FileCartIdStore {
    path: PathBuf,
}

impl FileCartIdStore {
    /// Create a store backed by `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    async fn write(&self, file: &SessionFile) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(file)?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, json)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| self.io_error(e))
    }
}

#[async_trait]
impl CartIdStore for FileCartIdStore {
    async fn cart_id(&self) -> Result<Option<CartId>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        let file: SessionFile = serde_json::from_slice(&bytes)?;
        Ok(file.cart_id)
    }

    async fn set_cart_id(&self, id: &CartId) -> Result<(), StoreError> {
        debug!(path = %self.path.display(), cart_id = %id, "Persisting cart ID");
        self.write(&SessionFile {
            cart_id: Some(id.clone()),
        })
        .await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "retail-cart-{name}-{}.json",
            uuid::Uuid::new_v4()
        ))
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryCartIdStore::new();
        assert_eq!(store.cart_id().await.unwrap(), None);

        store.set_cart_id(&CartId::new("c1")).await.unwrap();
        assert_eq!(store.cart_id().await.unwrap(), Some(CartId::new("c1")));

        store.clear().await.unwrap();
        assert_eq!(store.cart_id().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_missing_file_reads_as_none() {
        let store = FileCartIdStore::new(temp_path("missing"));
        assert_eq!(store.cart_id().await.unwrap(), None);
        // Clearing a store that never wrote is fine.
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_survives_new_instance() {
        let path = temp_path("persist");
        FileCartIdStore::new(&path)
            .set_cart_id(&CartId::new("c42"))
            .await
            .unwrap();

        let reopened = FileCartIdStore::new(&path);
        assert_eq!(reopened.cart_id().await.unwrap(), Some(CartId::new("c42")));

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!({ "cart_id": "c42" }));

        reopened.clear().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_file_store_replaces_file_without_leftovers() {
        let path = temp_path("replace");
        let store = FileCartIdStore::new(&path);
        // Leftover from an interrupted write.
        std::fs::write(store.temp_path(), b"{\"cart_").unwrap();
        std::fs::write(&path, br#"{"cart_id":"c1","padding":"xxxxxxxxxxxxxxxx"}"#).unwrap();

        store.set_cart_id(&CartId::new("c2")).await.unwrap();

        assert_eq!(store.cart_id().await.unwrap(), Some(CartId::new("c2")));
        assert!(!store.temp_path().exists());

        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_rejects_corrupt_file() {
        let path = temp_path("corrupt");
        std::fs::write(&path, b"not json").unwrap();

        let store = FileCartIdStore::new(&path);
        assert!(matches!(store.cart_id().await, Err(StoreError::Serde(_))));

        store.clear().await.unwrap();
    }
}
