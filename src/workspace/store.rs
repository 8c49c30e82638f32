//! Key-value persistence for workspace records
//!
//! Values are opaque JSON strings, one record per key. Keys are updated
//! independently; there are no cross-key transactions. `Storage` layers the
//! typed accessors on top and degrades unreadable records to their defaults.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::state::App;

pub const KEY_WORKSPACES: &str = "workspaces";
pub const KEY_PINNED_PROJECTS: &str = "pinned-projects";
pub const KEY_DEFAULT_APP: &str = "default-app";
pub const KEY_TERMINAL_APP: &str = "terminal-app";
pub const KEY_WORKSPACE_APPS: &str = "workspace-apps";
pub const KEY_ONBOARDING_COMPLETED: &str = "onboarding-completed";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read record '{0}': {1}")]
    ReadError(String, String),
    #[error("Failed to write record '{0}': {1}")]
    WriteError(String, String),
    #[error("Failed to encode record '{0}': {1}")]
    EncodeError(String, String),
}

/// Durable string-keyed storage
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Stores each key as `<dir>/<key>.json`
pub struct FileStore {
    dir: PathBuf,
    // Serializes tmp-file writes so two writers never share a temp path
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match tokio::fs::read_to_string(self.record_path(key)).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::ReadError(key.to_string(), e.to_string())),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let write_err = |e: std::io::Error| StoreError::WriteError(key.to_string(), e.to_string());
        let _guard = self.write_lock.lock().await;

        tokio::fs::create_dir_all(&self.dir).await.map_err(write_err)?;

        // Write-then-rename keeps a crash from leaving a half-written record
        let path = self.record_path(key);
        let tmp = self.dir.join(format!(".{}.json.tmp", key));
        tokio::fs::write(&tmp, value).await.map_err(write_err)?;
        tokio::fs::rename(&tmp, &path).await.map_err(write_err)?;

        debug!(key, path = %path.display(), "Record written");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(self.record_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::WriteError(key.to_string(), e.to_string())),
        }
    }
}

/// In-process store, used by tests and embedders without a data directory
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.records.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.records.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.records.lock().await.remove(key);
        Ok(())
    }
}

/// Typed accessors for the six workspace records.
///
/// Getters never fail: a missing, unreadable or corrupt record yields the
/// record's default and is logged. Setters propagate store failures.
#[derive(Clone)]
pub struct Storage {
    store: Arc<dyn KeyValueStore>,
}

impl Storage {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn workspaces(&self) -> Vec<String> {
        self.get_or_default(KEY_WORKSPACES).await
    }

    pub async fn save_workspaces(&self, workspaces: &[String]) -> Result<(), StoreError> {
        self.put(KEY_WORKSPACES, workspaces).await
    }

    pub async fn pinned_projects(&self) -> Vec<String> {
        self.get_or_default(KEY_PINNED_PROJECTS).await
    }

    pub async fn save_pinned_projects(&self, paths: &[String]) -> Result<(), StoreError> {
        self.put(KEY_PINNED_PROJECTS, paths).await
    }

    pub async fn default_app(&self) -> Option<App> {
        self.get_or_default(KEY_DEFAULT_APP).await
    }

    pub async fn save_default_app(&self, app: &App) -> Result<(), StoreError> {
        self.put(KEY_DEFAULT_APP, app).await
    }

    pub async fn terminal_app(&self) -> Option<App> {
        self.get_or_default(KEY_TERMINAL_APP).await
    }

    /// `None` removes the record, meaning "system default terminal"
    pub async fn save_terminal_app(&self, app: Option<&App>) -> Result<(), StoreError> {
        match app {
            Some(app) => self.put(KEY_TERMINAL_APP, app).await,
            None => self.store.remove(KEY_TERMINAL_APP).await,
        }
    }

    pub async fn workspace_apps(&self) -> HashMap<String, App> {
        self.get_or_default(KEY_WORKSPACE_APPS).await
    }

    pub async fn save_workspace_apps(&self, apps: &HashMap<String, App>) -> Result<(), StoreError> {
        self.put(KEY_WORKSPACE_APPS, apps).await
    }

    pub async fn onboarding_completed(&self) -> bool {
        self.get_or_default(KEY_ONBOARDING_COMPLETED).await
    }

    pub async fn save_onboarding_completed(&self, completed: bool) -> Result<(), StoreError> {
        self.put(KEY_ONBOARDING_COMPLETED, &completed).await
    }

    async fn get_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return T::default(),
            Err(e) => {
                warn!(key, error = %e, "Failed to read stored record, using default");
                return T::default();
            }
        };

        if raw.trim().is_empty() {
            return T::default();
        }

        match serde_json::from_str::<Option<T>>(&raw) {
            Ok(value) => value.unwrap_or_default(),
            Err(e) => {
                warn!(key, error = %e, "Stored record is corrupt, using default");
                T::default()
            }
        }
    }

    async fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)
            .map_err(|e| StoreError::EncodeError(key.to_string(), e.to_string()))?;
        self.store.set(key, raw).await
    }
}
