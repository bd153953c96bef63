//! Client-side key/value state
//!
//! The launch and callback steps hand state to each other through two
//! stores: a durable one (issuer, endpoints, token response) and a
//! session-scoped one holding the single-use CSRF token.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

/// Well-known keys
pub mod keys {
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const PATIENT: &str = "patient";
    pub const ISSUER: &str = "issuer";
    pub const AUTH_ENDPOINT: &str = "authEndpoint";
    pub const TOKEN_ENDPOINT: &str = "tokenEndpoint";
    pub const NEED_PATIENT_BANNER: &str = "need_patient_banner";
    /// Session-scoped CSRF token
    pub const AUTH_STATE: &str = "authState";
}

/// String key/value store
pub trait KeyValueStore: Send + Sync + fmt::Debug {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    fn clear(&self) -> Result<()>;

    /// All keys in ascending order
    fn keys(&self) -> Result<Vec<String>>;
}

/// In-process store, used for session scope and in tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.clear();
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(entries.keys().cloned().collect())
    }
}

/// Durable store backed by a single JSON object file.
///
/// Every write rewrites the whole file through a temporary sibling and a
/// rename, so a reader never sees a half-written document.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(Error::storage)?;
            }
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    /// `<data dir>/bedside/<file_name>`
    pub fn in_state_dir(file_name: &str) -> Result<Self> {
        let dir = default_state_dir()
            .ok_or_else(|| Error::Storage("no data directory on this platform".to_string()))?;
        Self::open(dir.join(file_name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                Error::Storage(format!("corrupt state file {}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(Error::storage(e)),
        }
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let content = serde_json::to_string_pretty(entries).map_err(Error::storage)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(Error::storage)?;
        fs::rename(&tmp, &self.path).map_err(Error::storage)?;
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries = self.load()?;
        f(&mut entries);
        self.save(&entries)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|entries| {
            entries.remove(key);
        })
    }

    fn clear(&self) -> Result<()> {
        self.update(|entries| entries.clear())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.load()?.into_keys().collect())
    }
}

/// Platform data directory for client state
pub fn default_state_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("bedside"))
}

/// The pair of stores a SMART app reads and writes
#[derive(Debug, Clone)]
pub struct ClientStorage {
    pub durable: Arc<dyn KeyValueStore>,
    pub session: Arc<dyn KeyValueStore>,
}

impl ClientStorage {
    pub fn new(durable: Arc<dyn KeyValueStore>, session: Arc<dyn KeyValueStore>) -> Self {
        Self { durable, session }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }
}
