//! Per-browser SMART state
//!
//! Every browser that starts a launch gets its own pair of stores, keyed by
//! an opaque id carried in the `bedside_session` cookie. One browser's CSRF
//! token and access token are never visible to another.

use crate::config::StorageConfig;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use bedside_smart::{ClientStorage, FileStore, KeyValueStore, MemoryStore};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "bedside_session";

#[derive(Debug)]
struct Entry {
    storage: ClientStorage,
    last_seen: Instant,
}

/// Live browser sessions.
///
/// A session idle for longer than the configured TTL is dropped together with
/// its state file.
#[derive(Debug)]
pub struct SessionRegistry {
    entries: RwLock<HashMap<Uuid, Entry>>,
    state_dir: Option<PathBuf>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            state_dir: config.state_dir.clone(),
            ttl: Duration::from_secs(config.session_ttl_secs),
        }
    }

    /// Open a fresh session with empty stores
    pub fn start(&self) -> crate::Result<(Uuid, ClientStorage)> {
        self.evict_expired();

        let id = Uuid::new_v4();
        let durable: Arc<dyn KeyValueStore> = match self.state_path(&id) {
            Some(path) => Arc::new(FileStore::open(path)?),
            None => Arc::new(MemoryStore::new()),
        };
        let storage = ClientStorage::new(durable, Arc::new(MemoryStore::new()));

        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            id,
            Entry {
                storage: storage.clone(),
                last_seen: Instant::now(),
            },
        );
        tracing::debug!(session = %id, active = entries.len(), "Browser session started");
        Ok((id, storage))
    }

    /// Stores of the session named by `id`, refreshing its idle timer.
    ///
    /// With a state directory configured, a session written by an earlier
    /// run is picked up again from its file.
    pub fn get(&self, id: &str) -> Option<ClientStorage> {
        let id = Uuid::parse_str(id).ok()?;

        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.get_mut(&id) {
            if entry.last_seen.elapsed() < self.ttl {
                entry.last_seen = Instant::now();
                return Some(entry.storage.clone());
            }
            entries.remove(&id);
            self.discard_file(&id);
            return None;
        }

        let storage = self.reopen(&id)?;
        entries.insert(
            id,
            Entry {
                storage: storage.clone(),
                last_seen: Instant::now(),
            },
        );
        Some(storage)
    }

    /// Stores of the session named by the request's cookie
    pub fn from_jar(&self, jar: &CookieJar) -> Option<ClientStorage> {
        self.get(jar.get(SESSION_COOKIE)?.value())
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn reopen(&self, id: &Uuid) -> Option<ClientStorage> {
        let path = self.state_path(id)?;
        let modified = std::fs::metadata(&path).ok()?.modified().ok()?;
        if modified.elapsed().map_or(true, |idle| idle >= self.ttl) {
            self.discard_file(id);
            return None;
        }

        let durable = FileStore::open(path).ok()?;
        tracing::debug!(session = %id, "Browser session restored from disk");
        Some(ClientStorage::new(Arc::new(durable), Arc::new(MemoryStore::new())))
    }

    fn evict_expired(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let expired: Vec<Uuid> = entries
            .iter()
            .filter(|(_, entry)| entry.last_seen.elapsed() >= self.ttl)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            entries.remove(id);
            self.discard_file(id);
        }
        if !expired.is_empty() {
            tracing::debug!(evicted = expired.len(), "Expired browser sessions dropped");
        }
    }

    fn state_path(&self, id: &Uuid) -> Option<PathBuf> {
        self.state_dir
            .as_ref()
            .map(|dir| dir.join(format!("{id}.json")))
    }

    fn discard_file(&self, id: &Uuid) {
        let Some(path) = self.state_path(id) else {
            return;
        };
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to remove session state"
            ),
        }
    }
}

/// The session cookie for `id`. `Secure` is set when the app is served over
/// https.
pub fn session_cookie(id: Uuid, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}
