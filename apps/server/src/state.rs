use crate::config::Config;
use crate::error::{Error, Result};
use crate::session::{session_cookie, SessionRegistry};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use bedside_smart::{ClientStorage, SmartClient};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Registration and HTTP client, bound to a browser's stores per request
    smart: SmartClient,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        match &config.storage.state_dir {
            Some(dir) => tracing::info!(dir = %dir.display(), "Using file-backed session state"),
            None => tracing::info!("Using in-memory session state"),
        }
        let smart = SmartClient::new(config.smart.clone(), ClientStorage::in_memory())?;
        let sessions = Arc::new(SessionRegistry::new(&config.storage));
        Ok(Self {
            config: Arc::new(config),
            smart,
            sessions,
        })
    }

    pub fn smart_config(&self) -> &bedside_smart::SmartAppConfig {
        self.smart.config()
    }

    /// Begin a new browser session; the cookie must reach the browser with
    /// the launch redirect.
    pub fn start_session(&self) -> Result<(SmartClient, Cookie<'static>)> {
        let (id, storage) = self.sessions.start()?;
        let secure = self.smart.config().redirect_uri.starts_with("https://");
        Ok((self.smart.with_storage(storage), session_cookie(id, secure)))
    }

    /// Client bound to the request's browser session
    pub fn client(&self, jar: &CookieJar) -> Result<SmartClient> {
        self.sessions
            .from_jar(jar)
            .map(|storage| self.smart.with_storage(storage))
            .ok_or_else(|| {
                Error::Unauthorized(
                    "no SMART session for this browser; launch the app from the EHR".to_string(),
                )
            })
    }

    /// Client for the callback. An unknown browser gets empty stores, so the
    /// state check fails with a transcript.
    pub fn callback_client(&self, jar: &CookieJar) -> SmartClient {
        let storage = self
            .sessions
            .from_jar(jar)
            .unwrap_or_else(ClientStorage::in_memory);
        self.smart.with_storage(storage)
    }
}
