//! Server configuration
//!
//! Sources, later ones winning:
//! 1. Built-in defaults
//! 2. `bedside.toml` (or the file named by `BEDSIDE_CONFIG`), if present
//! 3. Environment variables `BEDSIDE__<SECTION>__<KEY>`, e.g.
//!    `BEDSIDE__SERVER__PORT=8080` or `BEDSIDE__SMART__CLIENT_ID=...`
//!
//! A `.env` file in the working directory is loaded before the environment
//! is read.

use bedside_smart::SmartAppConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Routes the dashboard may not be mounted on
const RESERVED_PATHS: [&str; 6] = ["/", "/launch", "/callback", "/health", "/info", "/favicon.ico"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub smart: SmartAppConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; empty disables CORS headers
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one durable state file per browser session;
    /// in-memory when unset
    pub state_dir: Option<PathBuf>,
    /// Idle time after which a browser session and its tokens are dropped
    pub session_ttl_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: None,
            session_ttl_secs: 8 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
    pub file_enabled: bool,
    pub file_directory: String,
    pub file_prefix: String,
    /// daily, hourly, minutely or never
    pub file_rotation: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file_enabled: false,
            file_directory: "logs".to_string(),
            file_prefix: "bedside".to_string(),
            file_rotation: "daily".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();
        let file = std::env::var("BEDSIDE_CONFIG").unwrap_or_else(|_| "bedside".to_string());
        Self::load_from(&file)
    }

    /// Load from defaults, the optional file `path` and the environment
    pub fn load_from(path: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?)
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("BEDSIDE")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("server.port must not be 0");
        }
        if !matches!(
            self.logging.file_rotation.as_str(),
            "daily" | "hourly" | "minutely" | "never"
        ) {
            anyhow::bail!(
                "logging.file_rotation must be daily, hourly, minutely or never (got {})",
                self.logging.file_rotation
            );
        }
        if self.storage.session_ttl_secs == 0 {
            anyhow::bail!("storage.session_ttl_secs must not be 0");
        }
        self.smart
            .validate()
            .map_err(|e| anyhow::anyhow!("smart: {e}"))?;

        let redirect = url::Url::parse(&self.smart.redirect_uri)?;
        if redirect.path() != "/callback" {
            anyhow::bail!(
                "smart.redirect_uri must point at this server's /callback route (got {})",
                self.smart.redirect_uri
            );
        }

        let dashboard = self.smart.dashboard_path.as_str();
        let under_api = dashboard == "/api" || dashboard.starts_with("/api/");
        if !dashboard.starts_with('/') || under_api || RESERVED_PATHS.contains(&dashboard) {
            anyhow::bail!("smart.dashboard_path must be an unused absolute path (got {dashboard})");
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        addr.parse()
            .map_err(|e| anyhow::anyhow!("Invalid listen address {addr}: {e}"))
    }
}
