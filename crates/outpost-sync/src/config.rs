//! # Terminal Configuration
//!
//! Configuration for one terminal process.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     OUTPOST_OUTLET_ID=outlet-7                                         │
//! │     OUTPOST_GATEWAY_URL=https://pos.example.com                        │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/outpost-pos/terminal.toml (Linux)                        │
//! │     ~/Library/Application Support/com.outpost.pos/terminal.toml (macOS)│
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     generated terminal id, localhost gateway                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [terminal]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! name = "Till 2"
//!
//! [outlet]
//! id = "outlet-7"
//!
//! [gateway]
//! base_url = "https://pos.example.com"
//! api_key = "sk_live_..."
//! timeout_secs = 15
//!
//! [sync]
//! page_size = 100
//! retry_delays_ms = [500, 1500, 3000]
//! cooldown_secs = 60
//! interval_secs = 300
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Terminal / Outlet
// =============================================================================

/// Identity of this terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalSection {
    /// Generated on first run if not provided.
    pub id: String,

    #[serde(default = "default_terminal_name")]
    pub name: String,
}

fn default_terminal_name() -> String {
    "POS Terminal".to_string()
}

impl Default for TerminalSection {
    fn default() -> Self {
        TerminalSection {
            id: uuid::Uuid::new_v4().to_string(),
            name: default_terminal_name(),
        }
    }
}

/// The outlet whose catalog partition this terminal serves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutletSection {
    pub id: String,

    #[serde(default)]
    pub name: String,
}

impl Default for OutletSection {
    fn default() -> Self {
        OutletSection {
            id: "default-outlet".to_string(),
            name: "Default Outlet".to_string(),
        }
    }
}

// =============================================================================
// Gateway
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    /// Central server base URL (http or https).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Sent as a bearer token.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_timeout() -> u64 {
    15
}

impl Default for GatewaySettings {
    fn default() -> Self {
        GatewaySettings {
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout(),
        }
    }
}

impl GatewaySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Catalog sync, retry and scheduling knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Products requested per catalog page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Upper bound on pages fetched by one run.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Waits between attempts after a transient failure. One retry per entry.
    #[serde(default = "default_retry_delays")]
    pub retry_delays_ms: Vec<u64>,

    /// How long an outlet stays paused after retries are exhausted.
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,

    /// Background delta sync and replay interval.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Candidates requested by the remote search fallback.
    #[serde(default = "default_search_limit")]
    pub search_limit: u32,

    /// Accept the only candidate of a remote search even if its codes differ.
    #[serde(default = "default_true")]
    pub accept_lone_candidate: bool,
}

fn default_page_size() -> u32 {
    100
}
fn default_max_pages() -> u32 {
    1_000
}
fn default_retry_delays() -> Vec<u64> {
    vec![500, 1_500, 3_000]
}
fn default_cooldown() -> u64 {
    60
}
fn default_interval() -> u64 {
    300
}
fn default_search_limit() -> u32 {
    20
}
fn default_true() -> bool {
    true
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            retry_delays_ms: default_retry_delays(),
            cooldown_secs: default_cooldown(),
            interval_secs: default_interval(),
            search_limit: default_search_limit(),
            accept_lone_candidate: true,
        }
    }
}

impl SyncSettings {
    pub fn retry_delays(&self) -> Vec<Duration> {
        self.retry_delays_ms
            .iter()
            .map(|ms| Duration::from_millis(*ms))
            .collect()
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

// =============================================================================
// Database
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSection {
    /// SQLite file. Defaults to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete terminal configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TerminalConfig {
    #[serde(default)]
    pub terminal: TerminalSection,

    #[serde(default)]
    pub outlet: OutletSection,

    #[serde(default)]
    pub gateway: GatewaySettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub database: DatabaseSection,
}

impl TerminalConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (terminal.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading terminal config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load terminal config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Terminal config saved");
        Ok(())
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.terminal.id.trim().is_empty() {
            return Err(SyncError::InvalidConfig("terminal.id must not be empty".into()));
        }
        if self.outlet.id.trim().is_empty() {
            return Err(SyncError::InvalidConfig("outlet.id must not be empty".into()));
        }

        let url = Url::parse(&self.gateway.base_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SyncError::InvalidUrl(format!(
                "Gateway URL must start with http:// or https://, got: {}",
                self.gateway.base_url
            )));
        }

        if self.gateway.timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "timeout_secs must be greater than 0".into(),
            ));
        }
        if self.sync.page_size == 0 {
            return Err(SyncError::InvalidConfig(
                "page_size must be greater than 0".into(),
            ));
        }
        if self.sync.max_pages == 0 {
            return Err(SyncError::InvalidConfig(
                "max_pages must be greater than 0".into(),
            ));
        }
        if self.sync.interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "interval_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Applies `OUTPOST_*` overrides read through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup("OUTPOST_TERMINAL_ID") {
            debug!(terminal_id = %id, "Overriding terminal ID from environment");
            self.terminal.id = id;
        }

        if let Some(id) = lookup("OUTPOST_OUTLET_ID") {
            debug!(outlet_id = %id, "Overriding outlet ID from environment");
            self.outlet.id = id;
        }

        if let Some(url) = lookup("OUTPOST_GATEWAY_URL") {
            debug!(url = %url, "Overriding gateway URL from environment");
            self.gateway.base_url = url;
        }

        if let Some(key) = lookup("OUTPOST_API_KEY") {
            self.gateway.api_key = Some(key);
        }

        if let Some(secs) = lookup("OUTPOST_SYNC_INTERVAL_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => self.sync.interval_secs = s,
                Err(_) => warn!(value = %secs, "Ignoring invalid OUTPOST_SYNC_INTERVAL_SECS"),
            }
        }

        if let Some(path) = lookup("OUTPOST_DATABASE_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "outpost", "pos")
    }

    fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("terminal.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn terminal_id(&self) -> &str {
        &self.terminal.id
    }

    pub fn outlet_id(&self) -> &str {
        &self.outlet.id
    }

    /// The configured SQLite path, or `outpost.db` in the platform data dir.
    pub fn database_path(&self) -> PathBuf {
        self.database.path.clone().unwrap_or_else(|| {
            Self::project_dirs()
                .map(|dirs| dirs.data_dir().join("outpost.db"))
                .unwrap_or_else(|| PathBuf::from("outpost.db"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = TerminalConfig::default();
        assert!(!config.terminal.id.is_empty());
        assert_eq!(config.sync.page_size, 100);
        assert_eq!(config.sync.retry_delays_ms, vec![500, 1500, 3000]);
        assert_eq!(config.sync.cooldown(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = TerminalConfig::default();

        config.outlet.id = "  ".to_string();
        assert!(matches!(config.validate(), Err(SyncError::InvalidConfig(_))));

        config.outlet.id = "outlet-1".to_string();
        config.gateway.base_url = "ws://localhost:8080".to_string();
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));

        config.gateway.base_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));

        config.gateway.base_url = "https://pos.example.com".to_string();
        config.sync.page_size = 0;
        assert!(config.validate().is_err());

        config.sync.page_size = 50;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("OUTPOST_OUTLET_ID", "outlet-9"),
            ("OUTPOST_GATEWAY_URL", "https://pos.example.com"),
            ("OUTPOST_SYNC_INTERVAL_SECS", "not-a-number"),
            ("OUTPOST_DATABASE_PATH", "/tmp/till.db"),
        ]
        .into_iter()
        .collect();

        let mut config = TerminalConfig::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.outlet_id(), "outlet-9");
        assert_eq!(config.gateway.base_url, "https://pos.example.com");
        assert_eq!(config.sync.interval_secs, 300);
        assert_eq!(config.database_path(), PathBuf::from("/tmp/till.db"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: TerminalConfig = toml::from_str(
            r#"
            [outlet]
            id = "outlet-3"

            [sync]
            retry_delays_ms = [100]
            "#,
        )
        .unwrap();

        assert_eq!(config.outlet_id(), "outlet-3");
        assert_eq!(config.sync.retry_delays(), vec![Duration::from_millis(100)]);
        assert_eq!(config.sync.page_size, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("terminal.toml");

        let mut config = TerminalConfig::default();
        config.outlet.id = "outlet-5".to_string();
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[gateway]"));
        assert!(contents.contains("[sync]"));

        let loaded: TerminalConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded.outlet_id(), "outlet-5");
        assert_eq!(loaded.terminal_id(), config.terminal_id());
    }
}
