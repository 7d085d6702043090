//! Configuration loading for taskmirror.
//!
//! All knobs (tokens, database id, file names, poll delay) live in one
//! explicit struct that gets passed into each client at construction; there
//! is no process-wide state. Loaded from a YAML or JSON file (format sniffed
//! from the extension), with the two Notion secrets overridable from the
//! environment so they can stay out of the file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use taskmirror_error::config_error;

/// Configuration format types supported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl Default for ConfigFormat {
    fn default() -> Self {
        Self::Yaml
    }
}

/// Google Tasks side: where credentials live and which list to mirror.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    /// OAuth client credentials file: {client_id, client_secret, refresh_token}.
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,

    /// Cached short-lived access token, rewritten on refresh.
    #[serde(default = "default_token_cache_path")]
    pub token_cache_path: PathBuf,

    /// Task list to mirror. "@default" is the user's primary list.
    #[serde(default = "default_tasklist")]
    pub tasklist: String,
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("credentials.json")
}

fn default_token_cache_path() -> PathBuf {
    PathBuf::from("token.json")
}

fn default_tasklist() -> String {
    "@default".to_string()
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            token_cache_path: default_token_cache_path(),
            tasklist: default_tasklist(),
        }
    }
}

/// Notion side: integration token and target database.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotionConfig {
    /// Integration token. NOTION_TOKEN in the environment wins over the file.
    #[serde(default)]
    pub token: String,

    /// Database the mirrored pages are created in. NOTION_DATABASE_ID wins.
    #[serde(default)]
    pub database_id: String,
}

/// Loop behavior and local state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Flat JSON ledger mapping source task ids to mirrored pages.
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,

    /// Fixed delay between passes, in seconds. Not a precise interval: pass
    /// duration adds to the gap.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_state_path() -> PathBuf {
    PathBuf::from("synced_tasks.json")
}

fn default_poll_interval_secs() -> u64 {
    15
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

/// Main taskmirror configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub notion: NotionConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

impl Config {
    /// Pull the Notion secrets from the environment when set there.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("NOTION_TOKEN") {
            if !token.is_empty() {
                self.notion.token = token;
            }
        }
        if let Ok(db) = std::env::var("NOTION_DATABASE_ID") {
            if !db.is_empty() {
                self.notion.database_id = db;
            }
        }
    }

    /// Reject configurations the clients cannot work with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.notion.token.is_empty() {
            return Err(config_error(
                "notion token is not set (config `notion.token` or NOTION_TOKEN)",
            )
            .into());
        }
        if self.notion.database_id.is_empty() {
            return Err(config_error(
                "notion database id is not set (config `notion.database_id` or NOTION_DATABASE_ID)",
            )
            .into());
        }
        if self.sync.poll_interval_secs == 0 {
            return Err(config_error("sync.poll_interval_secs must be at least 1").into());
        }
        Ok(())
    }
}

/// Load configuration from a file
pub fn load_config<P: Into<PathBuf>>(path: P) -> anyhow::Result<Config> {
    let path = path.into();
    let contents = std::fs::read_to_string(&path)
        .map_err(|e| config_error(format!("read config {}: {e}", path.display())))?;

    // Detect format from extension
    let format = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => ConfigFormat::Json,
        Some("yaml") | Some("yml") => ConfigFormat::Yaml,
        _ => ConfigFormat::default(),
    };

    let config = match format {
        ConfigFormat::Json => serde_json::from_str(&contents)
            .map_err(|e| config_error(format!("parse JSON config {}: {e}", path.display())))?,
        ConfigFormat::Yaml => serde_yaml::from_str(&contents)
            .map_err(|e| config_error(format!("parse YAML config {}: {e}", path.display())))?,
    };
    Ok(config)
}
