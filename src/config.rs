use anyhow::{Context, Result};
use dirs::{config_dir, data_dir};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_ITEM_COUNT: usize = 5;
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_LOG_LEVEL: &str = "warn";
const PROFILES_FILE_NAME: &str = "profiles.json";

/// Shape of config.toml on disk
///
/// Example:
/// default_item_count = 5
/// profiles_file = "/some/custom/profiles.json"
/// user_agent = "Mozilla/5.0"
/// request_timeout_secs = 10
/// log_level = "warn"
/// color = true
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub default_item_count: Option<usize>,
    pub profiles_file: Option<String>,
    pub user_agent: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub log_level: Option<String>,
    pub color: Option<bool>,
}

/// Resolved config used by the app
#[derive(Debug, Clone)]
pub struct Config {
    pub default_item_count: usize,
    pub profiles_path: PathBuf,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub log_level: String,
    /// Colour status lines; only honoured when stdout is a terminal.
    pub color: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config::resolve(RawConfig::default())
    }
}

impl Config {
    fn resolve(raw: RawConfig) -> Self {
        let profiles_path = raw
            .profiles_file
            .map(PathBuf::from)
            .unwrap_or_else(default_profiles_path);

        Config {
            default_item_count: raw.default_item_count.unwrap_or(DEFAULT_ITEM_COUNT),
            profiles_path,
            user_agent: raw
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            request_timeout_secs: raw.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            log_level: raw
                .log_level
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            color: raw.color.unwrap_or(true),
        }
    }
}

/// The profile store lives next to the executable. If the executable's
/// location can't be determined, fall back to the user data dir.
fn default_profiles_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| {
            data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("quaint-rss")
        })
        .join(PROFILES_FILE_NAME)
}

/// Load config from ~/.config/quaint-rss/config.toml if it exists,
/// otherwise use the defaults listed on [`RawConfig`].
pub fn load_config() -> Result<Config> {
    let config_path = config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quaint-rss")
        .join("config.toml");

    load_config_from(&config_path)
}

/// Load config from an explicit path. A missing file means defaults.
pub fn load_config_from(config_path: &Path) -> Result<Config> {
    if !config_path.exists() {
        return Ok(Config::default());
    }

    let contents = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file '{}'", config_path.display()))?;
    let raw: RawConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file '{}'", config_path.display()))?;

    Ok(Config::resolve(raw))
}
