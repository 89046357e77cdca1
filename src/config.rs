//! User configuration management
//!
//! Configuration is stored in TOML format at `~/.webloader/config.toml`.
//! Every field has a default, so a missing or partial file is fine.
//!
//! # Examples
//!
//! ```no_run
//! use webloader::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = Config::load()?;
//! println!("Registry: {}", config.registry.origin);
//!
//! config.install.cooldown_ms = 500;
//! config.save()?;
//! # Ok(())
//! # }
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// User configuration file (`~/.webloader/config.toml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Registry settings
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Install locations and pacing
    #[serde(default)]
    pub install: InstallConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Registry origin, e.g. https://thunderstore.io
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Community used for scoping and listings
    #[serde(default = "default_community")]
    pub community: String,

    /// Reject package URLs from other communities
    #[serde(default = "default_scoped")]
    pub scoped: bool,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Timeout for metadata and page requests
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Timeout for artifact downloads
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    /// Timeout for version existence probes
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

fn default_origin() -> String {
    "https://thunderstore.io".to_string()
}

fn default_community() -> String {
    crate::identifier::DEFAULT_COMMUNITY.to_string()
}

fn default_scoped() -> bool {
    true
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36"
        .to_string()
}

fn default_request_timeout() -> u64 {
    15
}

fn default_download_timeout() -> u64 {
    30
}

fn default_probe_timeout() -> u64 {
    5
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            community: default_community(),
            scoped: default_scoped(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout(),
            download_timeout_secs: default_download_timeout(),
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

impl RegistryConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallConfig {
    /// Directory mods are installed into
    #[serde(default = "default_mods_dir")]
    pub mods_dir: PathBuf,

    /// Game directory for the core loader (auto-detected when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_dir: Option<PathBuf>,

    /// Pause after each successful install, in milliseconds
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

fn default_mods_dir() -> PathBuf {
    PathBuf::from("webfishing_mods")
}

fn default_cooldown_ms() -> u64 {
    1000
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            mods_dir: default_mods_dir(),
            game_dir: None,
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

impl InstallConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Configured game directory, falling back to Steam library detection
    pub fn resolve_game_dir(&self) -> Option<PathBuf> {
        self.game_dir
            .clone()
            .or_else(crate::platform::detect_game_dir)
    }
}

impl Config {
    /// Get the default config file path
    ///
    /// Uses WEBLOADER_CONFIG_DIR if set, otherwise ~/.webloader/config.toml
    pub fn default_path() -> Result<PathBuf> {
        // Check for custom config directory (useful for testing)
        if let Ok(config_dir) = std::env::var("WEBLOADER_CONFIG_DIR") {
            return Ok(PathBuf::from(config_dir).join("config.toml"));
        }

        let home = dirs::home_dir()
            .ok_or_else(|| Error::Other("Could not find home directory".to_string()))?;

        Ok(home.join(".webloader").join("config.toml"))
    }

    /// Load config from file, or the defaults if it doesn't exist
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// Update a single `section.field` key from its string form
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let parse_u64 = |value: &str| {
            value
                .parse::<u64>()
                .map_err(|_| Error::Other(format!("Invalid number for {}: {}", key, value)))
        };

        match key {
            "registry.origin" => self.registry.origin = value.trim_end_matches('/').to_string(),
            "registry.community" => self.registry.community = value.to_string(),
            "registry.scoped" => {
                self.registry.scoped = value.parse::<bool>().map_err(|_| {
                    Error::Other("Invalid boolean value. Use 'true' or 'false'".to_string())
                })?
            }
            "registry.user_agent" => self.registry.user_agent = value.to_string(),
            "registry.request_timeout_secs" => {
                self.registry.request_timeout_secs = parse_u64(value)?
            }
            "registry.download_timeout_secs" => {
                self.registry.download_timeout_secs = parse_u64(value)?
            }
            "registry.probe_timeout_secs" => self.registry.probe_timeout_secs = parse_u64(value)?,
            "install.mods_dir" => self.install.mods_dir = PathBuf::from(value),
            "install.game_dir" => {
                self.install.game_dir = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                }
            }
            "install.cooldown_ms" => self.install.cooldown_ms = parse_u64(value)?,
            _ => return Err(Error::Other(format!("Unknown configuration key: {}", key))),
        }

        Ok(())
    }

    /// Keys accepted by [`Config::set`]
    pub const KEYS: &'static [&'static str] = &[
        "registry.origin",
        "registry.community",
        "registry.scoped",
        "registry.user_agent",
        "registry.request_timeout_secs",
        "registry.download_timeout_secs",
        "registry.probe_timeout_secs",
        "install.mods_dir",
        "install.game_dir",
        "install.cooldown_ms",
    ];
}
