//! Preset files
//!
//! A preset is a named, ordered list of package URLs that can be saved and
//! loaded again later. After every batch an "Auto Preset" listing the
//! installed folders is written next to the mods.
//!
//! Preset format:
//! ```json
//! {
//!   "name": "Fishing Night",
//!   "mod_urls": ["https://thunderstore.io/c/webfishing/p/TeamLure/LureRefreshed/"],
//!   "created_at": "2024-11-02 21:14:09",
//!   "created_by": "webloader 1.1.0"
//! }
//! ```

use crate::{parse_package_url, Error, PackageIdentifier, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the automatic preset in the mods directory
pub const AUTO_PRESET_FILE: &str = "mod_preset.json";

pub const AUTO_PRESET_NAME: &str = "Auto Preset";

/// Value of `created_by` in files this crate writes
pub const CREATED_BY: &str = concat!("webloader ", env!("CARGO_PKG_VERSION"));

/// Local wall-clock time in the format used by every JSON file we write
pub fn timestamp_now() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Keep alphanumerics, space, `-` and `_`, then trim
pub fn sanitize_preset_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect::<String>()
        .trim()
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    #[serde(default)]
    pub name: String,

    pub mod_urls: Vec<String>,

    #[serde(default)]
    pub created_at: String,

    #[serde(default)]
    pub created_by: String,
}

/// A preset together with the identifiers its URLs parse to
#[derive(Debug, Clone)]
pub struct LoadedPreset {
    pub preset: Preset,
    pub identifiers: Vec<PackageIdentifier>,
}

impl LoadedPreset {
    /// URLs of the preset that parse as package URLs, in file order
    pub fn valid_urls(&self) -> Vec<String> {
        self.preset
            .mod_urls
            .iter()
            .filter(|url| parse_package_url(url).is_some())
            .cloned()
            .collect()
    }
}

impl Preset {
    pub fn new(name: &str, mod_urls: Vec<String>) -> Result<Self> {
        let name = sanitize_preset_name(name);
        if name.is_empty() {
            return Err(Error::InvalidPreset(
                "Preset name must contain letters or digits".to_string(),
            ));
        }

        Ok(Self {
            name,
            mod_urls,
            created_at: timestamp_now(),
            created_by: CREATED_BY.to_string(),
        })
    }

    /// Suggested file name, `<name>.json`
    pub fn file_name(&self) -> String {
        format!("{}.json", self.name)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Load a preset file
    ///
    /// Fails if `mod_urls` is missing. URLs that are not package URLs stay in
    /// `preset.mod_urls` but produce no identifier.
    pub fn load(path: &Path) -> Result<LoadedPreset> {
        let content = fs::read_to_string(path)?;
        let raw: Value = serde_json::from_str(&content)
            .map_err(|e| Error::InvalidPreset(format!("{}: {}", path.display(), e)))?;

        if raw.get("mod_urls").is_none() {
            return Err(Error::InvalidPreset(format!(
                "{} has no mod_urls list",
                path.display()
            )));
        }

        let preset: Preset = serde_json::from_value(raw)
            .map_err(|e| Error::InvalidPreset(format!("{}: {}", path.display(), e)))?;
        let identifiers = preset
            .mod_urls
            .iter()
            .filter_map(|url| parse_package_url(url))
            .collect();

        Ok(LoadedPreset {
            preset,
            identifiers,
        })
    }
}

/// Record of the folders installed by the last batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoPreset {
    pub name: String,
    pub downloaded_mods: Vec<String>,
    pub created_at: String,
    pub created_by: String,
}

impl AutoPreset {
    pub fn new(folders: &BTreeSet<String>) -> Self {
        Self {
            name: AUTO_PRESET_NAME.to_string(),
            downloaded_mods: folders.iter().cloned().collect(),
            created_at: timestamp_now(),
            created_by: CREATED_BY.to_string(),
        }
    }

    /// Write `mod_preset.json` into `dir`, returning its path
    pub fn write(dir: &Path, folders: &BTreeSet<String>) -> Result<PathBuf> {
        let path = dir.join(AUTO_PRESET_FILE);
        fs::write(&path, serde_json::to_string_pretty(&Self::new(folders))?)?;
        Ok(path)
    }
}
