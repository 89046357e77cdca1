//! Payload installation into the mods directory
//!
//! Installing merges an extracted payload folder into `<mods_dir>/<folder>`.
//! An identifier is considered installed when a directory named after its
//! `full_name` exists anywhere under the mods directory, or when the install
//! ledger records a folder for it that still exists. Installed packages are
//! never touched again.
//!
//! The core loader (GDWeave) does not live in the mods directory. It is
//! installed into the game directory itself by [`install_loader`], which backs
//! up whatever it replaces.
//!
//! # Examples
//!
//! ```no_run
//! use webloader::{parse_package_url, InstallOutcome, Installer};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let id = parse_package_url("https://thunderstore.io/c/webfishing/p/TeamLure/LureRefreshed/")
//!     .ok_or("not a package url")?;
//! let installer = Installer::new("webfishing_mods");
//!
//! match installer.install(&id, Path::new("scratch/TeamLure-LureRefreshed/LureRefreshed"))? {
//!     InstallOutcome::Installed(folder) => println!("Installed into {}", folder),
//!     InstallOutcome::Skipped(reason) => println!("Skipped: {}", reason),
//!     InstallOutcome::Failed(reason) => println!("Failed: {}", reason),
//! }
//! # Ok(())
//! # }
//! ```

use crate::{Error, PackageIdentifier, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Ledger file kept in the mods directory
pub const LEDGER_FILE: &str = ".webloader-installed.json";

/// Package name of the core loader
pub const CORE_LOADER_NAME: &str = "GDWeave";

/// Authors the core loader is published under
pub const CORE_LOADER_AUTHORS: &[&str] = &["NotNet", "GDWeave"];

/// Proxy library that bootstraps the loader
const LOADER_LIBRARY: &str = "winmm.dll";

/// Whether `author`/`name` designate the core loader (case-insensitive)
pub fn is_core_loader(author: &str, name: &str) -> bool {
    name.eq_ignore_ascii_case(CORE_LOADER_NAME)
        && CORE_LOADER_AUTHORS
            .iter()
            .any(|known| author.eq_ignore_ascii_case(known))
}

/// Result of one install attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Payload merged into this folder of the mods directory
    Installed(String),
    Skipped(String),
    Failed(String),
}

/// Map of `full_name` to the folder its payload was merged into
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstallLedger {
    entries: BTreeMap<String, String>,
}

impl InstallLedger {
    /// Load the ledger of `mods_dir`, empty if missing or unreadable
    pub fn load(mods_dir: &Path) -> Self {
        let path = mods_dir.join(LEDGER_FILE);
        match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(file = %path.display(), "ignoring unreadable install ledger: {}", e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, mods_dir: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(mods_dir.join(LEDGER_FILE), content)?;
        Ok(())
    }

    pub fn folder_for(&self, full_name: &str) -> Option<&str> {
        self.entries.get(full_name).map(String::as_str)
    }

    pub fn record(&mut self, full_name: &str, folder: &str) {
        self.entries
            .insert(full_name.to_string(), folder.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Installs payload folders into one mods directory
#[derive(Debug, Clone)]
pub struct Installer {
    mods_dir: PathBuf,
}

impl Installer {
    pub fn new(mods_dir: impl Into<PathBuf>) -> Self {
        Self {
            mods_dir: mods_dir.into(),
        }
    }

    pub fn mods_dir(&self) -> &Path {
        &self.mods_dir
    }

    /// Check whether `id` already has an install under the mods directory
    pub fn is_installed(&self, id: &PackageIdentifier) -> bool {
        if !self.mods_dir.is_dir() {
            return false;
        }

        let by_name = WalkDir::new(&self.mods_dir)
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .any(|e| e.file_type().is_dir() && e.file_name() == id.full_name.as_str());
        if by_name {
            return true;
        }

        InstallLedger::load(&self.mods_dir)
            .folder_for(&id.full_name)
            .map(|folder| self.mods_dir.join(folder).is_dir())
            .unwrap_or(false)
    }

    /// Merge `payload_dir` into `<mods_dir>/<payload folder name>`
    ///
    /// Same-named files in an existing folder are overwritten. Nothing is
    /// written when `id` is already installed.
    pub fn install(&self, id: &PackageIdentifier, payload_dir: &Path) -> Result<InstallOutcome> {
        if self.is_installed(id) {
            return Ok(InstallOutcome::Skipped(format!(
                "{} is already installed",
                id.full_name
            )));
        }

        let folder = payload_dir
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| {
                Error::Structural(format!(
                    "Payload directory has no name: {}",
                    payload_dir.display()
                ))
            })?;
        let target = self.mods_dir.join(&folder);

        fs::create_dir_all(&target).map_err(|e| {
            Error::Filesystem(format!("Cannot create {}: {}", target.display(), e))
        })?;
        copy_dir_merge(payload_dir, &target)?;

        let mut ledger = InstallLedger::load(&self.mods_dir);
        ledger.record(&id.full_name, &folder);
        ledger.save(&self.mods_dir)?;

        tracing::info!(package = %id, folder = %folder, "installed");
        Ok(InstallOutcome::Installed(folder))
    }
}

/// Recursively copy `src` into `dst`, overwriting files that already exist
pub fn copy_dir_merge(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            Error::Filesystem(format!("Cannot read {}: {}", src.display(), e))
        })?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| Error::Filesystem(e.to_string()))?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| {
                Error::Filesystem(format!("Cannot create {}: {}", target.display(), e))
            })?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| {
                Error::Filesystem(format!(
                    "Cannot copy {} to {}: {}",
                    entry.path().display(),
                    target.display(),
                    e
                ))
            })?;
        }
    }
    Ok(())
}

/// Find the directory holding both `winmm.dll` and a `GDWeave` folder
fn find_loader_root(payload_root: &Path) -> Result<PathBuf> {
    let found = WalkDir::new(payload_root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .find(|e| {
            e.path().join(LOADER_LIBRARY).is_file() && e.path().join(CORE_LOADER_NAME).is_dir()
        });

    if let Some(entry) = found {
        return Ok(entry.into_path());
    }

    let mut seen: Vec<String> = fs::read_dir(payload_root)?
        .flatten()
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    seen.sort();

    Err(Error::Structural(format!(
        "Loader archive must contain {} and a {} folder\n\nFound: {}",
        LOADER_LIBRARY,
        CORE_LOADER_NAME,
        if seen.is_empty() {
            "(nothing)".to_string()
        } else {
            seen.join(", ")
        }
    )))
}

/// Install the core loader from an extracted archive into `game_dir`
///
/// An existing `winmm.dll` is saved as `winmm.dll.backup` and an existing
/// `GDWeave` folder is copied to `GDWeave.backup`, replacing stale backups.
pub fn install_loader(payload_root: &Path, game_dir: &Path) -> Result<InstallOutcome> {
    if !game_dir.is_dir() {
        return Err(Error::Filesystem(format!(
            "Game directory not found: {}",
            game_dir.display()
        )));
    }

    let source = find_loader_root(payload_root)?;
    let library = game_dir.join(LOADER_LIBRARY);
    let loader_dir = game_dir.join(CORE_LOADER_NAME);

    if library.exists() {
        let backup = game_dir.join(format!("{}.backup", LOADER_LIBRARY));
        fs::copy(&library, &backup).map_err(|e| {
            Error::Filesystem(format!("Cannot back up {}: {}", library.display(), e))
        })?;
        tracing::info!(backup = %backup.display(), "backed up loader library");
    }

    if loader_dir.exists() {
        let backup = game_dir.join(format!("{}.backup", CORE_LOADER_NAME));
        if backup.exists() {
            fs::remove_dir_all(&backup).map_err(|e| {
                Error::Filesystem(format!("Cannot remove stale {}: {}", backup.display(), e))
            })?;
        }
        copy_dir_merge(&loader_dir, &backup)?;
        tracing::info!(backup = %backup.display(), "backed up loader folder");
    }

    fs::copy(source.join(LOADER_LIBRARY), &library).map_err(|e| {
        Error::Filesystem(format!("Cannot install {}: {}", library.display(), e))
    })?;
    copy_dir_merge(&source.join(CORE_LOADER_NAME), &loader_dir)?;

    Ok(InstallOutcome::Installed(CORE_LOADER_NAME.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn id(author: &str, name: &str) -> PackageIdentifier {
        PackageIdentifier::new("webfishing", author, name)
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_is_core_loader() {
        assert!(is_core_loader("NotNet", "GDWeave"));
        assert!(is_core_loader("notnet", "gdweave"));
        assert!(is_core_loader("GDWeave", "GDWeave"));
        assert!(!is_core_loader("TeamLure", "GDWeave"));
        assert!(!is_core_loader("NotNet", "LureRefreshed"));
    }

    #[test]
    fn test_install_then_skip() {
        let temp = TempDir::new().unwrap();
        let payload = temp.path().join("scratch/LureRefreshed");
        write(&payload.join("LureRefreshed.dll"), "v1");
        write(&payload.join("assets/lure.pck"), "data");

        let installer = Installer::new(temp.path().join("mods"));
        let lure = id("TeamLure", "LureRefreshed");
        assert!(!installer.is_installed(&lure));

        let outcome = installer.install(&lure, &payload).unwrap();
        assert_eq!(outcome, InstallOutcome::Installed("LureRefreshed".to_string()));
        assert!(installer.is_installed(&lure));

        let installed = temp.path().join("mods/LureRefreshed");
        assert_eq!(
            fs::read_to_string(installed.join("LureRefreshed.dll")).unwrap(),
            "v1"
        );
        assert!(installed.join("assets/lure.pck").is_file());

        // A second attempt with different content must leave the install alone
        write(&payload.join("LureRefreshed.dll"), "v2");
        let outcome = installer.install(&lure, &payload).unwrap();
        assert!(matches!(outcome, InstallOutcome::Skipped(_)));
        assert_eq!(
            fs::read_to_string(installed.join("LureRefreshed.dll")).unwrap(),
            "v1"
        );
    }

    #[test]
    fn test_directory_named_full_name_counts_as_installed() {
        let temp = TempDir::new().unwrap();
        let mods = temp.path().join("mods");
        fs::create_dir_all(mods.join("nested/TeamLure-LureRefreshed")).unwrap();

        let installer = Installer::new(&mods);
        assert!(installer.is_installed(&id("TeamLure", "LureRefreshed")));
        assert!(!installer.is_installed(&id("TeamLure", "Other")));
    }

    #[test]
    fn test_ledger_entry_requires_folder() {
        let temp = TempDir::new().unwrap();
        let mods = temp.path().join("mods");
        fs::create_dir_all(&mods).unwrap();

        let mut ledger = InstallLedger::load(&mods);
        assert!(ledger.is_empty());
        ledger.record("Sulayre-Lure", "Lure");
        ledger.save(&mods).unwrap();

        let installer = Installer::new(&mods);
        let lure = id("Sulayre", "Lure");
        assert!(!installer.is_installed(&lure));

        fs::create_dir_all(mods.join("Lure")).unwrap();
        assert!(installer.is_installed(&lure));
    }

    #[test]
    fn test_merge_overwrites_same_named_files() {
        let temp = TempDir::new().unwrap();
        let mods = temp.path().join("mods");
        write(&mods.join("Shared/keep.txt"), "kept");
        write(&mods.join("Shared/config.json"), "old");

        let payload = temp.path().join("scratch/Shared");
        write(&payload.join("config.json"), "new");

        let installer = Installer::new(&mods);
        installer.install(&id("A", "B"), &payload).unwrap();

        assert_eq!(fs::read_to_string(mods.join("Shared/keep.txt")).unwrap(), "kept");
        assert_eq!(fs::read_to_string(mods.join("Shared/config.json")).unwrap(), "new");
        assert_eq!(InstallLedger::load(&mods).folder_for("A-B"), Some("Shared"));
    }

    #[test]
    fn test_install_loader_with_backups() {
        let temp = TempDir::new().unwrap();
        let game = temp.path().join("WEBFISHING");
        write(&game.join("winmm.dll"), "old loader");
        write(&game.join("GDWeave/mods/Existing/Existing.dll"), "mod");

        let payload = temp.path().join("NotNet-GDWeave");
        write(&payload.join("winmm.dll"), "new loader");
        write(&payload.join("GDWeave/core/GDWeave.dll"), "core");

        let outcome = install_loader(&payload, &game).unwrap();
        assert_eq!(outcome, InstallOutcome::Installed("GDWeave".to_string()));

        assert_eq!(fs::read_to_string(game.join("winmm.dll")).unwrap(), "new loader");
        assert_eq!(
            fs::read_to_string(game.join("winmm.dll.backup")).unwrap(),
            "old loader"
        );
        assert!(game.join("GDWeave/core/GDWeave.dll").is_file());
        assert!(game.join("GDWeave/mods/Existing/Existing.dll").is_file());
        assert!(game.join("GDWeave.backup/mods/Existing/Existing.dll").is_file());
        assert!(!game.join("GDWeave.backup/core").exists());
    }

    #[test]
    fn test_install_loader_finds_nested_root() {
        let temp = TempDir::new().unwrap();
        let game = temp.path().join("game");
        fs::create_dir_all(&game).unwrap();

        let payload = temp.path().join("extract");
        write(&payload.join("GDWeave-2.0/winmm.dll"), "loader");
        write(&payload.join("GDWeave-2.0/GDWeave/core/GDWeave.dll"), "core");

        install_loader(&payload, &game).unwrap();
        assert!(game.join("winmm.dll").is_file());
        assert!(!game.join("winmm.dll.backup").exists());
    }

    #[test]
    fn test_install_loader_wrong_layout() {
        let temp = TempDir::new().unwrap();
        let game = temp.path().join("game");
        fs::create_dir_all(&game).unwrap();

        let payload = temp.path().join("extract");
        write(&payload.join("README.md"), "hi");

        let err = install_loader(&payload, &game).unwrap_err();
        match err {
            Error::Structural(msg) => assert!(msg.contains("README.md")),
            other => panic!("unexpected error: {}", other),
        }
    }
}
