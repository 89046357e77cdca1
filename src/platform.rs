//! Platform probes: game client liveness and game directory detection
//!
//! Nothing in a batch depends on this module. The CLI uses it to report
//! client status in `doctor` and to find a default destination for the core
//! loader when `install.game_dir` is not configured.
//!
//! # Examples
//!
//! ```no_run
//! use webloader::platform::{detect_game_dir, PlatformClient, SteamClient};
//!
//! let steam = SteamClient;
//! println!("Steam running: {}", steam.is_running());
//!
//! if let Some(dir) = detect_game_dir() {
//!     println!("Game found at {}", dir.display());
//! }
//! ```

use regex::Regex;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

/// Install folder of the game under `steamapps/common`
pub const GAME_FOLDER: &str = "WEBFISHING";

/// Narrow view of the desktop client that launches the game
pub trait PlatformClient {
    fn name(&self) -> &'static str;

    /// The client process exists
    fn is_running(&self) -> bool;

    /// The client is far enough along to launch games
    fn is_ready(&self) -> bool;
}

/// Process-table probe for Steam
#[derive(Debug, Default, Clone, Copy)]
pub struct SteamClient;

const STEAM_PROCESSES: &[&str] = &["steam", "steam.exe", "steam_osx"];
const STEAM_HELPERS: &[&str] = &["steamwebhelper", "steamwebhelper.exe"];

impl PlatformClient for SteamClient {
    fn name(&self) -> &'static str {
        "Steam"
    }

    fn is_running(&self) -> bool {
        let processes = running_processes();
        STEAM_PROCESSES
            .iter()
            .any(|name| processes.iter().any(|p| p == name))
    }

    fn is_ready(&self) -> bool {
        // The web helper only starts once the client has finished logging in
        let processes = running_processes();
        let helper = STEAM_HELPERS
            .iter()
            .any(|name| processes.iter().any(|p| p == name));
        helper && self.is_running()
    }
}

/// Lowercased executable names of running processes
fn running_processes() -> Vec<String> {
    if cfg!(windows) {
        // tasklist /FO CSV /NH prints `"steam.exe","1234",...`
        return Command::new("tasklist")
            .args(["/FO", "CSV", "/NH"])
            .output()
            .map(|out| {
                String::from_utf8_lossy(&out.stdout)
                    .lines()
                    .filter_map(|line| line.split(',').next())
                    .map(|name| name.trim_matches('"').to_lowercase())
                    .collect()
            })
            .unwrap_or_default();
    }

    if let Ok(entries) = fs::read_dir("/proc") {
        return entries
            .flatten()
            .filter_map(|entry| fs::read_to_string(entry.path().join("comm")).ok())
            .map(|comm| comm.trim().to_lowercase())
            .collect();
    }

    Command::new("ps")
        .args(["-A", "-o", "comm="])
        .output()
        .map(|out| {
            String::from_utf8_lossy(&out.stdout)
                .lines()
                .filter_map(|line| Path::new(line.trim()).file_name())
                .map(|name| name.to_string_lossy().to_lowercase())
                .collect()
        })
        .unwrap_or_default()
}

fn is_wsl() -> bool {
    env::var("WSL_DISTRO_NAME").is_ok()
        || fs::read_to_string("/proc/version")
            .map(|v| v.contains("microsoft") || v.contains("WSL"))
            .unwrap_or(false)
}

/// Default Steam installation roots for this platform
pub fn steam_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();

    if cfg!(windows) {
        for var in ["ProgramFiles(x86)", "ProgramFiles"] {
            if let Ok(dir) = env::var(var) {
                roots.push(PathBuf::from(dir).join("Steam"));
            }
        }
    } else if is_wsl() {
        roots.push(PathBuf::from("/mnt/c/Program Files (x86)/Steam"));
        roots.push(PathBuf::from("/mnt/c/Program Files/Steam"));
    } else if let Some(home) = dirs::home_dir() {
        if cfg!(target_os = "macos") {
            roots.push(home.join("Library/Application Support/Steam"));
        } else {
            roots.push(home.join(".steam/steam"));
            roots.push(home.join(".local/share/Steam"));
            roots.push(home.join(".var/app/com.valvesoftware.Steam/.local/share/Steam"));
        }
    }

    roots
}

static LIBRARY_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""path"\s+"([^"]+)""#).expect("library path pattern is valid")
});

/// Extra library folders listed in `steamapps/libraryfolders.vdf`
pub fn library_folders(steam_root: &Path) -> Vec<PathBuf> {
    let vdf = steam_root.join("steamapps").join("libraryfolders.vdf");
    let Ok(content) = fs::read_to_string(&vdf) else {
        return Vec::new();
    };

    LIBRARY_PATH
        .captures_iter(&content)
        .map(|caps| PathBuf::from(caps[1].replace("\\\\", "\\")))
        .collect()
}

/// First `<library>/steamapps/common/WEBFISHING` that exists
pub fn game_dir_in(libraries: &[PathBuf]) -> Option<PathBuf> {
    libraries
        .iter()
        .map(|lib| lib.join("steamapps").join("common").join(GAME_FOLDER))
        .find(|dir| dir.is_dir())
}

/// Probe the standard Steam libraries for the game
pub fn detect_game_dir() -> Option<PathBuf> {
    let mut libraries = Vec::new();
    for root in steam_roots() {
        let extra = library_folders(&root);
        libraries.push(root);
        libraries.extend(extra);
    }

    let found = game_dir_in(&libraries);
    match &found {
        Some(dir) => tracing::debug!(dir = %dir.display(), "detected game directory"),
        None => tracing::debug!(searched = libraries.len(), "game directory not found"),
    }
    found
}
