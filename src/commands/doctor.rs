//! Doctor command - diagnose setup issues
//!
//! Checks:
//! - Configuration validity
//! - Registry connectivity
//! - Mods directory
//! - Game directory and GDWeave loader
//! - Steam client status

use anyhow::Result;
use std::fs;
use std::time::{Duration, Instant};
use webloader::platform::GAME_FOLDER;
use webloader::{Config, PlatformClient, RegistryClient, SteamClient};

/// Status of a check
#[derive(Debug)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckStatus {
    fn symbol(&self) -> &'static str {
        match self {
            CheckStatus::Ok => "✓",
            CheckStatus::Warning => "⚠",
            CheckStatus::Error => "✗",
        }
    }

    fn color_code(&self) -> &'static str {
        match self {
            CheckStatus::Ok => "\x1b[32m",
            CheckStatus::Warning => "\x1b[33m",
            CheckStatus::Error => "\x1b[31m",
        }
    }
}

struct CheckResult {
    name: String,
    status: CheckStatus,
    message: String,
    details: Option<String>,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.to_string(),
            details: None,
        }
    }

    fn with_details(mut self, details: &str) -> Self {
        self.details = Some(details.to_string());
        self
    }

    fn print(&self, verbose: bool) {
        let reset = "\x1b[0m";
        println!(
            "  {}{}{} {} - {}",
            self.status.color_code(),
            self.status.symbol(),
            reset,
            self.name,
            self.message
        );
        if verbose {
            if let Some(ref details) = self.details {
                for line in details.lines() {
                    println!("      {}", line);
                }
            }
        }
    }
}

pub fn run(verbose: bool) -> Result<()> {
    println!("WebLoader Doctor");
    println!("================");
    println!();
    println!("Checking your setup...");
    println!();

    let config = match Config::load() {
        Ok(config) => {
            let details = format!(
                "Origin: {}\nCommunity: {} (scoped: {})\nMods directory: {}",
                config.registry.origin,
                config.registry.community,
                config.registry.scoped,
                config.install.mods_dir.display()
            );
            CheckResult::new("Configuration", CheckStatus::Ok, "Valid configuration loaded")
                .with_details(&details)
                .print(verbose);
            config
        }
        Err(e) => {
            CheckResult::new(
                "Configuration",
                CheckStatus::Error,
                &format!("Failed to load: {}", e),
            )
            .print(verbose);
            println!();
            println!("Fix the config file and run doctor again.");
            return Ok(());
        }
    };

    let results = vec![
        check_registry(&config),
        check_mods_dir(&config),
        check_game_dir(&config),
        check_steam(&SteamClient),
    ];
    for result in &results {
        result.print(verbose);
    }

    let warn_count = results
        .iter()
        .filter(|r| matches!(r.status, CheckStatus::Warning))
        .count();
    let error_count = results
        .iter()
        .filter(|r| matches!(r.status, CheckStatus::Error))
        .count();

    println!();
    println!(
        "Summary: {} passed, {} warnings, {} errors",
        results.len() + 1 - warn_count - error_count,
        warn_count,
        error_count
    );
    println!();

    if error_count > 0 {
        println!("Some checks failed. See above for details.");
        if !verbose {
            println!("Run with --verbose for more information.");
        }
    } else if warn_count > 0 {
        println!("All critical checks passed, but there are some warnings.");
    } else {
        println!("All checks passed! Your setup looks good.");
    }

    Ok(())
}

fn check_registry(config: &Config) -> CheckResult {
    let registry = match RegistryClient::from_config(config) {
        Ok(registry) => registry,
        Err(e) => {
            return CheckResult::new(
                "Registry",
                CheckStatus::Error,
                &format!("Failed to create client: {}", e),
            )
        }
    };

    let start = Instant::now();
    match registry.list_packages(&config.registry.community, 1, 1) {
        Ok(packages) => {
            let elapsed = start.elapsed();
            let details = format!(
                "URL: {}\nCommunity: {}\nResponse time: {:?}",
                config.registry.origin, config.registry.community, elapsed
            );

            if packages.is_empty() {
                CheckResult::new(
                    "Registry",
                    CheckStatus::Warning,
                    &format!("Connected, but '{}' lists no packages", config.registry.community),
                )
                .with_details(&details)
            } else if elapsed > Duration::from_secs(5) {
                CheckResult::new(
                    "Registry",
                    CheckStatus::Warning,
                    &format!("Connected but slow ({:.1}s)", elapsed.as_secs_f64()),
                )
                .with_details(&details)
            } else {
                CheckResult::new("Registry", CheckStatus::Ok, "Connected").with_details(&details)
            }
        }
        Err(e) => CheckResult::new(
            "Registry",
            CheckStatus::Error,
            &format!("Failed to connect: {}", e),
        )
        .with_details(&format!("URL: {}", config.registry.origin)),
    }
}

fn check_mods_dir(config: &Config) -> CheckResult {
    let dir = &config.install.mods_dir;

    if !dir.exists() {
        return CheckResult::new(
            "Mods directory",
            CheckStatus::Ok,
            &format!("{} will be created on first install", dir.display()),
        );
    }

    if !dir.is_dir() {
        return CheckResult::new(
            "Mods directory",
            CheckStatus::Error,
            &format!("{} exists but is not a directory", dir.display()),
        );
    }

    let folders: Vec<String> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .filter(|e| e.path().is_dir())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default();

    CheckResult::new(
        "Mods directory",
        CheckStatus::Ok,
        &format!("{} ({} mod folders)", dir.display(), folders.len()),
    )
    .with_details(&folders.join("\n"))
}

fn check_game_dir(config: &Config) -> CheckResult {
    let Some(game_dir) = config.install.resolve_game_dir() else {
        return CheckResult::new(
            "Game directory",
            CheckStatus::Warning,
            &format!("{} not found; GDWeave cannot be installed", GAME_FOLDER),
        )
        .with_details("Set it with: webloader config set install.game_dir <path>");
    };

    if !game_dir.is_dir() {
        return CheckResult::new(
            "Game directory",
            CheckStatus::Error,
            &format!("{} does not exist", game_dir.display()),
        );
    }

    let has_library = game_dir.join("winmm.dll").is_file();
    let has_loader = game_dir.join("GDWeave").is_dir();
    match (has_library, has_loader) {
        (true, true) => CheckResult::new(
            "Game directory",
            CheckStatus::Ok,
            &format!("{} (GDWeave installed)", game_dir.display()),
        ),
        _ => CheckResult::new(
            "Game directory",
            CheckStatus::Warning,
            &format!("{} (GDWeave not installed)", game_dir.display()),
        )
        .with_details(
            "Install it with:\n  webloader install https://thunderstore.io/c/webfishing/p/NotNet/GDWeave/",
        ),
    }
}

fn check_steam(client: &dyn PlatformClient) -> CheckResult {
    if !client.is_running() {
        CheckResult::new(client.name(), CheckStatus::Warning, "Not running")
    } else if !client.is_ready() {
        CheckResult::new(client.name(), CheckStatus::Warning, "Running but still starting up")
    } else {
        CheckResult::new(client.name(), CheckStatus::Ok, "Running")
    }
}
