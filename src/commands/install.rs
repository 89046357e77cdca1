use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use webloader::{
    discover_dependencies, spawn_batch, BatchEvent, BatchHandle, BatchOptions, BatchSummary,
    Cascade, Config, DependencyReference, Installer, PackageIdentifier, Preset, RegistryClient,
    Severity,
};

pub struct InstallArgs {
    pub urls: Vec<String>,
    pub preset: Option<PathBuf>,
    pub dir: Option<PathBuf>,
    pub game_dir: Option<PathBuf>,
    pub yes: bool,
    pub no_deps: bool,
    pub all_communities: bool,
}

pub fn run(args: InstallArgs) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(dir) = args.dir {
        config.install.mods_dir = dir;
    }
    if let Some(game_dir) = args.game_dir {
        config.install.game_dir = Some(game_dir);
    }
    if args.all_communities {
        config.registry.scoped = false;
    }

    let mut urls = args.urls;
    if let Some(ref preset_path) = args.preset {
        let loaded = Preset::load(preset_path)?;
        let valid = loaded.valid_urls();
        println!(
            "📋 Loaded preset '{}' ({} package{})",
            loaded.preset.name,
            valid.len(),
            if valid.len() == 1 { "" } else { "s" }
        );
        let skipped = loaded.preset.mod_urls.len() - valid.len();
        if skipped > 0 {
            println!("  ⚠ Ignored {} entries that are not package URLs", skipped);
        }
        urls.extend(valid);
    }

    if urls.is_empty() {
        anyhow::bail!(
            "No package URLs given\n\n\
             Usage:\n  \
             webloader install <URL>...\n  \
             webloader install --preset <FILE>"
        );
    }

    let client = RegistryClient::from_config(&config)?;

    let options = BatchOptions::from_config(&config);

    if !args.no_deps {
        println!("🔍 Checking dependencies...");
        let yes = args.yes;
        let installer = Installer::new(&options.mods_dir);
        urls = discover_dependencies(&client, &installer, &urls, |id, deps| {
            offer_dependencies(id, deps, yes)
        });
    }

    println!();
    println!(
        "Installing {} package{} into {}",
        urls.len(),
        if urls.len() == 1 { "" } else { "s" },
        options.mods_dir.display()
    );
    println!();

    follow_batch(spawn_batch(client, Cascade::standard(), options, urls))
}

/// Render a running batch and fail if any package failed
pub fn follow_batch(handle: BatchHandle) -> Result<()> {
    let mut bar: Option<ProgressBar> = None;

    for event in handle.events.iter() {
        match event {
            BatchEvent::Started {
                index,
                total,
                package,
            } => {
                println!("[{}/{}] {}", index, total, package);
            }
            BatchEvent::Progress {
                message,
                current,
                total,
            } => {
                let progress = match bar.take() {
                    Some(existing) => existing,
                    None => download_bar(&message, total)?,
                };
                progress.set_position(current);
                if current >= total {
                    progress.finish_and_clear();
                } else {
                    bar = Some(progress);
                }
            }
            BatchEvent::Log { severity, message } => {
                if let Some(progress) = bar.take() {
                    progress.finish_and_clear();
                }
                println!("  {} {}", symbol(severity), message);
            }
            BatchEvent::Item { .. } => {}
            BatchEvent::Finished(summary) => print_summary(&summary),
        }
    }

    let summary = handle.wait()?;
    if summary.failed > 0 {
        anyhow::bail!(
            "{} package{} failed to install",
            summary.failed,
            if summary.failed == 1 { "" } else { "s" }
        );
    }

    Ok(())
}

fn download_bar(message: &str, total: u64) -> Result<ProgressBar> {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("  {msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes}")?
            .progress_chars("=> "),
    );
    bar.set_message(message.to_string());
    Ok(bar)
}

fn symbol(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "·",
        Severity::Success => "✓",
        Severity::Warning => "⚠",
        Severity::Error => "✗",
    }
}

fn offer_dependencies(
    id: &PackageIdentifier,
    deps: Vec<DependencyReference>,
    yes: bool,
) -> Vec<DependencyReference> {
    println!();
    println!("  {} depends on:", id.full_name);
    for dep in &deps {
        println!("    - {}", dep);
    }

    if yes {
        println!("  ✓ Adding {} dependencies (--yes)", deps.len());
        return deps;
    }

    match super::confirm("  Add them to the install list?") {
        Ok(true) => deps,
        Ok(false) => Vec::new(),
        Err(e) => {
            tracing::warn!("could not read answer: {}", e);
            Vec::new()
        }
    }
}

fn print_summary(summary: &BatchSummary) {
    println!();
    println!("========================================");
    println!("=== DOWNLOAD SUMMARY ===");
    println!("========================================");
    println!("  ✓ Installed: {}", summary.successful);
    println!("  ↷ Skipped:   {}", summary.skipped);
    println!("  ✗ Failed:    {}", summary.failed);
    println!("  📁 Mods folder: {}", summary.target_directory.display());
    if !summary.installed_folders.is_empty() {
        println!();
        println!("  Installed folders:");
        for folder in &summary.installed_folders {
            println!("    - {}", folder);
        }
    }
    println!();
}
