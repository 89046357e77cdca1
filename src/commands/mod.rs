use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::time::Duration;
use webloader::{parse_package_url, Config, PackageIdentifier};

pub mod browse;
pub mod config;
pub mod deps;
pub mod doctor;
pub mod install;
pub mod preset;
pub mod resolve;

/// Start a steadily ticking spinner with `message`
pub fn spinner(message: &str) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.blue} {msg}")?
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    Ok(spinner)
}

/// Ask a yes/no question; an empty answer means yes
pub fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [Y/n]: ", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    let answer = answer.trim().to_lowercase();

    Ok(answer.is_empty() || answer == "y" || answer == "yes")
}

/// Parse a package URL argument, honoring the configured community scope
pub fn parse_url_arg(url: &str, config: &Config) -> Result<PackageIdentifier> {
    let id = parse_package_url(url).ok_or_else(|| webloader::Error::InvalidUrl(url.to_string()))?;

    if config.registry.scoped && !id.in_community(&config.registry.community) {
        anyhow::bail!(
            "{} belongs to the '{}' community, not '{}'\n\n\
             Hint: pass --all-communities or run\n  \
             webloader config set registry.scoped false",
            id,
            id.community,
            config.registry.community
        );
    }

    Ok(id)
}
