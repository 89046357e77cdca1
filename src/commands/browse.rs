use anyhow::Result;
use chrono::DateTime;
use webloader::{
    BatchOptions, BatchOrchestrator, Cascade, Config, PackageIdentifier, RegistryClient,
    RegistryPackageMetadata,
};

const DESCRIPTION_WIDTH: usize = 72;

pub fn run(
    community: Option<String>,
    page: u32,
    page_size: u32,
    install: Vec<String>,
) -> Result<()> {
    let config = Config::load()?;
    let community = community.unwrap_or_else(|| config.registry.community.clone());
    let registry = RegistryClient::from_config(&config)?;

    let spinner = super::spinner(&format!("Fetching {} packages...", community))?;
    let packages = registry.list_packages(&community, page.max(1), page_size.max(1));
    spinner.finish_and_clear();
    let packages = packages?;

    if packages.is_empty() {
        println!("No packages found on page {} of '{}'", page, community);
        return Ok(());
    }

    if !install.is_empty() {
        return install_listed(&config, registry, &community, packages, &install);
    }

    println!("Most downloaded in '{}' (page {}):", community, page);
    println!();
    for package in &packages {
        print_package(package, &community, &config.registry.origin);
    }

    println!("Install with:");
    println!("  webloader install <URL>...");
    println!("  webloader browse --install <AUTHOR-NAME>...");

    Ok(())
}

/// Install packages picked from the listing, reusing the listed records
fn install_listed(
    config: &Config,
    registry: RegistryClient,
    community: &str,
    packages: Vec<RegistryPackageMetadata>,
    wanted: &[String],
) -> Result<()> {
    let picked = pick_packages(packages, wanted)?;
    let urls: Vec<String> = picked
        .iter()
        .filter_map(|package| {
            let (owner, name) = (package.owner()?, package.name()?);
            Some(PackageIdentifier::new(community, owner, name).page_url(&config.registry.origin))
        })
        .collect();

    let mut options = BatchOptions::from_config(config);
    options.community = Some(community.to_string());

    println!(
        "Installing {} listed package{} into {}",
        urls.len(),
        if urls.len() == 1 { "" } else { "s" },
        options.mods_dir.display()
    );
    println!();

    let handle = BatchOrchestrator::new(registry, Cascade::standard(), options)
        .with_prefetched(picked)
        .spawn(urls);
    super::install::follow_batch(handle)
}

/// Listed records whose full name matches one of `wanted`, in `wanted` order
fn pick_packages(
    packages: Vec<RegistryPackageMetadata>,
    wanted: &[String],
) -> Result<Vec<RegistryPackageMetadata>> {
    let mut picked = Vec::new();
    for full_name in wanted {
        let found = packages
            .iter()
            .find(|p| p.full_name().is_some_and(|n| n.eq_ignore_ascii_case(full_name)));
        match found {
            Some(package) => picked.push(package.clone()),
            None => anyhow::bail!(
                "{} is not on this page\n\nHint: check the name or pick another --page",
                full_name
            ),
        }
    }
    Ok(picked)
}

fn print_package(package: &RegistryPackageMetadata, community: &str, origin: &str) {
    let full_name = package.full_name().unwrap_or_else(|| "(unnamed)".to_string());
    let version = package.latest_version_number().unwrap_or("?");
    let downloads = package.downloads().unwrap_or(0);

    println!("  {} v{} ({} downloads)", full_name, version, downloads);

    if let Some(updated) = package.date_updated().and_then(format_date) {
        println!("    Updated: {}", updated);
    }
    if let Some(description) = package.description().filter(|d| !d.is_empty()) {
        println!("    {}", truncate(description, DESCRIPTION_WIDTH));
    }
    if let (Some(owner), Some(name)) = (package.owner(), package.name()) {
        println!(
            "    {}",
            PackageIdentifier::new(community, owner, name).page_url(origin)
        );
    }
    println!();
}

fn format_date(raw: &str) -> Option<String> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|date| date.format("%Y-%m-%d").to_string())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let cut: String = text.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_date() {
        assert_eq!(
            format_date("2024-11-02T21:14:09.123456Z").as_deref(),
            Some("2024-11-02")
        );
        assert_eq!(format_date("yesterday"), None);
    }

    #[test]
    fn test_pick_packages_keeps_requested_order() {
        let listing = vec![
            RegistryPackageMetadata::new(json!({"owner": "TeamLure", "name": "LureRefreshed"})),
            RegistryPackageMetadata::new(json!({"owner": "Zea", "name": "Tackle"})),
        ];

        let picked = pick_packages(
            listing.clone(),
            &["zea-tackle".to_string(), "TeamLure-LureRefreshed".to_string()],
        )
        .unwrap();
        let names: Vec<String> = picked.iter().filter_map(|p| p.full_name()).collect();
        assert_eq!(names, vec!["Zea-Tackle", "TeamLure-LureRefreshed"]);

        assert!(pick_packages(listing, &["Ghost-Mod".to_string()]).is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a fairly long description", 10), "a fairl...");
    }
}
