use anyhow::Result;
use webloader::{suggest_dependencies, Config, RegistryClient, RegistrySource};

pub fn run(url: String) -> Result<()> {
    let config = Config::load()?;
    let id = super::parse_url_arg(&url, &config)?;
    let registry = RegistryClient::from_config(&config)?;

    let spinner = super::spinner("Fetching package metadata...")?;
    let metadata = registry.package_metadata(&id);
    spinner.finish_and_clear();
    let metadata = metadata?;

    let suggestions = suggest_dependencies(&metadata, std::slice::from_ref(&id));
    if suggestions.is_empty() {
        println!("{} has no dependencies to install", id.full_name);
        return Ok(());
    }

    println!(
        "{} suggests {} dependenc{}:",
        id.full_name,
        suggestions.len(),
        if suggestions.len() == 1 { "y" } else { "ies" }
    );
    for dep in &suggestions {
        println!(
            "  {} - {}",
            dep,
            dep.package_url(&config.registry.origin, &id.community)
        );
    }
    println!();
    println!("Install them together with:");
    println!("  webloader install {}", url);

    Ok(())
}
