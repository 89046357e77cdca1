use anyhow::Result;
use webloader::{Cascade, Config, Error, RegistryClient};

pub fn run(url: String) -> Result<()> {
    let config = Config::load()?;
    let id = super::parse_url_arg(&url, &config)?;
    let registry = RegistryClient::from_config(&config)?;

    let spinner = super::spinner(&format!("Resolving {}...", id))?;
    let resolved = Cascade::standard().resolve_with_strategy(&registry, &id, None);
    spinner.finish_and_clear();

    let (strategy, artifact) =
        resolved.ok_or_else(|| Error::PackageNotFound(id.full_name.clone()))?;

    println!("✓ {}", id.full_name);
    println!("  Download: {}", artifact.download_url);
    println!("  File:     {}", artifact.filename);
    println!("  Found by: {}", strategy);

    Ok(())
}
