use anyhow::Result;
use std::path::PathBuf;
use webloader::{parse_package_url, Preset};

pub fn run(action: &crate::PresetAction) -> Result<()> {
    use crate::PresetAction;

    match action {
        PresetAction::Save { name, urls, output } => save_preset(name, urls, output.as_ref()),
        PresetAction::Show { file } => show_preset(file),
    }
}

fn save_preset(name: &str, urls: &[String], output: Option<&PathBuf>) -> Result<()> {
    for url in urls {
        if parse_package_url(url).is_none() {
            println!("  ⚠ Not a package URL, saved anyway: {}", url);
        }
    }

    let preset = Preset::new(name, urls.to_vec())?;
    let path = output
        .cloned()
        .unwrap_or_else(|| PathBuf::from(preset.file_name()));
    preset.save(&path)?;

    println!(
        "✓ Saved preset '{}' with {} package{} to {}",
        preset.name,
        urls.len(),
        if urls.len() == 1 { "" } else { "s" },
        path.display()
    );
    println!();
    println!("Install it with:");
    println!("  webloader install --preset {}", path.display());

    Ok(())
}

fn show_preset(file: &PathBuf) -> Result<()> {
    let loaded = Preset::load(file)?;
    let preset = &loaded.preset;

    println!("Preset: {}", if preset.name.is_empty() { "(unnamed)" } else { &preset.name });
    if !preset.created_at.is_empty() {
        println!("Created: {}", preset.created_at);
    }
    if !preset.created_by.is_empty() {
        println!("Created by: {}", preset.created_by);
    }
    println!();

    for url in &preset.mod_urls {
        match parse_package_url(url) {
            Some(id) => println!("  ✓ {} ({})", id.full_name, url),
            None => println!("  ✗ {} (not a package URL, will be skipped)", url),
        }
    }
    println!();
    println!(
        "{} of {} entries installable",
        loaded.identifiers.len(),
        preset.mod_urls.len()
    );

    Ok(())
}
