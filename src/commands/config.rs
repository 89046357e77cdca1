use anyhow::Result;
use webloader::Config;

pub fn run(action: &crate::ConfigAction) -> Result<()> {
    use crate::ConfigAction;

    match action {
        ConfigAction::Show => show_config(),
        ConfigAction::Set { key, value } => set_config(key, value),
        ConfigAction::Path => {
            println!("{}", Config::default_path()?.display());
            Ok(())
        }
    }
}

fn show_config() -> Result<()> {
    let config = Config::load()?;
    let config_path = Config::default_path()?;

    println!();
    println!("╔══════════════════════════════════════════════════════════════════════════════╗");
    println!("║                         WebLoader Configuration                              ║");
    println!("╚══════════════════════════════════════════════════════════════════════════════╝");
    println!();
    println!("  📁 Config file: {}", config_path.display());
    println!();

    println!("┌─ Registry ───────────────────────────────────────────────────────────────────┐");
    println!("  Origin:            {}", config.registry.origin);
    println!("  Community:         {}", config.registry.community);
    println!("  Community only:    {}", format_bool(config.registry.scoped));
    println!("  User agent:        {}", truncate(&config.registry.user_agent, 56));
    println!(
        "  Timeouts:          {}s requests, {}s downloads, {}s probes",
        config.registry.request_timeout_secs,
        config.registry.download_timeout_secs,
        config.registry.probe_timeout_secs
    );
    println!("└──────────────────────────────────────────────────────────────────────────────┘");
    println!();

    println!("┌─ Install ────────────────────────────────────────────────────────────────────┐");
    println!("  Mods directory:    {}", config.install.mods_dir.display());
    match (&config.install.game_dir, config.install.resolve_game_dir()) {
        (Some(dir), _) => println!("  Game directory:    {}", dir.display()),
        (None, Some(detected)) => {
            println!("  Game directory:    {} (auto-detected)", detected.display())
        }
        (None, None) => println!("  Game directory:    not set, not detected"),
    }
    println!("  Cooldown:          {} ms", config.install.cooldown_ms);
    println!("└──────────────────────────────────────────────────────────────────────────────┘");
    println!();

    println!("💡 Modify settings:");
    println!("   webloader config set <key> <value>");
    println!();
    println!("   Available keys:");
    for key in Config::KEYS {
        println!("     • {}", key);
    }
    println!();

    Ok(())
}

fn format_bool(value: bool) -> &'static str {
    if value {
        "✅ yes"
    } else {
        "❌ no"
    }
}

fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

fn set_config(key: &str, value: &str) -> Result<()> {
    let mut config = Config::load()?;

    println!();
    println!("⚙️  Updating configuration...");
    println!();

    if let Err(e) = config.set(key, value) {
        println!("  ✗ {}", e);
        println!();
        println!("  Available keys:");
        for key in Config::KEYS {
            println!("    • {}", key);
        }
        println!();
        return Err(e.into());
    }

    config.save()?;
    println!("  ✓ {} = \"{}\"", key, value);
    println!();
    println!("✅ Configuration saved to: {}", Config::default_path()?.display());
    println!();

    Ok(())
}
