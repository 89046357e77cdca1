use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

/// WebLoader - Install Thunderstore mods straight from package page URLs
#[derive(Parser)]
#[command(name = "webloader")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Show debug logs on stderr (same as WEBLOADER_LOG=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download and install mods from package page URLs
    Install {
        /// Package page URLs (e.g., https://thunderstore.io/c/webfishing/p/TeamLure/LureRefreshed/)
        urls: Vec<String>,

        /// Also install every URL listed in a preset file
        #[arg(short, long)]
        preset: Option<PathBuf>,

        /// Mods directory (overrides install.mods_dir)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Game directory for the GDWeave loader (overrides install.game_dir)
        #[arg(long)]
        game_dir: Option<PathBuf>,

        /// Accept every suggested dependency without asking
        #[arg(short, long)]
        yes: bool,

        /// Do not look for dependencies
        #[arg(long, conflicts_with = "yes")]
        no_deps: bool,

        /// Accept URLs from any community, not just the configured one
        #[arg(long)]
        all_communities: bool,
    },

    /// Show where a package would be downloaded from
    Resolve {
        /// Package page URL
        url: String,
    },

    /// List the dependencies a package would suggest
    Deps {
        /// Package page URL
        url: String,
    },

    /// Browse the most downloaded packages of a community
    Browse {
        /// Community to list (defaults to registry.community)
        #[arg(short, long)]
        community: Option<String>,

        /// Page number, starting at 1
        #[arg(short, long, default_value_t = 1)]
        page: u32,

        /// Packages per page
        #[arg(long, default_value_t = 20)]
        page_size: u32,

        /// Install listed packages by full name (e.g., TeamLure-LureRefreshed)
        #[arg(short, long, num_args = 1..)]
        install: Vec<String>,
    },

    /// Save or inspect preset files
    Preset {
        #[command(subcommand)]
        action: PresetAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Diagnose setup issues
    Doctor,

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum PresetAction {
    /// Save URLs as a named preset
    Save {
        /// Preset name
        name: String,

        /// Package page URLs, in install order
        #[arg(required = true)]
        urls: Vec<String>,

        /// Output file (defaults to <name>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the contents of a preset file
    Show {
        /// Preset file
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., install.mods_dir)
        key: String,
        /// Configuration value
        value: String,
    },

    /// Print the config file path
    Path,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("WEBLOADER_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Install {
            urls,
            preset,
            dir,
            game_dir,
            yes,
            no_deps,
            all_communities,
        } => commands::install::run(commands::install::InstallArgs {
            urls,
            preset,
            dir,
            game_dir,
            yes,
            no_deps,
            all_communities,
        }),
        Commands::Resolve { url } => commands::resolve::run(url),
        Commands::Deps { url } => commands::deps::run(url),
        Commands::Browse {
            community,
            page,
            page_size,
            install,
        } => commands::browse::run(community, page, page_size, install),
        Commands::Preset { action } => commands::preset::run(&action),
        Commands::Config { action } => commands::config::run(&action),
        Commands::Doctor => commands::doctor::run(cli.verbose),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "webloader", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
