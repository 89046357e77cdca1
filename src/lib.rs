//! WebLoader - Thunderstore mod installer driven by plain package page URLs
//!
//! Give it the URL of a package page and WebLoader figures out where the
//! archive lives, downloads it, checks it and merges the mod into your mods
//! folder. It is built for WEBFISHING and its GDWeave loader but works with
//! any Thunderstore community.
//!
//! - Resolution cascade over the experimental API, the legacy v1 API, the
//!   package page HTML and brute-force version probes
//! - Streamed downloads with byte-count verification and CRC-checked archives
//! - Innermost-payload detection for archives with arbitrary wrapper folders
//! - Idempotent installs that never clobber an existing mod
//! - Dependency suggestions with user confirmation
//! - Presets and batch summaries compatible with the WebLoader GUI
//!
//! # Examples
//!
//! ```no_run
//! use webloader::batch::{BatchOptions, BatchOrchestrator};
//! use webloader::{Cascade, Config, RegistryClient};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load()?;
//! let client = RegistryClient::from_config(&config)?;
//!
//! let options = BatchOptions::from_config(&config);
//! let batch = BatchOrchestrator::new(client, Cascade::standard(), options);
//! let summary = batch.run(&[
//!     "https://thunderstore.io/c/webfishing/p/TeamLure/LureRefreshed/".to_string(),
//! ]);
//!
//! println!("{} installed, {} failed", summary.successful, summary.failed);
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`identifier`] - Parse package page URLs
//! - [`registry`] - HTTP access to registry APIs and pages
//! - [`cascade`] - Ordered resolution strategies
//! - [`scrape`] - Pattern matchers over package page HTML
//! - [`fetcher`] - Streamed artifact downloads
//! - [`extract`] - Archive verification, expansion and payload discovery
//! - [`installer`] - Idempotent installs and core loader setup
//! - [`dependencies`] - Dependency suggestions
//! - [`preset`] - Preset and auto-preset files
//! - [`batch`] - Sequential batch processing with events
//! - [`platform`] - Steam probes and game directory detection
//! - [`config`] - User configuration management
//! - [`error`] - Error types and result handling

pub mod batch;
pub mod cascade;
pub mod config;
pub mod dependencies;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod identifier;
pub mod installer;
pub mod platform;
pub mod preset;
pub mod registry;
pub mod scrape;

pub use batch::{
    spawn_batch, BatchEvent, BatchHandle, BatchOptions, BatchOrchestrator, BatchSummary, Severity,
};
pub use cascade::{Cascade, ResolutionStrategy, ResolvedArtifact};
pub use config::Config;
pub use dependencies::{discover_dependencies, suggest_dependencies, DependencyReference};
pub use error::{Error, Result};
pub use extract::{extract_archive, find_payload_dir, verify_archive};
pub use fetcher::{download_artifact, ProgressCallback};
pub use identifier::{parse_package_url, PackageIdentifier, DEFAULT_COMMUNITY};
pub use installer::{install_loader, is_core_loader, InstallOutcome, Installer};
pub use platform::{detect_game_dir, PlatformClient, SteamClient};
pub use preset::{AutoPreset, LoadedPreset, Preset};
pub use registry::{RegistryClient, RegistryPackageMetadata, RegistrySource};
