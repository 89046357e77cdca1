//! Batch orchestration
//!
//! A batch takes a list of package URLs and drives each one through
//! resolve → download → verify → extract → install, strictly in order.
//! Failures are counted per package and never stop the batch. The core
//! loader is pulled out of the list and installed into the game directory
//! before everything else.
//!
//! Front-ends observe a batch through [`BatchEvent`]s. [`spawn_batch`] runs
//! the orchestrator on a worker thread and hands back the receiving end of
//! the event channel; the last event is always [`BatchEvent::Finished`].
//!
//! # Examples
//!
//! ```no_run
//! use webloader::batch::{spawn_batch, BatchEvent, BatchOptions};
//! use webloader::{Cascade, Config, RegistryClient};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load()?;
//! let client = RegistryClient::from_config(&config)?;
//! let urls = vec!["https://thunderstore.io/c/webfishing/p/TeamLure/LureRefreshed/".to_string()];
//!
//! let handle = spawn_batch(client, Cascade::standard(), BatchOptions::from_config(&config), urls);
//! for event in handle.events.iter() {
//!     if let BatchEvent::Log { message, .. } = event {
//!         println!("{}", message);
//!     }
//! }
//! let summary = handle.wait()?;
//! println!("{} installed", summary.successful);
//! # Ok(())
//! # }
//! ```

use crate::extract::{extract_archive, find_payload_dir, verify_archive};
use crate::fetcher::{download_artifact, ProgressCallback};
use crate::installer::{install_loader, is_core_loader, InstallOutcome, Installer};
use crate::preset::{timestamp_now, AutoPreset};
use crate::{
    parse_package_url, Cascade, Config, Error, PackageIdentifier, RegistryClient,
    RegistryPackageMetadata, Result,
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tempfile::TempDir;

/// File name of the batch summary in the mods directory
pub const SUMMARY_FILE: &str = "download_summary.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Everything a front-end needs to render a running batch
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Log {
        severity: Severity,
        message: String,
    },
    /// Processing of item `index` (1-based) of `total` begins
    Started {
        index: usize,
        total: usize,
        package: String,
    },
    /// Download progress of the current item
    Progress {
        message: String,
        current: u64,
        total: u64,
    },
    /// Final outcome of one item
    Item {
        package: String,
        outcome: InstallOutcome,
    },
    Finished(BatchSummary),
}

/// Counters and installed folders of one batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    #[serde(rename = "successful_downloads")]
    pub successful: usize,

    #[serde(rename = "failed_downloads")]
    pub failed: usize,

    #[serde(rename = "skipped_downloads")]
    pub skipped: usize,

    #[serde(rename = "downloaded_mods")]
    pub installed_folders: BTreeSet<String>,

    #[serde(rename = "download_folder")]
    pub target_directory: PathBuf,

    pub timestamp: String,
}

impl BatchSummary {
    pub fn new(target_directory: &Path) -> Self {
        Self {
            target_directory: target_directory.to_path_buf(),
            timestamp: timestamp_now(),
            ..Default::default()
        }
    }

    pub fn total(&self) -> usize {
        self.successful + self.failed + self.skipped
    }

    fn record(&mut self, outcome: &InstallOutcome) {
        match outcome {
            InstallOutcome::Installed(folder) => {
                self.successful += 1;
                self.installed_folders.insert(folder.clone());
            }
            InstallOutcome::Skipped(_) => self.skipped += 1,
            InstallOutcome::Failed(_) => self.failed += 1,
        }
    }

    /// Write `download_summary.json` into `dir`, returning its path
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(SUMMARY_FILE);
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }
}

/// Where and how a batch installs
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub mods_dir: PathBuf,

    /// Destination of the core loader; loader items fail without it
    pub game_dir: Option<PathBuf>,

    /// Only accept URLs of this community (`None` accepts any)
    pub community: Option<String>,

    /// Pause after every successful install
    pub cooldown: Duration,
}

impl BatchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mods_dir: config.install.mods_dir.clone(),
            game_dir: config.install.resolve_game_dir(),
            community: config
                .registry
                .scoped
                .then(|| config.registry.community.clone()),
            cooldown: config.install.cooldown(),
        }
    }
}

/// Runs batches against one registry
pub struct BatchOrchestrator {
    client: RegistryClient,
    cascade: Cascade,
    options: BatchOptions,
    events: Option<Sender<BatchEvent>>,
    /// Listing records by `full_name`, consulted before any network lookup
    prefetched: HashMap<String, RegistryPackageMetadata>,
}

impl BatchOrchestrator {
    pub fn new(client: RegistryClient, cascade: Cascade, options: BatchOptions) -> Self {
        Self {
            client,
            cascade,
            options,
            events: None,
            prefetched: HashMap::new(),
        }
    }

    /// Resolve packages from already fetched listing records where possible
    pub fn with_prefetched(
        mut self,
        metadata: impl IntoIterator<Item = RegistryPackageMetadata>,
    ) -> Self {
        for record in metadata {
            if let Some(full_name) = record.full_name() {
                self.prefetched.insert(full_name, record);
            }
        }
        self
    }

    /// Run over `urls` on a background thread
    pub fn spawn(self, urls: Vec<String>) -> BatchHandle {
        let (sender, events) = mpsc::channel();
        let orchestrator = self.with_events(sender);
        let join = thread::spawn(move || orchestrator.run(&urls));
        BatchHandle { events, join }
    }

    /// Deliver events to `sender` while running
    pub fn with_events(mut self, sender: Sender<BatchEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    fn emit(&self, event: BatchEvent) {
        if let Some(sender) = &self.events {
            // A front-end that stopped listening does not stop the batch
            let _ = sender.send(event);
        }
    }

    fn log(&self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Info | Severity::Success => tracing::info!("{}", message),
            Severity::Warning => tracing::warn!("{}", message),
            Severity::Error => tracing::error!("{}", message),
        }
        self.emit(BatchEvent::Log { severity, message });
    }

    fn progress_callback(&self) -> Option<ProgressCallback> {
        let sender = self.events.clone()?;
        Some(Arc::new(move |message: &str, current: u64, total: u64| {
            let _ = sender.send(BatchEvent::Progress {
                message: message.to_string(),
                current,
                total,
            });
        }))
    }

    /// Process `urls` in order and return the summary
    ///
    /// Writes `download_summary.json` and `mod_preset.json` into the mods
    /// directory and emits [`BatchEvent::Finished`] last.
    pub fn run(&self, urls: &[String]) -> BatchSummary {
        let mods_dir = self.options.mods_dir.clone();
        let mut summary = BatchSummary::new(&mods_dir);

        match self.prepare(&mods_dir) {
            Ok(scratch) => {
                let processed = panic::catch_unwind(AssertUnwindSafe(|| {
                    self.process_all(urls, scratch.path(), &mut summary)
                }));
                if let Err(payload) = processed {
                    self.log(
                        Severity::Error,
                        format!("Batch aborted: {}", panic_message(payload.as_ref())),
                    );
                }

                let scratch_path = scratch.path().to_path_buf();
                if let Err(e) = scratch.close() {
                    self.log(
                        Severity::Warning,
                        format!("Could not clean up {}: {}", scratch_path.display(), e),
                    );
                }
            }
            Err(e) => self.log(Severity::Error, format!("Batch aborted: {}", e)),
        }

        self.finish(summary)
    }

    fn prepare(&self, mods_dir: &Path) -> Result<TempDir> {
        fs::create_dir_all(mods_dir).map_err(|e| {
            Error::Critical(format!("Cannot create {}: {}", mods_dir.display(), e))
        })?;
        tempfile::Builder::new()
            .prefix("webloader-")
            .tempdir()
            .map_err(|e| Error::Critical(format!("Cannot create scratch directory: {}", e)))
    }

    fn process_all(&self, urls: &[String], scratch: &Path, summary: &mut BatchSummary) {
        let mut loaders = Vec::new();
        let mut packages = Vec::new();

        for url in urls {
            match parse_package_url(url) {
                None => {
                    self.log(Severity::Error, format!("Not a package URL: {}", url));
                    summary.failed += 1;
                }
                Some(id) if !self.in_scope(&id) => {
                    self.log(
                        Severity::Error,
                        format!("{} is outside the {} community", id, id.community),
                    );
                    summary.failed += 1;
                }
                Some(id) if is_core_loader(&id.author, &id.name) => loaders.push(id),
                Some(id) => packages.push(id),
            }
        }

        let total = loaders.len() + packages.len();
        let installer = Installer::new(&self.options.mods_dir);

        for (index, id) in loaders.iter().enumerate() {
            self.emit(BatchEvent::Started {
                index: index + 1,
                total,
                package: id.full_name.clone(),
            });
            let outcome = match &self.options.game_dir {
                Some(game_dir) => self
                    .install_loader_item(id, scratch, game_dir)
                    .unwrap_or_else(|e| InstallOutcome::Failed(e.to_string())),
                None => InstallOutcome::Failed(
                    "No game directory configured for the loader (set install.game_dir)"
                        .to_string(),
                ),
            };
            if matches!(outcome, InstallOutcome::Installed(_)) {
                // The loader lives in the game directory, not in a mods folder
                summary.successful += 1;
            } else {
                summary.record(&outcome);
            }
            self.report(id, outcome);
        }

        for (index, id) in packages.iter().enumerate() {
            self.emit(BatchEvent::Started {
                index: loaders.len() + index + 1,
                total,
                package: id.full_name.clone(),
            });
            let outcome = if installer.is_installed(id) {
                InstallOutcome::Skipped(format!("{} is already installed", id.full_name))
            } else {
                self.install_item(id, scratch, &installer)
                    .unwrap_or_else(|e| InstallOutcome::Failed(e.to_string()))
            };
            summary.record(&outcome);
            let installed = matches!(outcome, InstallOutcome::Installed(_));
            self.report(id, outcome);

            if installed && !self.options.cooldown.is_zero() {
                thread::sleep(self.options.cooldown);
            }
        }
    }

    fn in_scope(&self, id: &PackageIdentifier) -> bool {
        self.options
            .community
            .as_deref()
            .map_or(true, |community| id.in_community(community))
    }

    fn report(&self, id: &PackageIdentifier, outcome: InstallOutcome) {
        match &outcome {
            InstallOutcome::Installed(folder) => {
                self.log(Severity::Success, format!("Installed {} into {}", id, folder))
            }
            InstallOutcome::Skipped(reason) => {
                self.log(Severity::Info, format!("Skipped {}: {}", id, reason))
            }
            InstallOutcome::Failed(reason) => {
                self.log(Severity::Error, format!("Failed {}: {}", id, reason))
            }
        }
        self.emit(BatchEvent::Item {
            package: id.full_name.clone(),
            outcome,
        });
    }

    /// Resolve, download, verify and extract; returns the extraction root
    fn fetch_and_extract(
        &self,
        id: &PackageIdentifier,
        scratch: &Path,
        downloaded: &mut Option<PathBuf>,
    ) -> Result<PathBuf> {
        let artifact = self
            .cascade
            .resolve(&self.client, id, self.prefetched.get(&id.full_name))
            .ok_or_else(|| Error::PackageNotFound(id.full_name.clone()))?;
        self.log(
            Severity::Info,
            format!("Downloading from {}", artifact.download_url),
        );

        let archive =
            download_artifact(&self.client, &artifact, scratch, self.progress_callback())?;
        *downloaded = Some(archive.clone());

        let entries = verify_archive(&archive)?;
        self.log(
            Severity::Info,
            format!("Verified {} ({} entries)", artifact.filename, entries),
        );

        let extract_dir = scratch.join(&id.full_name);
        extract_archive(&archive, &extract_dir)?;
        Ok(extract_dir)
    }

    fn install_item(
        &self,
        id: &PackageIdentifier,
        scratch: &Path,
        installer: &Installer,
    ) -> Result<InstallOutcome> {
        let mut downloaded = None;
        let result = self
            .fetch_and_extract(id, scratch, &mut downloaded)
            .and_then(|extract_dir| {
                let payload = find_payload_dir(&extract_dir)?;
                installer.install(id, &payload)
            });
        self.cleanup_item(id, scratch, downloaded.as_deref());
        result
    }

    fn install_loader_item(
        &self,
        id: &PackageIdentifier,
        scratch: &Path,
        game_dir: &Path,
    ) -> Result<InstallOutcome> {
        let mut downloaded = None;
        let result = self
            .fetch_and_extract(id, scratch, &mut downloaded)
            .and_then(|extract_dir| install_loader(&extract_dir, game_dir));
        self.cleanup_item(id, scratch, downloaded.as_deref());
        result
    }

    fn cleanup_item(&self, id: &PackageIdentifier, scratch: &Path, archive: Option<&Path>) {
        if let Some(archive) = archive.filter(|a| a.exists()) {
            if let Err(e) = fs::remove_file(archive) {
                self.log(
                    Severity::Warning,
                    format!("Cleanup failed for {}: {}", archive.display(), e),
                );
            }
        }

        let extract_dir = scratch.join(&id.full_name);
        if extract_dir.exists() {
            if let Err(e) = fs::remove_dir_all(&extract_dir) {
                self.log(
                    Severity::Warning,
                    format!("Cleanup failed for {}: {}", extract_dir.display(), e),
                );
            }
        }
    }

    fn finish(&self, mut summary: BatchSummary) -> BatchSummary {
        summary.timestamp = timestamp_now();
        let dir = self.options.mods_dir.clone();

        match AutoPreset::write(&dir, &summary.installed_folders) {
            Ok(path) => self.log(
                Severity::Success,
                format!("Auto-preset saved to {}", path.display()),
            ),
            Err(e) => self.log(
                Severity::Warning,
                format!("Could not save auto-preset: {}", e),
            ),
        }

        match summary.write(&dir) {
            Ok(path) => self.log(Severity::Info, format!("Summary saved to {}", path.display())),
            Err(e) => self.log(Severity::Warning, format!("Could not save summary: {}", e)),
        }

        self.emit(BatchEvent::Finished(summary.clone()));
        summary
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

/// A batch running on a worker thread
pub struct BatchHandle {
    pub events: Receiver<BatchEvent>,
    join: JoinHandle<BatchSummary>,
}

impl BatchHandle {
    /// Wait for the worker and return its summary
    pub fn wait(self) -> Result<BatchSummary> {
        self.join
            .join()
            .map_err(|_| Error::Critical("Batch worker panicked".to_string()))
    }
}

/// Run a batch over `urls` on a background thread
pub fn spawn_batch(
    client: RegistryClient,
    cascade: Cascade,
    options: BatchOptions,
    urls: Vec<String>,
) -> BatchHandle {
    BatchOrchestrator::new(client, cascade, options).spawn(urls)
}
