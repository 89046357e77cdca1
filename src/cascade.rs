//! Resolution cascade: identifier → downloadable artifact
//!
//! No single registry surface resolves every package, so resolution is an
//! ordered list of independent strategies. The first strategy that yields a
//! non-empty download URL wins and nothing after it runs. A strategy that
//! fails (timeout, bad status, unexpected JSON) is a miss, never an abort.
//!
//! # Examples
//!
//! ```no_run
//! use webloader::{parse_package_url, Cascade, RegistryClient};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = RegistryClient::new("https://thunderstore.io")?;
//! let id = parse_package_url("https://thunderstore.io/c/webfishing/p/TeamLure/LureRefreshed/")
//!     .unwrap();
//!
//! match Cascade::standard().resolve(&registry, &id, None) {
//!     Some(artifact) => println!("{} -> {}", artifact.filename, artifact.download_url),
//!     None => println!("unresolvable"),
//! }
//! # Ok(())
//! # }
//! ```

use crate::registry::{
    canonical_download_url, experimental_package_url, v1_package_url, v1_slug_url,
    version_download_url, version_filename, RegistryPackageMetadata, RegistrySource,
};
use crate::scrape::{page_matchers, PageMatcher};
use crate::{PackageIdentifier, Result};
use serde_json::Value;

/// A concrete, fetchable archive for one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub download_url: String,
    pub filename: String,
}

impl ResolvedArtifact {
    /// Artifact with the default `<full_name>.zip` filename
    pub fn for_package(id: &PackageIdentifier, download_url: String) -> Self {
        Self {
            download_url,
            filename: default_filename(id),
        }
    }
}

pub fn default_filename(id: &PackageIdentifier) -> String {
    format!("{}.zip", id.full_name)
}

/// Versions tried by [`VersionProbe`] when everything else came back empty
pub const COMMON_VERSIONS: &[&str] = &["1.0.0", "1.0.1", "1.1.0", "2.0.0", "0.1.0", "latest"];

/// Shared state of one cascade run
pub struct CascadeContext<'a> {
    pub source: &'a dyn RegistrySource,
    pub id: &'a PackageIdentifier,
    pub prefetched: Option<&'a RegistryPackageMetadata>,
    page: Option<Option<String>>,
}

impl<'a> CascadeContext<'a> {
    pub fn new(
        source: &'a dyn RegistrySource,
        id: &'a PackageIdentifier,
        prefetched: Option<&'a RegistryPackageMetadata>,
    ) -> Self {
        Self {
            source,
            id,
            prefetched,
            page: None,
        }
    }

    pub fn origin(&self) -> &str {
        self.source.origin()
    }

    /// The package page, fetched at most once per run
    pub fn page(&mut self) -> Option<&str> {
        if self.page.is_none() {
            let url = self.id.page_url(self.source.origin());
            let fetched = match self.source.get_text(&url) {
                Ok(text) => Some(text),
                Err(e) => {
                    tracing::warn!(%url, error = %e, "failed to fetch package page");
                    None
                }
            };
            self.page = Some(fetched);
        }
        self.page.as_ref().and_then(|page| page.as_deref())
    }
}

/// One independent way of resolving a package
pub trait ResolutionStrategy {
    fn name(&self) -> &'static str;

    /// `Ok(None)` is a clean miss; errors are logged and treated as misses
    fn resolve(&self, ctx: &mut CascadeContext<'_>) -> Result<Option<ResolvedArtifact>>;
}

/// Artifact from the first version entry of a metadata record
fn artifact_from_version(id: &PackageIdentifier, version: &Value) -> Option<ResolvedArtifact> {
    let download_url = version_download_url(version)?;
    Some(ResolvedArtifact {
        download_url: download_url.to_string(),
        filename: version_filename(version)
            .map(str::to_string)
            .unwrap_or_else(|| default_filename(id)),
    })
}

/// Metadata fetched earlier, e.g. by a listing in browse mode
pub struct PrefetchedMetadata;

impl ResolutionStrategy for PrefetchedMetadata {
    fn name(&self) -> &'static str {
        "prefetched metadata"
    }

    fn resolve(&self, ctx: &mut CascadeContext<'_>) -> Result<Option<ResolvedArtifact>> {
        Ok(ctx
            .prefetched
            .and_then(|md| md.first_version())
            .and_then(|version| artifact_from_version(ctx.id, version)))
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ApiTier {
    Experimental,
    V1,
    V1Slug,
}

/// Package-info endpoint of one API tier
pub struct ApiLookup(pub ApiTier);

impl ResolutionStrategy for ApiLookup {
    fn name(&self) -> &'static str {
        match self.0 {
            ApiTier::Experimental => "experimental api",
            ApiTier::V1 => "v1 api",
            ApiTier::V1Slug => "v1 api (slug)",
        }
    }

    fn resolve(&self, ctx: &mut CascadeContext<'_>) -> Result<Option<ResolvedArtifact>> {
        let (origin, author, name) = (ctx.origin(), &ctx.id.author, &ctx.id.name);
        let url = match self.0 {
            ApiTier::Experimental => experimental_package_url(origin, author, name),
            ApiTier::V1 => v1_package_url(origin, author, name),
            ApiTier::V1Slug => v1_slug_url(origin, author, name),
        };

        let metadata = RegistryPackageMetadata::new(ctx.source.get_json(&url)?);
        Ok(metadata
            .first_version()
            .and_then(|version| artifact_from_version(ctx.id, version)))
    }
}

/// A page matcher run against the shared package page
pub struct PageScrape(pub Box<dyn PageMatcher + Send + Sync>);

impl ResolutionStrategy for PageScrape {
    fn name(&self) -> &'static str {
        self.0.name()
    }

    fn resolve(&self, ctx: &mut CascadeContext<'_>) -> Result<Option<ResolvedArtifact>> {
        let origin = ctx.origin().to_string();
        let id = ctx.id;
        let Some(page) = ctx.page() else {
            return Ok(None);
        };
        Ok(self
            .0
            .find(page, id, &origin)
            .map(|url| ResolvedArtifact::for_package(id, url)))
    }
}

/// Brute-force HEAD probes of common version strings
pub struct VersionProbe {
    pub versions: &'static [&'static str],
}

impl ResolutionStrategy for VersionProbe {
    fn name(&self) -> &'static str {
        "version probe"
    }

    fn resolve(&self, ctx: &mut CascadeContext<'_>) -> Result<Option<ResolvedArtifact>> {
        for version in self.versions {
            let url = canonical_download_url(ctx.origin(), &ctx.id.author, &ctx.id.name, version);
            match ctx.source.exists(&url) {
                Ok(true) => return Ok(Some(ResolvedArtifact::for_package(ctx.id, url))),
                Ok(false) => {}
                Err(e) => tracing::debug!(%url, error = %e, "version probe failed"),
            }
        }
        Ok(None)
    }
}

pub type BoxedStrategy = Box<dyn ResolutionStrategy + Send + Sync>;

/// Ordered strategy list with first-success-wins semantics
pub struct Cascade {
    strategies: Vec<BoxedStrategy>,
}

impl Cascade {
    /// Prefetched metadata, API tiers, page matchers, version probe
    pub fn standard() -> Self {
        let mut strategies: Vec<BoxedStrategy> = vec![
            Box::new(PrefetchedMetadata),
            Box::new(ApiLookup(ApiTier::Experimental)),
            Box::new(ApiLookup(ApiTier::V1)),
            Box::new(ApiLookup(ApiTier::V1Slug)),
        ];
        strategies.extend(
            page_matchers()
                .into_iter()
                .map(|matcher| Box::new(PageScrape(matcher)) as BoxedStrategy),
        );
        strategies.push(Box::new(VersionProbe {
            versions: COMMON_VERSIONS,
        }));
        Self::with_strategies(strategies)
    }

    pub fn with_strategies(strategies: Vec<BoxedStrategy>) -> Self {
        Self { strategies }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn resolve(
        &self,
        source: &dyn RegistrySource,
        id: &PackageIdentifier,
        prefetched: Option<&RegistryPackageMetadata>,
    ) -> Option<ResolvedArtifact> {
        self.resolve_with_strategy(source, id, prefetched)
            .map(|(_, artifact)| artifact)
    }

    /// Like [`Cascade::resolve`], also naming the strategy that won
    pub fn resolve_with_strategy(
        &self,
        source: &dyn RegistrySource,
        id: &PackageIdentifier,
        prefetched: Option<&RegistryPackageMetadata>,
    ) -> Option<(&'static str, ResolvedArtifact)> {
        let mut ctx = CascadeContext::new(source, id, prefetched);

        for strategy in &self.strategies {
            match strategy.resolve(&mut ctx) {
                Ok(Some(artifact)) if !artifact.download_url.is_empty() => {
                    tracing::info!(
                        package = %id,
                        strategy = strategy.name(),
                        url = %artifact.download_url,
                        "resolved download"
                    );
                    return Some((strategy.name(), artifact));
                }
                Ok(_) => tracing::debug!(package = %id, strategy = strategy.name(), "no match"),
                Err(e) if e.is_transport() => tracing::debug!(
                    package = %id,
                    strategy = strategy.name(),
                    error = %e,
                    "strategy failed"
                ),
                Err(e) => tracing::warn!(
                    package = %id,
                    strategy = strategy.name(),
                    error = %e,
                    "strategy failed"
                ),
            }
        }

        tracing::warn!(package = %id, "all resolution strategies exhausted");
        None
    }
}

impl Default for Cascade {
    fn default() -> Self {
        Self::standard()
    }
}
