//! Dependency suggestions
//!
//! Registry metadata lists dependencies as `Author-Name-Version` strings.
//! Suggestions never install anything: they are handed to a confirmation
//! callback and the accepted ones are queued like any user-supplied URL.

use crate::installer::{is_core_loader, Installer};
use crate::registry::{RegistryPackageMetadata, RegistrySource};
use crate::{parse_package_url, PackageIdentifier};
use std::fmt;

/// A dependency as written in registry metadata
///
/// Only `author` and `name` are significant; the version is kept for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyReference {
    pub author: String,
    pub name: String,
    pub version: Option<String>,
}

impl DependencyReference {
    /// Parse `Author-Name[-Version]`
    ///
    /// The first two dash-separated fields are taken as author and name, so
    /// names that themselves contain a dash are split wrongly.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.trim().split('-');
        let author = parts.next().filter(|p| !p.is_empty())?;
        let name = parts.next().filter(|p| !p.is_empty())?;
        let rest: Vec<&str> = parts.collect();
        let version = if rest.is_empty() {
            None
        } else {
            Some(rest.join("-"))
        };

        Some(Self {
            author: author.to_string(),
            name: name.to_string(),
            version,
        })
    }

    pub fn full_name(&self) -> String {
        format!("{}-{}", self.author, self.name)
    }

    pub fn is_core_loader(&self) -> bool {
        is_core_loader(&self.author, &self.name)
    }

    pub fn to_identifier(&self, community: &str) -> PackageIdentifier {
        PackageIdentifier::new(community, &self.author, &self.name)
    }

    /// Package page URL in `community`
    pub fn package_url(&self, origin: &str, community: &str) -> String {
        self.to_identifier(community).page_url(origin)
    }
}

impl fmt::Display for DependencyReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{} ({})", self.full_name(), version),
            None => write!(f, "{}", self.full_name()),
        }
    }
}

/// Dependencies of `metadata` that are worth offering to the user
///
/// Drops unparsable strings, the core loader, anything already in `known`,
/// and duplicates. Order follows the metadata.
pub fn suggest_dependencies(
    metadata: &RegistryPackageMetadata,
    known: &[PackageIdentifier],
) -> Vec<DependencyReference> {
    let mut suggestions: Vec<DependencyReference> = Vec::new();

    for raw in metadata.dependencies() {
        let Some(dep) = DependencyReference::parse(&raw) else {
            tracing::debug!(dependency = %raw, "unparsable dependency string");
            continue;
        };
        if dep.is_core_loader() {
            continue;
        }
        let full_name = dep.full_name();
        if known.iter().any(|id| id.full_name == full_name) {
            continue;
        }
        if suggestions.iter().any(|s| s.full_name() == full_name) {
            continue;
        }
        suggestions.push(dep);
    }

    suggestions
}

/// Walk `urls` in order, offering each entry's dependencies to `confirm`
///
/// `confirm` receives the package being inspected and its suggestions and
/// returns the ones to add. Accepted dependencies are appended as package
/// URLs in the same community and inspected in turn. Dependencies already
/// present in `installer`'s mods directory count as satisfied and are never
/// offered. Returns the extended queue; the original entries keep their order.
pub fn discover_dependencies<F>(
    source: &dyn RegistrySource,
    installer: &Installer,
    urls: &[String],
    mut confirm: F,
) -> Vec<String>
where
    F: FnMut(&PackageIdentifier, Vec<DependencyReference>) -> Vec<DependencyReference>,
{
    let mut queue: Vec<String> = urls.to_vec();
    let mut known: Vec<PackageIdentifier> =
        queue.iter().filter_map(|u| parse_package_url(u)).collect();
    let mut cursor = 0;

    while cursor < queue.len() {
        let url = queue[cursor].clone();
        cursor += 1;

        let Some(id) = parse_package_url(&url) else {
            continue;
        };
        if is_core_loader(&id.author, &id.name) {
            continue;
        }

        let metadata = match source.package_metadata(&id) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(package = %id, error = %e, "cannot inspect dependencies");
                continue;
            }
        };

        let suggestions: Vec<DependencyReference> = suggest_dependencies(&metadata, &known)
            .into_iter()
            .filter(|dep| {
                let installed = installer.is_installed(&dep.to_identifier(&id.community));
                if installed {
                    tracing::debug!(dependency = %dep, "dependency already installed");
                }
                !installed
            })
            .collect();
        if suggestions.is_empty() {
            continue;
        }

        for dep in confirm(&id, suggestions) {
            let dep_id = dep.to_identifier(&id.community);
            if known.contains(&dep_id) {
                continue;
            }
            queue.push(dep.package_url(source.origin(), &id.community));
            known.push(dep_id);
        }
    }

    queue
}
