//! Package identifiers extracted from registry page URLs
//!
//! A package page on the registry lives at
//! `<origin>/c/<community>/p/<author>/<name>/`. Anything else (home pages,
//! category listings, typos) is simply not a package URL.
//!
//! # Examples
//!
//! ```
//! use webloader::parse_package_url;
//!
//! let id = parse_package_url("https://thunderstore.io/c/webfishing/p/TeamLure/LureRefreshed/")
//!     .unwrap();
//! assert_eq!(id.full_name, "TeamLure-LureRefreshed");
//! assert!(parse_package_url("https://thunderstore.io/").is_none());
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use url::Url;

/// Community the CLI operates on when scoping is enabled
pub const DEFAULT_COMMUNITY: &str = "webfishing";

/// Structured identity of one registry package
#[derive(Debug, Clone)]
pub struct PackageIdentifier {
    pub community: String,
    pub author: String,
    pub name: String,
    /// `author-name`, the registry-wide key of the package
    pub full_name: String,
}

impl PackageIdentifier {
    pub fn new(community: &str, author: &str, name: &str) -> Self {
        Self {
            community: community.to_string(),
            author: author.to_string(),
            name: name.to_string(),
            full_name: format!("{}-{}", author, name),
        }
    }

    /// Domain-scoped filter applied after parsing
    pub fn in_community(&self, community: &str) -> bool {
        self.community == community
    }

    /// Human-facing package page on the registry
    pub fn page_url(&self, origin: &str) -> String {
        format!(
            "{}/c/{}/p/{}/{}/",
            origin.trim_end_matches('/'),
            self.community,
            self.author,
            self.name
        )
    }
}

impl PartialEq for PackageIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.full_name == other.full_name
    }
}

impl Eq for PackageIdentifier {}

impl Hash for PackageIdentifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.full_name.hash(state);
    }
}

impl fmt::Display for PackageIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name)
    }
}

/// Parse a registry package page URL
///
/// Returns `None` for anything that is not an absolute URL whose path starts
/// with `c/<community>/p/<author>/<name>`.
pub fn parse_package_url(url: &str) -> Option<PackageIdentifier> {
    let parsed = Url::parse(url.trim()).ok()?;
    let segments: Vec<&str> = parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .collect();

    match segments.as_slice() {
        ["c", community, "p", author, name, ..] => {
            Some(PackageIdentifier::new(community, author, name))
        }
        _ => None,
    }
}
