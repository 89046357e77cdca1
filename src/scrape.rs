//! Download-link discovery in package pages
//!
//! Each matcher is a pure function of `(page text, identifier, origin)` and
//! knows one way the registry has been seen to leak a download location
//! into its HTML. The cascade runs them in [`page_matchers`] order.

use crate::registry::{canonical_download_url, uuid_download_url};
use crate::PackageIdentifier;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use url::Url;

/// One way of pulling a download URL out of a package page
pub trait PageMatcher {
    fn name(&self) -> &'static str;

    fn find(&self, page: &str, id: &PackageIdentifier, origin: &str) -> Option<String>;
}

/// All page matchers, in priority order
pub fn page_matchers() -> Vec<Box<dyn PageMatcher + Send + Sync>> {
    vec![
        Box::new(DownloadLinkMatcher),
        Box::new(VersionFieldMatcher),
        Box::new(UuidFieldMatcher),
        Box::new(ScriptStateMatcher),
        Box::new(CanonicalLinkMatcher),
    ]
}

/// First capture group of the first match
fn first_capture<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
    re.captures(text)?.get(1).map(|m| m.as_str())
}

/// Undo JSON string escaping commonly left in embedded URLs
fn unescape(raw: &str) -> String {
    raw.replace("\\/", "/").replace("\\u0026", "&").replace("&amp;", "&")
}

/// Resolve a possibly relative link against the registry origin
fn absolutize(link: &str, origin: &str) -> Option<String> {
    if link.starts_with("http://") || link.starts_with("https://") {
        return Some(link.to_string());
    }
    let base = Url::parse(origin).ok()?;
    base.join(link).ok().map(String::from)
}

fn looks_like_download(url: &str) -> bool {
    let lower = url.to_lowercase();
    ["download", ".zip", "/package/"]
        .iter()
        .any(|keyword| lower.contains(keyword))
}

enum LinkCapture {
    /// The capture is a (possibly relative) URL
    Url,
    /// Captures are author, name and version of a download path
    Triple,
    /// The capture is a version of the identified package
    Version,
}

/// Direct links: href attributes, embedded JSON fields, data attributes and
/// download paths scoped to the package
pub struct DownloadLinkMatcher;

impl DownloadLinkMatcher {
    fn patterns(id: &PackageIdentifier, origin: &str) -> Vec<(String, LinkCapture)> {
        let host = Url::parse(origin)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "thunderstore".to_string());
        let host = regex::escape(&host);
        let author = regex::escape(&id.author);
        let name = regex::escape(&id.name);

        vec![
            (
                format!(r#"(?i)href="(https?://[^"]*{}[^"]*download[^"]*)""#, host),
                LinkCapture::Url,
            ),
            (r#"(?i)href="(https://[^"]*\.zip)""#.to_string(), LinkCapture::Url),
            (r#"(?i)"downloadUrl"\s*:\s*"([^"]*)""#.to_string(), LinkCapture::Url),
            (r#"(?i)"download_url"\s*:\s*"([^"]*)""#.to_string(), LinkCapture::Url),
            (r#"(?i)data-download-url="([^"]*)""#.to_string(), LinkCapture::Url),
            (r#"(?i)data-href="([^"]*download[^"]*)""#.to_string(), LinkCapture::Url),
            (r#"(?i)href="(/api/[^"]*download[^"]*)""#.to_string(), LinkCapture::Url),
            (r#"(?i)href="(/package/download/[^"]*)""#.to_string(), LinkCapture::Url),
            (
                r#"(?i)/package/download/([^/"\s]+)/([^/"\s]+)/([^/"\s]+)"#.to_string(),
                LinkCapture::Triple,
            ),
            (
                format!(
                    r#"(?i)href="([^"]*{}/[^"]*{}/[^"]*download[^"]*)""#,
                    author, name
                ),
                LinkCapture::Url,
            ),
            (
                format!(r#"(?i)/package/download/{}/{}/([^/"\s]+)"#, author, name),
                LinkCapture::Version,
            ),
        ]
    }
}

impl PageMatcher for DownloadLinkMatcher {
    fn name(&self) -> &'static str {
        "download link"
    }

    fn find(&self, page: &str, id: &PackageIdentifier, origin: &str) -> Option<String> {
        for (pattern, capture) in Self::patterns(id, origin) {
            let Ok(re) = Regex::new(&pattern) else {
                continue;
            };
            let Some(caps) = re.captures(page) else {
                continue;
            };

            let candidate = match capture {
                LinkCapture::Url => caps
                    .get(1)
                    .map(|m| unescape(m.as_str()))
                    .filter(|link| !link.is_empty())
                    .and_then(|link| absolutize(&link, origin)),
                LinkCapture::Triple => match (caps.get(1), caps.get(2), caps.get(3)) {
                    (Some(author), Some(name), Some(version)) => Some(canonical_download_url(
                        origin,
                        author.as_str(),
                        name.as_str(),
                        version.as_str(),
                    )),
                    _ => None,
                },
                LinkCapture::Version => caps.get(1).map(|version| {
                    canonical_download_url(origin, &id.author, &id.name, version.as_str())
                }),
            };

            if let Some(url) = candidate.filter(|url| looks_like_download(url)) {
                tracing::debug!(pattern = %pattern, %url, "download link matched");
                return Some(url);
            }
        }
        None
    }
}

static VERSION_FIELDS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?i)"version_number"\s*:\s*"([^"]+)""#,
        r#"(?i)"latest_version"\s*:\s*"([^"]+)""#,
        r#"(?i)data-version="([^"]+)""#,
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Explicit version numbers, turned into the canonical download URL
pub struct VersionFieldMatcher;

impl PageMatcher for VersionFieldMatcher {
    fn name(&self) -> &'static str {
        "version field"
    }

    fn find(&self, page: &str, id: &PackageIdentifier, origin: &str) -> Option<String> {
        let scoped = Regex::new(&format!(
            r"(?i)/{}/{}/([0-9.]+)",
            regex::escape(&id.author),
            regex::escape(&id.name)
        ))
        .ok();

        let version = VERSION_FIELDS
            .iter()
            .chain(scoped.iter())
            .find_map(|re| first_capture(re, page))?;

        Some(canonical_download_url(origin, &id.author, &id.name, version))
    }
}

static UUID_FIELDS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?i)"uuid4"\s*:\s*"([^"]+)""#,
        r#"(?i)"package_uuid"\s*:\s*"([^"]+)""#,
        r#"(?i)data-package-uuid="([^"]+)""#,
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Package UUIDs, turned into a UUID-keyed download URL
pub struct UuidFieldMatcher;

impl PageMatcher for UuidFieldMatcher {
    fn name(&self) -> &'static str {
        "package uuid"
    }

    fn find(&self, page: &str, _id: &PackageIdentifier, origin: &str) -> Option<String> {
        let uuid = UUID_FIELDS.iter().find_map(|re| first_capture(re, page))?;
        Some(uuid_download_url(origin, uuid))
    }
}

static STATE_BLOBS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?s)window\.__INITIAL_STATE__\s*=\s*(\{.*?\});",
        r"(?s)window\.__PACKAGE_DATA__\s*=\s*(\{.*?\});",
        r"(?s)var\s+packageData\s*=\s*(\{.*?\});",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// JSON pointers probed inside a state blob, in order
const STATE_PATHS: &[&str] = &[
    "/package/latest/download_url",
    "/latest/download_url",
    "/download_url",
    "/package/versions/0/download_url",
    "/versions/0/download_url",
];

/// JSON state assigned to well-known globals in inline scripts
pub struct ScriptStateMatcher;

impl PageMatcher for ScriptStateMatcher {
    fn name(&self) -> &'static str {
        "script state"
    }

    fn find(&self, page: &str, _id: &PackageIdentifier, _origin: &str) -> Option<String> {
        for re in STATE_BLOBS.iter() {
            let Some(blob) = first_capture(re, page) else {
                continue;
            };
            let state: Value = match serde_json::from_str(blob) {
                Ok(state) => state,
                Err(e) => {
                    tracing::debug!(error = %e, "script state is not valid JSON");
                    continue;
                }
            };

            let hit = STATE_PATHS
                .iter()
                .filter_map(|path| state.pointer(path).and_then(Value::as_str))
                .find(|url| url.contains("download") || url.ends_with(".zip"));
            if let Some(url) = hit {
                return Some(url.to_string());
            }
        }
        None
    }
}

static CANONICAL_LINKS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?i)<meta[^>]*property="og:url"[^>]*content="([^"]*)""#,
        r#"(?i)<link[^>]*rel="canonical"[^>]*href="([^"]*)""#,
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static TRAILING_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/([0-9.]+)/?$").expect("valid regex"));

/// Version inferred from the page's canonical or OpenGraph URL
pub struct CanonicalLinkMatcher;

impl PageMatcher for CanonicalLinkMatcher {
    fn name(&self) -> &'static str {
        "canonical link"
    }

    fn find(&self, page: &str, id: &PackageIdentifier, origin: &str) -> Option<String> {
        CANONICAL_LINKS
            .iter()
            .filter_map(|re| first_capture(re, page))
            .filter(|link| link.contains("/p/"))
            .find_map(|link| first_capture(&TRAILING_VERSION, link))
            .map(|version| canonical_download_url(origin, &id.author, &id.name, version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://thunderstore.io";

    fn lure() -> PackageIdentifier {
        PackageIdentifier::new("webfishing", "TeamLure", "LureRefreshed")
    }

    #[test]
    fn test_absolute_download_href() {
        let page = r#"<a class="btn" href="https://thunderstore.io/package/download/TeamLure/LureRefreshed/2.1.0/">Manual Download</a>"#;
        assert_eq!(
            DownloadLinkMatcher.find(page, &lure(), ORIGIN).as_deref(),
            Some("https://thunderstore.io/package/download/TeamLure/LureRefreshed/2.1.0/")
        );
    }

    #[test]
    fn test_embedded_json_field_is_unescaped() {
        let page = r#"<script>{"download_url":"https:\/\/cdn.example\/files\/lure.zip"}</script>"#;
        assert_eq!(
            DownloadLinkMatcher.find(page, &lure(), ORIGIN).as_deref(),
            Some("https://cdn.example/files/lure.zip")
        );
    }

    #[test]
    fn test_relative_path_resolved_against_origin() {
        let page = r#"<a href="/api/v1/download/TeamLure/LureRefreshed/">get</a>"#;
        assert_eq!(
            DownloadLinkMatcher.find(page, &lure(), ORIGIN).as_deref(),
            Some("https://thunderstore.io/api/v1/download/TeamLure/LureRefreshed/")
        );
    }

    #[test]
    fn test_bare_download_triple() {
        let page = "see /package/download/TeamLure/LureRefreshed/2.0.0 for the file";
        assert_eq!(
            DownloadLinkMatcher.find(page, &lure(), ORIGIN).as_deref(),
            Some("https://thunderstore.io/package/download/TeamLure/LureRefreshed/2.0.0/")
        );
    }

    #[test]
    fn test_earlier_link_pattern_wins() {
        let page = r#"
            <div data-download-url="https://mirror.example/download/lure.zip"></div>
            <script>{"downloadUrl":"https://thunderstore.io/package/download/TeamLure/LureRefreshed/1.0.0/"}</script>
        "#;
        assert_eq!(
            DownloadLinkMatcher.find(page, &lure(), ORIGIN).as_deref(),
            Some("https://thunderstore.io/package/download/TeamLure/LureRefreshed/1.0.0/")
        );
    }

    #[test]
    fn test_no_links() {
        let page = "<html><body>Nothing to see</body></html>";
        assert!(DownloadLinkMatcher.find(page, &lure(), ORIGIN).is_none());
    }

    #[test]
    fn test_version_field() {
        let page = r#"<div data-version="1.4.2"></div>"#;
        assert_eq!(
            VersionFieldMatcher.find(page, &lure(), ORIGIN).as_deref(),
            Some("https://thunderstore.io/package/download/TeamLure/LureRefreshed/1.4.2/")
        );

        let page = r#"{"version_number": "3.0.1"}"#;
        assert_eq!(
            VersionFieldMatcher.find(page, &lure(), ORIGIN).as_deref(),
            Some("https://thunderstore.io/package/download/TeamLure/LureRefreshed/3.0.1/")
        );
    }

    #[test]
    fn test_uuid_field() {
        let page = r#"{"uuid4":"0b3c1f1e-aaaa-bbbb-cccc-1234567890ab"}"#;
        assert_eq!(
            UuidFieldMatcher.find(page, &lure(), ORIGIN).as_deref(),
            Some("https://thunderstore.io/package/download/0b3c1f1e-aaaa-bbbb-cccc-1234567890ab/")
        );
    }

    #[test]
    fn test_script_state_paths() {
        let page = r#"<script>window.__INITIAL_STATE__ = {"package": {"versions": [{"download_url": "https://cdn.example/lure-2.zip"}]}};</script>"#;
        assert_eq!(
            ScriptStateMatcher.find(page, &lure(), ORIGIN).as_deref(),
            Some("https://cdn.example/lure-2.zip")
        );
    }

    #[test]
    fn test_script_state_ignores_non_download_strings() {
        let page = r#"<script>var packageData = {"download_url": "https://example/readme.md"};</script>"#;
        assert!(ScriptStateMatcher.find(page, &lure(), ORIGIN).is_none());

        let page = r#"<script>var packageData = {not json};</script>"#;
        assert!(ScriptStateMatcher.find(page, &lure(), ORIGIN).is_none());
    }

    #[test]
    fn test_canonical_link() {
        let page = r#"<link rel="canonical" href="https://thunderstore.io/c/webfishing/p/TeamLure/LureRefreshed/2.2.0/">"#;
        assert_eq!(
            CanonicalLinkMatcher.find(page, &lure(), ORIGIN).as_deref(),
            Some("https://thunderstore.io/package/download/TeamLure/LureRefreshed/2.2.0/")
        );

        let page = r#"<link rel="canonical" href="https://thunderstore.io/c/webfishing/p/TeamLure/LureRefreshed/">"#;
        assert!(CanonicalLinkMatcher.find(page, &lure(), ORIGIN).is_none());
    }
}
