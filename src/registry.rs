//! Registry client and metadata types
//!
//! The registry answers the same question ("where is the zip for this
//! package?") through several inconsistent surfaces: an experimental API, a
//! legacy v1 API keyed either by `author/name` or by the `author-name` slug,
//! and plain HTML pages. This module owns the HTTP side of all of them.
//!
//! # Examples
//!
//! ```no_run
//! use webloader::{parse_package_url, RegistryClient, RegistrySource};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = RegistryClient::new("https://thunderstore.io")?;
//! let id = parse_package_url("https://thunderstore.io/c/webfishing/p/TeamLure/LureRefreshed/")
//!     .unwrap();
//!
//! let metadata = registry.package_metadata(&id)?;
//! println!("{} downloads", metadata.downloads().unwrap_or(0));
//! # Ok(())
//! # }
//! ```

use crate::config::RegistryConfig;
use crate::{Error, PackageIdentifier, Result};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use serde_json::Value;
use std::time::Duration;

/// Network surface the resolution cascade depends on
///
/// Implemented by [`RegistryClient`]; tests substitute in-memory fakes.
pub trait RegistrySource {
    /// Registry origin, without a trailing slash
    fn origin(&self) -> &str;

    /// GET a JSON document; non-2xx statuses are transport errors
    fn get_json(&self, url: &str) -> Result<Value>;

    /// GET a text document (package pages)
    fn get_text(&self, url: &str) -> Result<String>;

    /// Lightweight existence check (HEAD)
    fn exists(&self, url: &str) -> Result<bool>;

    /// Metadata for one package from the first API tier that answers
    fn package_metadata(&self, id: &PackageIdentifier) -> Result<RegistryPackageMetadata> {
        let origin = self.origin();
        let endpoints = [
            experimental_package_url(origin, &id.author, &id.name),
            v1_package_url(origin, &id.author, &id.name),
            v1_slug_url(origin, &id.author, &id.name),
        ];

        for endpoint in &endpoints {
            match self.get_json(endpoint) {
                Ok(raw) if raw.is_object() => return Ok(RegistryPackageMetadata::new(raw)),
                Ok(_) => tracing::debug!(%endpoint, "metadata response is not an object"),
                Err(e) => tracing::debug!(%endpoint, error = %e, "metadata tier failed"),
            }
        }

        Err(Error::PackageNotFound(id.full_name.clone()))
    }
}

/// `GET <origin>/api/experimental/package/{author}/{name}/`
pub fn experimental_package_url(origin: &str, author: &str, name: &str) -> String {
    format!("{}/api/experimental/package/{}/{}/", origin, author, name)
}

/// `GET <origin>/api/v1/package/{author}/{name}/`
pub fn v1_package_url(origin: &str, author: &str, name: &str) -> String {
    format!("{}/api/v1/package/{}/{}/", origin, author, name)
}

/// `GET <origin>/api/v1/package/{author}-{name}/`
pub fn v1_slug_url(origin: &str, author: &str, name: &str) -> String {
    format!("{}/api/v1/package/{}-{}/", origin, author, name)
}

/// Canonical artifact location for one version
pub fn canonical_download_url(origin: &str, author: &str, name: &str, version: &str) -> String {
    format!(
        "{}/package/download/{}/{}/{}/",
        origin, author, name, version
    )
}

/// Artifact location keyed by package UUID
pub fn uuid_download_url(origin: &str, uuid: &str) -> String {
    format!("{}/package/download/{}/", origin, uuid)
}

/// Timeouts and identity used by [`RegistryClient`]
pub struct HttpRegistryClientOptions {
    pub user_agent: String,
    pub request_timeout: Duration,
    pub download_timeout: Duration,
    pub probe_timeout: Duration,
}

impl Default for HttpRegistryClientOptions {
    fn default() -> Self {
        let defaults = RegistryConfig::default();
        Self::from(&defaults)
    }
}

impl From<&RegistryConfig> for HttpRegistryClientOptions {
    fn from(config: &RegistryConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            request_timeout: config.request_timeout(),
            download_timeout: config.download_timeout(),
            probe_timeout: config.probe_timeout(),
        }
    }
}

/// Blocking HTTP client for the registry
pub struct RegistryClient {
    origin: String,
    client: Client,
    /// Separate client for artifacts: its timeout bounds connecting and each
    /// body read, never the transfer as a whole
    download_client: Client,
    probe_timeout: Duration,
}

impl RegistryClient {
    /// Client with default timeouts and headers
    pub fn new(origin: &str) -> Result<Self> {
        Self::with_options(origin, HttpRegistryClientOptions::default())
    }

    pub fn from_config(config: &crate::Config) -> Result<Self> {
        Self::with_options(
            &config.registry.origin,
            HttpRegistryClientOptions::from(&config.registry),
        )
    }

    pub fn with_options(origin: &str, options: HttpRegistryClientOptions) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,application/json;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = Client::builder()
            .user_agent(options.user_agent.clone())
            .default_headers(headers.clone())
            .timeout(options.request_timeout)
            .build()?;

        let download_client = Client::builder()
            .user_agent(options.user_agent)
            .default_headers(headers)
            .connect_timeout(options.download_timeout)
            .timeout(options.download_timeout)
            .build()?;

        Ok(Self {
            origin: origin.trim_end_matches('/').to_string(),
            client,
            download_client,
            probe_timeout: options.probe_timeout,
        })
    }

    /// Send a request, turning connection problems and bad statuses into
    /// transport errors
    fn send(&self, request: RequestBuilder, url: &str) -> Result<Response> {
        let response = request.send().map_err(|e| {
            if e.is_timeout() {
                Error::Transport(format!("Request timed out: {}", url))
            } else if e.is_connect() {
                Error::Transport(format!("Cannot connect to {}", url))
            } else {
                Error::Transport(format!("Request to {} failed: {}", url, e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!(
                "HTTP {} from {}",
                status.as_u16(),
                url
            )));
        }

        Ok(response)
    }

    /// Open a streaming download
    ///
    /// The download timeout applies to connecting and to every read of the
    /// body, so a slow transfer survives as long as bytes keep arriving.
    pub fn download(&self, url: &str) -> Result<Response> {
        self.send(self.download_client.get(url), url)
    }

    /// One page of a community's packages, most downloaded first
    pub fn list_packages(
        &self,
        community: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<RegistryPackageMetadata>> {
        let url = format!(
            "{}/c/{}/api/v1/package/?page={}&page_size={}&ordering=-downloads",
            self.origin, community, page, page_size
        );

        let raw = self.get_json(&url)?;
        let items = match raw {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("results") {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(Error::Other(format!(
                        "Unexpected listing response from {}",
                        url
                    )))
                }
            },
            _ => {
                return Err(Error::Other(format!(
                    "Unexpected listing response from {}",
                    url
                )))
            }
        };

        Ok(items.into_iter().map(RegistryPackageMetadata::new).collect())
    }
}

impl RegistrySource for RegistryClient {
    fn origin(&self) -> &str {
        &self.origin
    }

    fn get_json(&self, url: &str) -> Result<Value> {
        let response = self.send(self.client.get(url), url)?;
        response
            .json()
            .map_err(|e| Error::Transport(format!("Invalid JSON from {}: {}", url, e)))
    }

    fn get_text(&self, url: &str) -> Result<String> {
        let response = self.send(self.client.get(url), url)?;
        response
            .text()
            .map_err(|e| Error::Transport(format!("Failed to read {}: {}", url, e)))
    }

    fn exists(&self, url: &str) -> Result<bool> {
        let response = self
            .client
            .head(url)
            .timeout(self.probe_timeout)
            .send()
            .map_err(|e| Error::Transport(format!("Probe of {} failed: {}", url, e)))?;
        Ok(response.status().is_success())
    }
}

/// Raw registry record for one package
///
/// The experimental API, the v1 API and the listing endpoint disagree on
/// field names and nesting, so every typed read is an ordered list of probes
/// over the raw JSON and the first probe that finds a value wins.
#[derive(Debug, Clone, Default)]
pub struct RegistryPackageMetadata {
    raw: Value,
}

fn versions_array(raw: &Value) -> Option<&Value> {
    raw.get("versions")?.get(0)
}

fn latest_object(raw: &Value) -> Option<&Value> {
    raw.get("latest").filter(|latest| latest.is_object())
}

/// First version entry: `versions[0]`, else `latest`
const FIRST_VERSION: &[fn(&Value) -> Option<&Value>] = &[versions_array, latest_object];

/// Latest version record: `latest`, else `versions[0]`
const LATEST_VERSION: &[fn(&Value) -> Option<&Value>] = &[latest_object, versions_array];

fn str_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value.as_array().map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    })
}

impl RegistryPackageMetadata {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn owner(&self) -> Option<&str> {
        str_field(&self.raw, &["owner", "namespace"])
    }

    pub fn name(&self) -> Option<&str> {
        str_field(&self.raw, &["name"])
    }

    pub fn full_name(&self) -> Option<String> {
        if let Some(full_name) = str_field(&self.raw, &["full_name"]) {
            return Some(full_name.to_string());
        }
        Some(format!("{}-{}", self.owner()?, self.name()?))
    }

    /// Version records in registry order
    pub fn versions(&self) -> Vec<&Value> {
        match self.raw.get("versions").and_then(Value::as_array) {
            Some(versions) if !versions.is_empty() => versions.iter().collect(),
            _ => latest_object(&self.raw).into_iter().collect(),
        }
    }

    pub fn first_version(&self) -> Option<&Value> {
        FIRST_VERSION.iter().find_map(|probe| probe(&self.raw))
    }

    pub fn latest_version(&self) -> Option<&Value> {
        LATEST_VERSION.iter().find_map(|probe| probe(&self.raw))
    }

    /// Total downloads, summed over versions when the package has no total
    pub fn downloads(&self) -> Option<u64> {
        let probes: [fn(&Value) -> Option<u64>; 3] = [
            |raw| raw.get("downloads")?.as_u64(),
            |raw| raw.get("total_downloads")?.as_u64(),
            |raw| {
                let versions = raw.get("versions")?.as_array()?;
                Some(
                    versions
                        .iter()
                        .filter_map(|v| v.get("downloads").and_then(Value::as_u64))
                        .sum(),
                )
            },
        ];
        probes.iter().find_map(|probe| probe(&self.raw))
    }

    pub fn date_updated(&self) -> Option<&str> {
        str_field(&self.raw, &["date_updated"])
            .or_else(|| self.latest_version().and_then(|v| str_field(v, &["date_created"])))
    }

    pub fn date_created(&self) -> Option<&str> {
        str_field(&self.raw, &["date_created"])
    }

    pub fn description(&self) -> Option<&str> {
        self.latest_version()
            .and_then(|v| str_field(v, &["description"]))
            .or_else(|| str_field(&self.raw, &["description"]))
    }

    pub fn icon(&self) -> Option<&str> {
        self.latest_version()
            .and_then(|v| str_field(v, &["icon"]))
            .or_else(|| str_field(&self.raw, &["icon"]))
    }

    pub fn latest_version_number(&self) -> Option<&str> {
        self.latest_version()
            .and_then(|v| str_field(v, &["version_number"]))
    }

    /// Dependency strings of the latest version, falling back to the
    /// package-level `dependencies` or `requirements` field
    pub fn dependencies(&self) -> Vec<String> {
        let probes: [fn(&RegistryPackageMetadata) -> Option<Vec<String>>; 3] = [
            |md| string_list(md.latest_version()?.get("dependencies")?),
            |md| string_list(md.raw.get("dependencies")?),
            |md| string_list(md.raw.get("requirements")?),
        ];
        probes
            .iter()
            .find_map(|probe| probe(self))
            .unwrap_or_default()
    }
}

/// `download_url` of a version record
pub fn version_download_url(version: &Value) -> Option<&str> {
    str_field(version, &["download_url", "downloadUrl"])
}

/// `filename` of a version record
pub fn version_filename(version: &Value) -> Option<&str> {
    str_field(version, &["filename", "file_name"])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn experimental_record() -> Value {
        json!({
            "namespace": "TeamLure",
            "name": "LureRefreshed",
            "full_name": "TeamLure-LureRefreshed",
            "total_downloads": 1200,
            "date_created": "2024-10-01T00:00:00Z",
            "date_updated": "2024-11-02T00:00:00Z",
            "latest": {
                "version_number": "2.1.0",
                "download_url": "https://thunderstore.io/package/download/TeamLure/LureRefreshed/2.1.0/",
                "description": "Lure, refreshed",
                "icon": "https://cdn/icon.png",
                "dependencies": ["NotNet-GDWeave-2.0.12", "Sulayre-Lure-4.1.0"]
            }
        })
    }

    fn v1_record() -> Value {
        json!({
            "owner": "TeamLure",
            "name": "LureRefreshed",
            "versions": [
                {"version_number": "2.1.0", "downloads": 700, "filename": "lure.zip",
                 "download_url": "https://example/2.1.0/"},
                {"version_number": "2.0.0", "downloads": 500,
                 "download_url": "https://example/2.0.0/"}
            ]
        })
    }

    #[test]
    fn test_experimental_shape() {
        let md = RegistryPackageMetadata::new(experimental_record());
        assert_eq!(md.owner(), Some("TeamLure"));
        assert_eq!(md.full_name().as_deref(), Some("TeamLure-LureRefreshed"));
        assert_eq!(md.downloads(), Some(1200));
        assert_eq!(md.versions().len(), 1);
        assert_eq!(md.latest_version_number(), Some("2.1.0"));
        assert_eq!(md.description(), Some("Lure, refreshed"));
        assert_eq!(md.icon(), Some("https://cdn/icon.png"));
        assert_eq!(
            md.dependencies(),
            vec!["NotNet-GDWeave-2.0.12", "Sulayre-Lure-4.1.0"]
        );
    }

    #[test]
    fn test_v1_shape() {
        let md = RegistryPackageMetadata::new(v1_record());
        assert_eq!(md.full_name().as_deref(), Some("TeamLure-LureRefreshed"));
        assert_eq!(md.downloads(), Some(1200));
        assert_eq!(md.versions().len(), 2);

        let first = md.first_version().unwrap();
        assert_eq!(version_download_url(first), Some("https://example/2.1.0/"));
        assert_eq!(version_filename(first), Some("lure.zip"));
        assert!(md.dependencies().is_empty());
    }

    #[test]
    fn test_dependency_fallbacks() {
        let md = RegistryPackageMetadata::new(json!({
            "versions": [{"version_number": "1.0.0"}],
            "requirements": ["NotNet-GDWeave"]
        }));
        assert_eq!(md.dependencies(), vec!["NotNet-GDWeave"]);
    }

    #[test]
    fn test_empty_record() {
        let md = RegistryPackageMetadata::new(json!({}));
        assert!(md.first_version().is_none());
        assert!(md.full_name().is_none());
        assert!(md.downloads().is_none());
        assert!(md.versions().is_empty());
    }

    #[test]
    fn test_url_templates() {
        let origin = "https://thunderstore.io";
        assert_eq!(
            experimental_package_url(origin, "a", "b"),
            "https://thunderstore.io/api/experimental/package/a/b/"
        );
        assert_eq!(v1_slug_url(origin, "a", "b"), "https://thunderstore.io/api/v1/package/a-b/");
        assert_eq!(
            canonical_download_url(origin, "a", "b", "1.0.0"),
            "https://thunderstore.io/package/download/a/b/1.0.0/"
        );
    }
}
