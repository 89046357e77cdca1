//! Test utilities and helpers for WebLoader integration tests.
//!
//! Fixtures for zip archives, registry JSON records and isolated
//! configuration directories.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Build a zip archive in memory from `(path, content)` pairs
pub fn build_zip(files: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in files {
        zip.start_file(*name, SimpleFileOptions::default())
            .expect("Failed to start zip entry");
        zip.write_all(content.as_bytes())
            .expect("Failed to write zip entry");
    }
    zip.finish().expect("Failed to finish zip").into_inner()
}

/// A typical GDWeave mod archive
pub fn mod_archive(mod_name: &str) -> Vec<u8> {
    build_zip(&[
        ("manifest.json", r#"{"name": "test"}"#),
        ("icon.png", "png"),
        (&format!("GDWeave/mods/{0}/{0}.dll", mod_name), "MZ"),
        (&format!("GDWeave/mods/{0}/manifest.json", mod_name), "{}"),
    ])
}

/// Experimental API record whose first version downloads from `download_url`
pub fn package_record(author: &str, name: &str, download_url: &str, deps: &[&str]) -> Value {
    json!({
        "namespace": author,
        "name": name,
        "full_name": format!("{}-{}", author, name),
        "latest": {
            "version_number": "1.0.0",
            "download_url": download_url,
            "dependencies": deps,
        }
    })
}

/// Package page URL for the webfishing community on `origin`
pub fn page_url(origin: &str, author: &str, name: &str) -> String {
    format!("{}/c/webfishing/p/{}/{}/", origin, author, name)
}

/// Isolated environment: config directory and mods directory in a temp dir
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub config_dir: PathBuf,
    pub mods_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config_dir = temp_dir.path().join(".webloader");
        let mods_dir = temp_dir.path().join("mods");
        fs::create_dir_all(&config_dir).expect("Failed to create config directory");

        Self {
            temp_dir,
            config_dir,
            mods_dir,
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Point the registry at `origin` and install into the mods directory
    pub fn configure(&self, origin: &str) {
        let config = format!(
            r#"[registry]
origin = "{}"
probe_timeout_secs = 1

[install]
mods_dir = "{}"
cooldown_ms = 0
"#,
            origin,
            self.mods_dir.display().to_string().replace('\\', "\\\\")
        );
        fs::write(self.config_dir.join("config.toml"), config).expect("Failed to write config");
    }
}
