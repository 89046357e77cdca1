//! Archive verification, expansion and payload discovery
//!
//! Registry archives wrap the actual mod files in any number of container
//! folders (repository name, version folder, `GDWeave/mods/...`). After
//! expansion the payload root is taken to be the deepest directory that
//! directly holds a recognized mod file.

use crate::{Error, Result};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::ZipArchive;

/// File extensions that mark a directory as mod payload
///
/// Binary libraries, packed game data and manifests.
pub const PAYLOAD_EXTENSIONS: &[&str] = &["dll", "pck", "json"];

fn open_archive(path: &Path) -> Result<ZipArchive<BufReader<File>>> {
    let file = File::open(path)?;
    ZipArchive::new(BufReader::new(file))
        .map_err(|e| Error::Integrity(format!("{}: {}", path.display(), e)))
}

/// Read every entry to the end so each CRC is checked
///
/// Returns the number of entries in the archive.
pub fn verify_archive(path: &Path) -> Result<usize> {
    let mut archive = open_archive(path)?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| Error::Integrity(format!("{}: entry {}: {}", path.display(), i, e)))?;
        let name = entry.name().to_string();
        io::copy(&mut entry, &mut io::sink())
            .map_err(|e| Error::Integrity(format!("{}: {}: {}", path.display(), name, e)))?;
    }

    Ok(archive.len())
}

/// Expand an archive into `dest`
///
/// Entries that would escape `dest` are skipped.
pub fn extract_archive(path: &Path, dest: &Path) -> Result<()> {
    let mut archive = open_archive(path)?;
    fs::create_dir_all(dest)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!(entry = entry.name(), "skipping archive entry outside the target");
            continue;
        };
        let output_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&output_path)?;
        } else {
            if let Some(parent) = output_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut outfile = File::create(&output_path)?;
            io::copy(&mut entry, &mut outfile)?;
        }
    }

    Ok(())
}

/// Extensions match case-insensitively, so `Mod.DLL` counts
fn is_payload_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            PAYLOAD_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Deepest directory under `root` that directly contains a payload file
///
/// `root` itself qualifies. Among equally deep candidates the first in
/// walk order (sorted by name) wins.
pub fn find_payload_dir(root: &Path) -> Result<PathBuf> {
    let mut best: Option<(usize, PathBuf)> = None;

    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
    {
        let holds_payload = fs::read_dir(entry.path())?
            .flatten()
            .any(|child| child.path().is_file() && is_payload_file(&child.path()));
        if !holds_payload {
            continue;
        }

        let depth = entry.path().components().count();
        if best.as_ref().map_or(true, |(best_depth, _)| depth > *best_depth) {
            best = Some((depth, entry.path().to_path_buf()));
        }
    }

    best.map(|(_, path)| path).ok_or_else(|| {
        Error::Structural(format!(
            "No mod folder with .{} files found in {}",
            PAYLOAD_EXTENSIONS.join(", ."),
            root.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, content) in files {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content).unwrap();
        }
        zip.finish().unwrap();
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_verify_and_extract() {
        let temp = TempDir::new().unwrap();
        let zip_path = temp.path().join("mod.zip");
        write_zip(
            &zip_path,
            &[
                ("manifest.json", b"{}"),
                ("GDWeave/mods/Lure/Lure.dll", b"MZ"),
            ],
        );

        assert_eq!(verify_archive(&zip_path).unwrap(), 2);

        let dest = temp.path().join("out");
        extract_archive(&zip_path, &dest).unwrap();
        assert!(dest.join("manifest.json").is_file());
        assert!(dest.join("GDWeave/mods/Lure/Lure.dll").is_file());
    }

    #[test]
    fn test_corrupt_archive_is_integrity_error() {
        let temp = TempDir::new().unwrap();
        let zip_path = temp.path().join("bad.zip");
        fs::write(&zip_path, b"<html>rate limited</html>").unwrap();

        assert!(matches!(verify_archive(&zip_path), Err(Error::Integrity(_))));
    }

    #[test]
    fn test_truncated_archive_is_integrity_error() {
        let temp = TempDir::new().unwrap();
        let zip_path = temp.path().join("mod.zip");
        write_zip(&zip_path, &[("Lure.dll", &[42u8; 4096])]);

        let bytes = fs::read(&zip_path).unwrap();
        fs::write(&zip_path, &bytes[..bytes.len() / 2]).unwrap();

        assert!(matches!(verify_archive(&zip_path), Err(Error::Integrity(_))));
    }

    #[test]
    fn test_deepest_payload_wins() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("TeamLure-LureRefreshed");
        touch(&root.join("manifest.json"));
        touch(&root.join("GDWeave/mods/LureRefreshed/LureRefreshed.dll"));

        assert_eq!(
            find_payload_dir(&root).unwrap(),
            root.join("GDWeave/mods/LureRefreshed")
        );
    }

    #[test]
    fn test_unrelated_deep_file_is_ignored() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("pkg");
        touch(&root.join("Mod/Mod.pck"));
        touch(&root.join("Mod/docs/images/banner.png"));

        assert_eq!(find_payload_dir(&root).unwrap(), root.join("Mod"));
    }

    #[test]
    fn test_root_payload() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("pkg");
        touch(&root.join("Mod.DLL"));
        touch(&root.join("README.md"));

        assert_eq!(find_payload_dir(&root).unwrap(), root);
    }

    #[test]
    fn test_no_payload_is_structural_error() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("pkg");
        touch(&root.join("README.md"));
        touch(&root.join("icon.png"));

        assert!(matches!(find_payload_dir(&root), Err(Error::Structural(_))));
    }
}
