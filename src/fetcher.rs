//! Streamed artifact downloads
//!
//! Artifacts are written to scratch storage in fixed-size chunks. When the
//! server announces a length, progress is reported once per crossed quartile
//! and the final byte count must match it.

use crate::cascade::ResolvedArtifact;
use crate::{Error, RegistryClient, Result};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Progress callback for download operations
///
/// Called with:
/// - `message`: Description of current operation (e.g., "Downloading lure.zip")
/// - `current`: Bytes received so far
/// - `total`: Expected total bytes
pub type ProgressCallback = Arc<dyn Fn(&str, u64, u64) + Send + Sync>;

const CHUNK_SIZE: usize = 8192;

/// Reduce a registry-provided filename to a single safe path component
pub fn sanitize_filename(filename: &str) -> Option<String> {
    let name = Path::new(filename).file_name()?.to_string_lossy().to_string();
    if name.is_empty() || name == ".." || name.contains(['/', '\\']) {
        return None;
    }
    Some(name)
}

/// Download an artifact into `dest_dir`
///
/// Returns the path of the written file. On any failure the partial file is
/// removed.
pub fn download_artifact(
    client: &RegistryClient,
    artifact: &ResolvedArtifact,
    dest_dir: &Path,
    progress: Option<ProgressCallback>,
) -> Result<PathBuf> {
    let filename = sanitize_filename(&artifact.filename).ok_or_else(|| {
        Error::Other(format!("Unusable artifact filename: {}", artifact.filename))
    })?;
    fs::create_dir_all(dest_dir)?;
    let path = dest_dir.join(&filename);

    let response = client.download(&artifact.download_url)?;
    let total = response.content_length().filter(|len| *len > 0);

    match stream_to_file(response, &path, &filename, total, progress) {
        Ok(written) => {
            tracing::debug!(file = %path.display(), bytes = written, "download complete");
            Ok(path)
        }
        Err(e) => {
            let _ = fs::remove_file(&path);
            Err(e)
        }
    }
}

/// Copy `reader` into `path`, returning the number of bytes written
fn stream_to_file<R: Read>(
    mut reader: R,
    path: &Path,
    label: &str,
    total: Option<u64>,
    progress: Option<ProgressCallback>,
) -> Result<u64> {
    let mut file = File::create(path)?;
    let mut buffer = vec![0; CHUNK_SIZE];
    let mut downloaded: u64 = 0;
    let mut next_quartile: u64 = 1;

    loop {
        let read = reader
            .read(&mut buffer)
            .map_err(|e| Error::Transport(format!("Download of {} interrupted: {}", label, e)))?;
        if read == 0 {
            break;
        }
        file.write_all(&buffer[..read])?;
        downloaded += read as u64;

        if let (Some(total), Some(cb)) = (total, progress.as_ref()) {
            while next_quartile <= 4 && downloaded * 4 >= total * next_quartile {
                cb(&format!("Downloading {}", label), downloaded, total);
                next_quartile += 1;
            }
        }
    }
    file.flush()?;

    if let Some(total) = total {
        if downloaded != total {
            return Err(Error::Transport(format!(
                "Incomplete download of {}: received {} of {} bytes",
                label, downloaded, total
            )));
        }
    }

    Ok(downloaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn recorder() -> (ProgressCallback, Arc<Mutex<Vec<(u64, u64)>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        let cb: ProgressCallback = Arc::new(move |_msg: &str, current: u64, total: u64| {
            sink.lock().unwrap().push((current, total));
        });
        (cb, calls)
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("lure.zip").as_deref(), Some("lure.zip"));
        assert_eq!(sanitize_filename("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_filename("..").as_deref(), None);
        assert_eq!(sanitize_filename("").as_deref(), None);
    }

    #[test]
    fn test_quartile_progress() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.zip");
        let data = vec![7u8; 40_000];
        let (cb, calls) = recorder();

        let written =
            stream_to_file(Cursor::new(data), &path, "a.zip", Some(40_000), Some(cb)).unwrap();
        assert_eq!(written, 40_000);
        assert_eq!(fs::metadata(&path).unwrap().len(), 40_000);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls.last(), Some(&(40_000, 40_000)));
        assert!(calls.windows(2).all(|w| w[0].0 <= w[1].0));
    }

    #[test]
    fn test_unknown_length_is_silent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.zip");
        let (cb, calls) = recorder();

        stream_to_file(Cursor::new(vec![1u8; 100]), &path, "a.zip", None, Some(cb)).unwrap();
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_short_body_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.zip");

        let err = stream_to_file(Cursor::new(vec![1u8; 10]), &path, "a.zip", Some(20), None)
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
