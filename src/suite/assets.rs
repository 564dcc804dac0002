//! Staging of test artifacts and reference streams on the device
//!
//! Directories are expanded recursively and keep their layout under the
//! target directory. Streams with a configured SHA-256 are verified before
//! upload.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::config::{join_device_path, AssetRef};
use crate::error::{Result, RmfAudioError};
use crate::remote::RemoteFiles;

/// Hex-encoded SHA-256 of `bytes`
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes).iter().map(|b| format!("{:02x}", b)).collect()
}

/// Local files of an asset, each with its device-side relative path
fn expand(asset: &Path) -> Result<Vec<(PathBuf, String)>> {
    if asset.is_file() {
        let name = asset
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        return Ok(vec![(asset.to_path_buf(), name)]);
    }
    if !asset.is_dir() {
        return Err(RmfAudioError::Config {
            path: asset.display().to_string(),
            reason: "asset does not exist".to_string(),
        });
    }

    let base = asset.parent().unwrap_or_else(|| Path::new(""));
    let mut files = Vec::new();
    for entry in WalkDir::new(asset).sort_by_file_name() {
        let entry = entry.map_err(|e| RmfAudioError::Config {
            path: asset.display().to_string(),
            reason: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(base)
            .unwrap_or_else(|_| entry.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        files.push((entry.path().to_path_buf(), relative));
    }
    Ok(files)
}

/// Device paths uploaded for one test; removed again by [`StagedAssets::cleanup`]
#[derive(Debug, Default)]
pub struct StagedAssets {
    artifacts: Vec<String>,
    streams: Vec<String>,
}

impl StagedAssets {
    pub fn artifacts(&self) -> &[String] {
        &self.artifacts
    }

    /// Device paths of the reference streams, in configuration order
    pub fn streams(&self) -> &[String] {
        &self.streams
    }

    /// Remove the staged streams from the device
    ///
    /// Every path is attempted; the first failure is returned.
    pub fn cleanup<F: RemoteFiles + ?Sized>(self, files: &mut F) -> Result<()> {
        let mut first_error = None;
        for path in &self.streams {
            log::debug!("Removing stream {}", path);
            if let Err(e) = files.remove(path) {
                log::warn!("Failed to remove {}: {}", path, e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Uploads assets under a device directory
pub struct AssetStager<'a, F: RemoteFiles + ?Sized> {
    files: &'a mut F,
    staged: StagedAssets,
}

impl<'a, F: RemoteFiles + ?Sized> AssetStager<'a, F> {
    pub fn new(files: &'a mut F) -> Self {
        Self {
            files,
            staged: StagedAssets::default(),
        }
    }

    /// Upload artifacts (binaries, scripts, profiles) without checksum checks
    pub fn artifacts(&mut self, assets: &[PathBuf], target_dir: &str) -> Result<()> {
        for asset in assets {
            upload(&mut *self.files, asset, None, target_dir, &mut self.staged.artifacts)?;
        }
        Ok(())
    }

    /// Upload test-specific artifacts, verifying checksums when given
    pub fn checked_artifacts(&mut self, assets: &[AssetRef], target_dir: &str) -> Result<()> {
        for asset in assets {
            upload(&mut *self.files, asset.path(), asset.sha256(), target_dir, &mut self.staged.artifacts)?;
        }
        Ok(())
    }

    /// Upload reference streams, verifying checksums when given
    ///
    /// Streams uploaded before a failure are still recorded for cleanup.
    pub fn streams(&mut self, assets: &[AssetRef], target_dir: &str) -> Result<()> {
        for asset in assets {
            upload(&mut *self.files, asset.path(), asset.sha256(), target_dir, &mut self.staged.streams)?;
        }
        Ok(())
    }

    /// Hand back what was uploaded
    pub fn finish(self) -> StagedAssets {
        self.staged
    }
}

fn upload<F: RemoteFiles + ?Sized>(
    files: &mut F,
    asset: &Path,
    sha256: Option<&str>,
    target_dir: &str,
    uploaded: &mut Vec<String>,
) -> Result<()> {
    let mut count = 0;
    for (local, relative) in expand(asset)? {
        let bytes = std::fs::read(&local)?;
        if let Some(expected) = sha256 {
            let actual = sha256_hex(&bytes);
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(RmfAudioError::ChecksumMismatch {
                    path: local.display().to_string(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }
        let remote = join_device_path(target_dir, &relative);
        log::debug!("Uploading {} -> {}", local.display(), remote);
        files.write(&remote, &bytes)?;
        uploaded.push(remote);
        count += 1;
    }
    log::info!("Staged {} ({} files) in {}", asset.display(), count, target_dir);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::LocalFiles;
    use tempfile::tempdir;

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_directory_is_expanded_and_cleaned_up() {
        let host = tempdir().unwrap();
        let device = tempdir().unwrap();
        let streams_dir = host.path().join("streams");
        std::fs::create_dir_all(streams_dir.join("nested")).unwrap();
        std::fs::write(streams_dir.join("a.wav"), b"a").unwrap();
        std::fs::write(streams_dir.join("nested/b.wav"), b"b").unwrap();

        let mut files = LocalFiles::new(device.path());
        let mut stager = AssetStager::new(&mut files);
        stager.streams(&[AssetRef::Path(streams_dir)], "/tmp").unwrap();
        let staged = stager.finish();

        assert_eq!(
            staged.streams(),
            &["/tmp/streams/a.wav".to_string(), "/tmp/streams/nested/b.wav".to_string()]
        );
        assert!(device.path().join("tmp/streams/nested/b.wav").exists());

        staged.cleanup(&mut files).unwrap();
        assert!(!device.path().join("tmp/streams/a.wav").exists());
    }

    #[test]
    fn test_checksum_mismatch_stops_staging() {
        let host = tempdir().unwrap();
        let device = tempdir().unwrap();
        let stream = host.path().join("tone.wav");
        std::fs::write(&stream, b"tone").unwrap();

        let mut files = LocalFiles::new(device.path());
        let mut stager = AssetStager::new(&mut files);
        let asset = AssetRef::Checked {
            path: stream,
            sha256: Some("00".repeat(32)),
        };
        let err = stager.streams(&[asset], "/tmp").unwrap_err();
        assert_eq!(err.error_code(), "CHECKSUM_MISMATCH");
        assert!(!device.path().join("tmp/tone.wav").exists());
    }
}
