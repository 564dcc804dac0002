//! File access on the device

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Result, RmfAudioError};

/// Whole-file access to the device filesystem
pub trait RemoteFiles {
    /// Read a file's full contents
    ///
    /// Fails with `RemoteFileNotFound` if the path does not exist.
    fn read(&mut self, path: &str) -> Result<Vec<u8>>;

    /// Create or replace a file, creating missing parent directories
    fn write(&mut self, path: &str, contents: &[u8]) -> Result<()>;

    /// Remove a file; a missing file is not an error
    fn remove(&mut self, path: &str) -> Result<()>;
}

impl<F: RemoteFiles + ?Sized> RemoteFiles for &mut F {
    fn read(&mut self, path: &str) -> Result<Vec<u8>> {
        (**self).read(path)
    }

    fn write(&mut self, path: &str, contents: &[u8]) -> Result<()> {
        (**self).write(path, contents)
    }

    fn remove(&mut self, path: &str) -> Result<()> {
        (**self).remove(path)
    }
}

/// Device filesystem mapped onto a local directory
///
/// Absolute device paths are resolved under `root`. A root of `/` gives
/// direct access when running on the device itself.
#[derive(Debug, Clone)]
pub struct LocalFiles {
    root: PathBuf,
}

impl LocalFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl RemoteFiles for LocalFiles {
    fn read(&mut self, path: &str) -> Result<Vec<u8>> {
        std::fs::read(self.resolve(path)).map_err(|e| match e.kind() {
            ErrorKind::NotFound => RmfAudioError::RemoteFileNotFound {
                path: path.to_string(),
            },
            _ => RmfAudioError::Transfer {
                path: path.to_string(),
                reason: e.to_string(),
            },
        })
    }

    fn write(&mut self, path: &str, contents: &[u8]) -> Result<()> {
        let local = self.resolve(path);
        if let Some(parent) = local.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&local, contents).map_err(|e| RmfAudioError::Transfer {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    fn remove(&mut self, path: &str) -> Result<()> {
        match std::fs::remove_file(self.resolve(path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RmfAudioError::Transfer {
                path: path.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}
