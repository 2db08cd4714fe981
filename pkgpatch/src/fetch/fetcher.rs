//! Localizing and verifying patch content.

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::TempDir;
use tracing::{debug, info};

use super::checksum::calculate_file_sha1;
use super::http::PatchDownloader;
use crate::error::{PatchError, PatchResult};
use crate::patch::{Patch, PatchSource};

/// Makes patch content available locally and checks its SHA-1.
///
/// Downloaded patches are written into a staging directory owned by the
/// fetcher. The directory is unique per fetcher and is removed, with
/// everything in it, when the fetcher is dropped.
pub struct PatchFetcher {
    downloader: Box<dyn PatchDownloader>,
    staging: TempDir,
}

impl PatchFetcher {
    /// Create a fetcher staging into a fresh directory under the system temp dir.
    pub fn new(downloader: Box<dyn PatchDownloader>) -> PatchResult<Self> {
        let staging = tempfile::Builder::new()
            .prefix("pkgpatch-")
            .tempdir()
            .map_err(|e| PatchError::WriteFailed {
                path: std::env::temp_dir(),
                source: e,
            })?;
        Ok(Self {
            downloader,
            staging,
        })
    }

    /// Create a fetcher staging into a fresh directory under `parent`.
    pub fn new_in(downloader: Box<dyn PatchDownloader>, parent: &Path) -> PatchResult<Self> {
        let staging = tempfile::Builder::new()
            .prefix("pkgpatch-")
            .tempdir_in(parent)
            .map_err(|e| PatchError::WriteFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        Ok(Self {
            downloader,
            staging,
        })
    }

    pub fn staging_dir(&self) -> &Path {
        self.staging.path()
    }

    /// Copy the patch content into the staging directory.
    ///
    /// No-op when the patch already has a local path.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::DownloadFailure`] naming the source if the
    /// content cannot be read or staged.
    pub fn fetch(&self, patch: &mut Patch) -> PatchResult<()> {
        if patch.local_path().is_some() {
            return Ok(());
        }

        let source = patch.source().to_string();
        let bytes = match patch.location() {
            PatchSource::Remote(url) => self.downloader.download(url)?,
            PatchSource::Local(path) => fs::read(&path).map_err(|e| {
                debug!(path = %path.display(), error = %e, "Local patch read failed");
                PatchError::download(&source, format!("Could not download patch from {}", source))
            })?,
        };

        let write_failed = |e: std::io::Error| {
            debug!(url = %source, error = %e, "Staging write failed");
            PatchError::download(
                &source,
                format!("Could not write patch to {}", self.staging.path().display()),
            )
        };

        let mut file = tempfile::Builder::new()
            .prefix("patch-")
            .suffix(".patch")
            .tempfile_in(self.staging.path())
            .map_err(write_failed)?;
        file.write_all(&bytes).map_err(write_failed)?;
        file.flush().map_err(write_failed)?;
        let path = file
            .into_temp_path()
            .keep()
            .map_err(|e| write_failed(e.error))?;

        debug!(url = %source, path = %path.display(), bytes = bytes.len(), "Patch fetched");
        patch.set_local_path(path)
    }

    /// Check the local copy against the patch's hash.
    ///
    /// A patch without a declared hash adopts the computed one.
    ///
    /// # Errors
    ///
    /// * [`PatchError::LogicViolation`] if the patch was never fetched
    /// * [`PatchError::VerificationFailure`] if the local copy is unreadable
    ///   or its digest differs from the declared hash
    pub fn verify(&self, patch: &mut Patch) -> PatchResult<()> {
        if patch.is_verified() {
            return Ok(());
        }

        let local = patch.local_path().ok_or_else(|| {
            PatchError::LogicViolation("Cannot verify patch without downloading it first!".to_string())
        })?;

        let digest = calculate_file_sha1(local).map_err(|_| {
            PatchError::verification(
                patch.source(),
                format!("Could not load patch from {}", local.display()),
            )
        })?;

        let expected = patch.hash().as_sha1().map(str::to_string);
        match expected {
            None => {
                info!(
                    package = %patch.package(),
                    url = %patch.source(),
                    hash = %digest,
                    "Pinning hash for patch"
                );
                patch.pin_hash(digest);
            }
            Some(expected) if expected == digest => {}
            Some(_) => {
                return Err(PatchError::verification(
                    patch.source(),
                    format!("SHA-1 mismatch for patch downloaded from {}", patch.source()),
                ));
            }
        }

        patch.mark_verified();
        Ok(())
    }

    /// Fetch then verify.
    pub fn materialize(&self, patch: &mut Patch) -> PatchResult<()> {
        self.fetch(patch)?;
        self.verify(patch)
    }
}
