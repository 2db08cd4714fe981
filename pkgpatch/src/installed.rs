//! Installed packages and their durable patch records.
//!
//! The installed-state file is a JSON document:
//!
//! ```json
//! {
//!   "packages": [
//!     {
//!       "name": "vendor/pkg",
//!       "version": "1.2.0",
//!       "install-path": "vendor/pkg",
//!       "extra": { "patches_applied": [ { "description": "...", "url": "..." } ] }
//!     }
//!   ]
//! }
//! ```
//!
//! Relative install paths are resolved against the directory holding the file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{PatchError, PatchResult};
use crate::patch::PatchRecord;

/// Key under a package's `extra` map holding the patches applied to it.
pub const APPLIED_PATCHES_KEY: &str = "patches_applied";

/// A package the host has installed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstalledPackage {
    pub name: String,

    #[serde(default)]
    pub version: String,

    #[serde(rename = "install-path")]
    pub install_path: PathBuf,

    /// Free-form metadata. `patches` holds declarations this package makes;
    /// `patches_applied` holds what was applied to it.
    #[serde(default = "empty_object")]
    pub extra: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl InstalledPackage {
    /// Patches recorded as applied by a previous run.
    pub fn applied_patches(&self) -> Vec<PatchRecord> {
        self.extra
            .get(APPLIED_PATCHES_KEY)
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default()
    }

    fn set_applied_patches(&mut self, records: Vec<PatchRecord>) -> Result<(), String> {
        if !self.extra.is_object() {
            self.extra = empty_object();
        }
        let Some(extra) = self.extra.as_object_mut() else {
            return Err("extra is not an object".to_string());
        };

        if records.is_empty() {
            extra.remove(APPLIED_PATCHES_KEY);
        } else {
            let value = serde_json::to_value(records).map_err(|e| e.to_string())?;
            extra.insert(APPLIED_PATCHES_KEY.to_string(), value);
        }
        Ok(())
    }
}

/// Durable record of which patches were applied to which package.
pub trait InstalledRepository {
    /// Replace the recorded patch list of `package`.
    fn record_patches(&mut self, package: &str, records: Vec<PatchRecord>) -> PatchResult<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct InstalledState {
    #[serde(default)]
    packages: Vec<InstalledPackage>,
}

/// Installed-state repository backed by a JSON file.
///
/// Every [`InstalledRepository::record_patches`] call rewrites the file.
#[derive(Debug)]
pub struct JsonInstalledRepository {
    path: PathBuf,
    state: InstalledState,
}

impl JsonInstalledRepository {
    /// Load the state file.
    ///
    /// # Arguments
    ///
    /// * `path` - Installed-state JSON file; it need not exist yet
    ///
    /// # Returns
    ///
    /// The repository, empty when the file is missing.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::StateFile`] if the file exists but cannot be read
    /// or parsed.
    pub fn load(path: impl Into<PathBuf>) -> PatchResult<Self> {
        let path = path.into();

        let state = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| PatchError::ReadFailed {
                path: path.clone(),
                source: e,
            })?;
            serde_json::from_str(&content).map_err(|e| PatchError::StateFile {
                path: path.clone(),
                reason: e.to_string(),
            })?
        } else {
            InstalledState::default()
        };

        Ok(Self { path, state })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Installed packages with install paths made absolute.
    pub fn packages(&self) -> Vec<InstalledPackage> {
        self.state
            .packages
            .iter()
            .map(|package| self.resolved(package))
            .collect()
    }

    pub fn package(&self, name: &str) -> Option<InstalledPackage> {
        self.state
            .packages
            .iter()
            .find(|p| p.name == name)
            .map(|package| self.resolved(package))
    }

    fn resolved(&self, package: &InstalledPackage) -> InstalledPackage {
        let mut package = package.clone();
        if package.install_path.is_relative() {
            if let Some(base) = self.path.parent() {
                package.install_path = base.join(&package.install_path);
            }
        }
        package
    }

    /// Write the state back, via a temporary file and rename.
    pub fn save(&self) -> PatchResult<()> {
        let content = serde_json::to_string_pretty(&self.state).map_err(|e| {
            PatchError::StateFile {
                path: self.path.clone(),
                reason: e.to_string(),
            }
        })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| PatchError::WriteFailed {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, content).map_err(|e| PatchError::WriteFailed {
            path: temp_path.clone(),
            source: e,
        })?;
        fs::rename(&temp_path, &self.path).map_err(|e| PatchError::WriteFailed {
            path: self.path.clone(),
            source: e,
        })?;

        Ok(())
    }
}

impl InstalledRepository for JsonInstalledRepository {
    fn record_patches(&mut self, package: &str, records: Vec<PatchRecord>) -> PatchResult<()> {
        let entry = self
            .state
            .packages
            .iter_mut()
            .find(|p| p.name == package)
            .ok_or_else(|| PatchError::StateFile {
                path: self.path.clone(),
                reason: format!("package {} is not installed", package),
            })?;

        let count = records.len();
        entry
            .set_applied_patches(records)
            .map_err(|reason| PatchError::StateFile {
                path: self.path.clone(),
                reason,
            })?;

        debug!(package, count, path = %self.path.display(), "Recorded applied patches");
        self.save()
    }
}
