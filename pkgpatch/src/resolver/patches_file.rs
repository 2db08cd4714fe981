//! Patches declared in a separate JSON patch-list file.
//!
//! The file is named by the `patches-file` key of the root configuration and
//! has the shape:
//!
//! ```text
//! {
//!     "patches": {
//!         "vendor/package": [
//!             {"description": "...", "url": "...", "hash": "...", "patch_level": 1}
//!         ]
//!     }
//! }
//! ```
//!
//! Patches from this file count as root patches.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use serde_json::error::Category;
use serde_json::Value;
use tracing::debug;

use super::{add_declarations, ResolveOutcome, Resolver};
use crate::error::{PatchError, PatchResult};
use crate::patch::{PatchCollection, PROVENANCE_ROOT};

/// Message for a patch-list file that is not valid JSON.
pub const MALFORMED_JSON: &str = "Syntax error, malformed JSON.";

/// Message for a patch-list file without a top-level `patches` object.
pub const NO_PATCHES_FOUND: &str = "No patches found.";

/// Reads patches from the file named by `patches-file`.
#[derive(Debug, Clone, Default)]
pub struct PatchListFileResolver {
    path: Option<PathBuf>,
    base_dir: Option<PathBuf>,
}

impl PatchListFileResolver {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            base_dir: None,
        }
    }

    /// Build from the root configuration block.
    ///
    /// Relative paths, both of the file itself and of the patches it lists,
    /// are taken from `base_dir`.
    pub fn from_root_config(root: &Value, base_dir: &Path) -> Self {
        let path = root
            .get("patches-file")
            .and_then(Value::as_str)
            .map(|p| {
                let p = Path::new(p);
                if p.is_absolute() {
                    p.to_path_buf()
                } else {
                    base_dir.join(p)
                }
            });
        Self {
            path,
            base_dir: Some(base_dir.to_path_buf()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn read_patches_file(&self, path: &Path) -> PatchResult<Value> {
        let invalid = |message: &str| PatchError::InvalidPatchListFile {
            path: path.to_path_buf(),
            message: message.to_string(),
        };

        let contents = fs::read_to_string(path).map_err(|e| PatchError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut document: Value = serde_json::from_str(&contents).map_err(|e| {
            debug!(path = %path.display(), error = %e, "Patches file failed to parse");
            match e.classify() {
                Category::Syntax | Category::Eof => invalid(MALFORMED_JSON),
                Category::Io | Category::Data => invalid(&e.to_string()),
            }
        })?;

        match document.get_mut("patches") {
            Some(patches) if patches.is_object() => Ok(patches.take()),
            _ => Err(invalid(NO_PATCHES_FOUND)),
        }
    }
}

impl Resolver for PatchListFileResolver {
    fn name(&self) -> &str {
        "patches-file"
    }

    fn is_enabled(&self) -> bool {
        match &self.path {
            Some(path) => path.is_file() && File::open(path).is_ok(),
            None => false,
        }
    }

    fn describe(&self) -> String {
        match &self.path {
            Some(path) => format!("Gathering patches from patches file {}", path.display()),
            None => "Gathering patches from patches file".to_string(),
        }
    }

    fn resolve(&self, collection: &mut PatchCollection) -> PatchResult<ResolveOutcome> {
        let path = self.path.as_deref().ok_or_else(|| {
            PatchError::LogicViolation("patches file resolver has no file configured".to_string())
        })?;

        let patches = self.read_patches_file(path)?;
        let packages = patches.as_object().cloned().unwrap_or_default();
        Ok(add_declarations(
            &packages,
            PROVENANCE_ROOT,
            self.base_dir.as_deref(),
            collection,
        ))
    }
}
