//! Patches declared in the root project's configuration.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use super::{add_declarations, ResolveOutcome, Resolver};
use crate::error::PatchResult;
use crate::patch::{PatchCollection, PROVENANCE_ROOT};

/// Reads the `patches` map of the root configuration block.
#[derive(Debug, Clone, Default)]
pub struct RootConfigResolver {
    patches: Map<String, Value>,
    base_dir: Option<PathBuf>,
}

impl RootConfigResolver {
    /// Build from the whole root configuration block.
    ///
    /// A missing or non-object `patches` key leaves the resolver disabled.
    pub fn from_root_config(root: &Value) -> Self {
        let patches = root
            .get("patches")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        Self {
            patches,
            base_dir: None,
        }
    }

    /// Resolve relative patch paths against the project directory.
    pub fn with_base_dir(mut self, base_dir: &Path) -> Self {
        self.base_dir = Some(base_dir.to_path_buf());
        self
    }
}

impl Resolver for RootConfigResolver {
    fn name(&self) -> &str {
        "root-config"
    }

    fn is_enabled(&self) -> bool {
        !self.patches.is_empty()
    }

    fn describe(&self) -> String {
        "Gathering patches from root package".to_string()
    }

    fn resolve(&self, collection: &mut PatchCollection) -> PatchResult<ResolveOutcome> {
        Ok(add_declarations(
            &self.patches,
            PROVENANCE_ROOT,
            self.base_dir.as_deref(),
            collection,
        ))
    }
}
