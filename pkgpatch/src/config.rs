//! Patching configuration.
//!
//! Options come from three tiers, later tiers winning:
//!
//! 1. Built-in defaults
//! 2. The `patches-config` map of the root configuration block
//! 3. Environment variables named `PKGPATCH_<OPTION>` (upper-cased, `-` → `_`)
//!
//! | Option                        | Type | Default |
//! |-------------------------------|------|---------|
//! | `patching-enabled`            | bool | true    |
//! | `dependency-patching-enabled` | bool | true    |
//! | `stop-on-patch-failure`       | bool | true    |
//! | `ignore-packages`             | list | empty   |
//! | `deduplicate-patches`         | bool | false   |

use std::collections::HashMap;

use serde_json::Value;
use tracing::warn;

use crate::error::{PatchError, PatchResult};
use crate::patch::DuplicatePolicy;

/// Prefix of environment variables overriding configuration.
pub const ENV_PREFIX: &str = "PKGPATCH_";

/// Key of the options map in the root configuration block.
pub const CONFIG_KEY: &str = "patches-config";

/// Kind of value an option holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OptionKind {
    Bool,
    List,
}

/// Recognized options.
const OPTIONS: &[(&str, OptionKind)] = &[
    ("patching-enabled", OptionKind::Bool),
    ("dependency-patching-enabled", OptionKind::Bool),
    ("stop-on-patch-failure", OptionKind::Bool),
    ("ignore-packages", OptionKind::List),
    ("deduplicate-patches", OptionKind::Bool),
];

/// Source of environment overrides.
pub trait EnvSource {
    fn var(&self, name: &str) -> Option<String>;
}

/// Reads the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Environment variable that overrides `option`.
pub fn env_var_name(option: &str) -> String {
    format!("{}{}", ENV_PREFIX, option.to_uppercase().replace('-', "_"))
}

/// Effective patching configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchesConfig {
    /// Master switch; when off, resolution still runs but nothing is applied.
    pub patching_enabled: bool,

    /// When off, only patches with root provenance are applied.
    pub dependency_patching_enabled: bool,

    /// Abort the run on the first failed patch.
    pub stop_on_patch_failure: bool,

    /// Packages never patched.
    pub ignore_packages: Vec<String>,

    /// Drop repeated (package, source, description) declarations.
    pub deduplicate_patches: bool,
}

impl Default for PatchesConfig {
    fn default() -> Self {
        Self {
            patching_enabled: true,
            dependency_patching_enabled: true,
            stop_on_patch_failure: true,
            ignore_packages: Vec::new(),
            deduplicate_patches: false,
        }
    }
}

impl PatchesConfig {
    /// Resolve defaults, then `declared` (the `patches-config` map), then `env`.
    ///
    /// # Arguments
    ///
    /// * `declared` - The `patches-config` value, if the root config has one
    /// * `env` - Source of `PKGPATCH_*` overrides
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::InvalidConfiguration`] for an unknown key, a
    /// value of the wrong type, or a `patches-config` that is not an object.
    /// Unusable environment values fall back with a warning instead.
    pub fn resolve(declared: Option<&Value>, env: &dyn EnvSource) -> PatchResult<Self> {
        let mut config = Self::default();

        if let Some(declared) = declared {
            config.apply_declared(declared)?;
        }
        config.apply_env(env);

        Ok(config)
    }

    /// Resolve from the whole root configuration block.
    pub fn from_root_config(root: &Value, env: &dyn EnvSource) -> PatchResult<Self> {
        Self::resolve(root.get(CONFIG_KEY), env)
    }

    fn apply_declared(&mut self, declared: &Value) -> PatchResult<()> {
        let map = declared.as_object().ok_or_else(|| {
            PatchError::InvalidConfiguration(format!("{} must be an object", CONFIG_KEY))
        })?;

        for (key, value) in map {
            let kind = option_kind(key).ok_or_else(|| {
                PatchError::InvalidConfiguration(format!("unknown option '{}'", key))
            })?;

            match kind {
                OptionKind::Bool => {
                    let flag = value.as_bool().ok_or_else(|| {
                        PatchError::InvalidConfiguration(format!(
                            "option '{}' must be a boolean",
                            key
                        ))
                    })?;
                    self.set_bool(key, flag);
                }
                OptionKind::List => {
                    let list = value
                        .as_array()
                        .and_then(|items| {
                            items
                                .iter()
                                .map(|item| item.as_str().map(str::to_string))
                                .collect::<Option<Vec<_>>>()
                        })
                        .ok_or_else(|| {
                            PatchError::InvalidConfiguration(format!(
                                "option '{}' must be a list of strings",
                                key
                            ))
                        })?;
                    self.ignore_packages = list;
                }
            }
        }

        Ok(())
    }

    fn apply_env(&mut self, env: &dyn EnvSource) {
        for (option, kind) in OPTIONS {
            let name = env_var_name(option);
            let Some(raw) = env.var(&name) else {
                continue;
            };

            match kind {
                OptionKind::Bool => match parse_env_bool(&raw) {
                    Some(flag) => self.set_bool(option, flag),
                    None => warn!(variable = %name, value = %raw, "Ignoring unrecognized boolean"),
                },
                OptionKind::List => {
                    if let Some(list) = parse_env_list(&raw) {
                        self.ignore_packages = list;
                    }
                }
            }
        }
    }

    fn set_bool(&mut self, option: &str, flag: bool) {
        match option {
            "patching-enabled" => self.patching_enabled = flag,
            "dependency-patching-enabled" => self.dependency_patching_enabled = flag,
            "stop-on-patch-failure" => self.stop_on_patch_failure = flag,
            "deduplicate-patches" => self.deduplicate_patches = flag,
            _ => {}
        }
    }

    /// Whether `package` is on the ignore list.
    pub fn is_ignored(&self, package: &str) -> bool {
        self.ignore_packages.iter().any(|p| p == package)
    }

    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        if self.deduplicate_patches {
            DuplicatePolicy::Skip
        } else {
            DuplicatePolicy::Keep
        }
    }

    /// Option names and their effective values, for display.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("patching-enabled", self.patching_enabled.to_string()),
            (
                "dependency-patching-enabled",
                self.dependency_patching_enabled.to_string(),
            ),
            ("stop-on-patch-failure", self.stop_on_patch_failure.to_string()),
            ("ignore-packages", self.ignore_packages.join(",")),
            ("deduplicate-patches", self.deduplicate_patches.to_string()),
        ]
    }

    pub fn with_patching_enabled(mut self, enabled: bool) -> Self {
        self.patching_enabled = enabled;
        self
    }

    pub fn with_dependency_patching_enabled(mut self, enabled: bool) -> Self {
        self.dependency_patching_enabled = enabled;
        self
    }

    pub fn with_stop_on_patch_failure(mut self, stop: bool) -> Self {
        self.stop_on_patch_failure = stop;
        self
    }

    pub fn with_ignore_packages(mut self, packages: Vec<String>) -> Self {
        self.ignore_packages = packages;
        self
    }

    pub fn with_deduplicate_patches(mut self, dedupe: bool) -> Self {
        self.deduplicate_patches = dedupe;
        self
    }
}

fn option_kind(key: &str) -> Option<OptionKind> {
    OPTIONS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, kind)| *kind)
}

/// `true/yes/1` and `false/no/0`, case-insensitive; anything else is `None`.
fn parse_env_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Comma-separated list; `None` when nothing is left after trimming.
fn parse_env_list(raw: &str) -> Option<Vec<String>> {
    let items: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}
