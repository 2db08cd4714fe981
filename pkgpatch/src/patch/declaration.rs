//! User-authored patch declarations and the persisted record of applied patches.
//!
//! Two declaration shapes are accepted per package:
//!
//! ```text
//! "vendor/package": [
//!     {"description": "Fix", "url": "https://...", "hash": "<sha1>", "patch_level": 1}
//! ]
//!
//! "vendor/package": {
//!     "Fix": "https://..."
//! }
//! ```
//!
//! The second (description -> url map) is the older short form.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PatchError;

const MISSING_FIELDS: &str = "All patches must have a description and URL.";

/// A declared patch level, either a JSON number or text (`"auto"`, `"2"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeclaredLevel {
    Number(u32),
    Text(String),
}

/// One patch declaration as written by a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchDeclaration {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub patch_level: Option<DeclaredLevel>,
}

impl PatchDeclaration {
    pub fn new(description: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    pub fn with_patch_level(mut self, level: u32) -> Self {
        self.patch_level = Some(DeclaredLevel::Number(level));
        self
    }

    /// Description and URL, or the declaration error for `package`.
    pub(crate) fn required_fields(&self, package: &str) -> Result<(&str, &str), PatchError> {
        match (self.description.as_deref(), self.url.as_deref()) {
            (Some(description), Some(url)) if !description.is_empty() && !url.is_empty() => {
                Ok((description, url))
            }
            _ => Err(PatchError::InvalidPatchDeclaration {
                package: package.to_string(),
                reason: MISSING_FIELDS.to_string(),
            }),
        }
    }
}

/// What gets written to a package's installed-state record for each applied patch.
///
/// `patch_level` is absent only while the level is still automatic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchRecord {
    pub description: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl From<PatchRecord> for PatchDeclaration {
    fn from(record: PatchRecord) -> Self {
        Self {
            description: Some(record.description),
            url: Some(record.url),
            hash: record.hash,
            patch_level: record.patch_level.map(DeclaredLevel::Number),
        }
    }
}

/// Declarations found for one package, plus any entries that could not be read.
#[derive(Debug, Default)]
pub struct PackageDeclarations {
    pub declarations: Vec<PatchDeclaration>,
    pub rejected: Vec<PatchError>,
}

/// Read the declarations listed under one package key.
///
/// Unreadable entries are collected in `rejected` so that one bad entry does
/// not hide the rest.
pub fn parse_package_declarations(package: &str, value: &Value) -> PackageDeclarations {
    let mut out = PackageDeclarations::default();

    match value {
        Value::Array(entries) => {
            for entry in entries {
                match serde_json::from_value::<PatchDeclaration>(entry.clone()) {
                    Ok(declaration) if entry.is_object() => out.declarations.push(declaration),
                    Ok(_) => out.rejected.push(invalid(package, "declaration must be an object")),
                    Err(e) => out.rejected.push(invalid(package, &e.to_string())),
                }
            }
        }
        Value::Object(map) => {
            for (description, url) in map {
                match url.as_str() {
                    Some(url) => out
                        .declarations
                        .push(PatchDeclaration::new(description.clone(), url)),
                    None => out.rejected.push(invalid(package, MISSING_FIELDS)),
                }
            }
        }
        _ => out
            .rejected
            .push(invalid(package, "patches must be a list or a description to URL map")),
    }

    out
}

fn invalid(package: &str, reason: &str) -> PatchError {
    PatchError::InvalidPatchDeclaration {
        package: package.to_string(),
        reason: reason.to_string(),
    }
}
