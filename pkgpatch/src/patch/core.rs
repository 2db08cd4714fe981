//! The patch entity.

use std::path::{Path, PathBuf};

use super::declaration::{DeclaredLevel, PatchDeclaration, PatchRecord};
use super::hash::PatchHash;
use super::level::StripLevel;
use crate::error::{PatchError, PatchResult};

/// Provenance of patches declared by the root project (config or patches file).
pub const PROVENANCE_ROOT: &str = "root";

/// Provenance of patches declared by an installed dependency.
pub const PROVENANCE_DEPENDENCY: &str = "dependency";

/// Lifecycle of a single patch within one run.
///
/// ```text
/// Declared -> Localized -> Verified -> Applied
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PatchState {
    Declared,
    Localized,
    Verified,
    Applied,
}

/// Where patch content is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchSource<'a> {
    Remote(&'a str),
    Local(PathBuf),
}

impl<'a> PatchSource<'a> {
    pub fn classify(source: &'a str) -> Self {
        if source.starts_with("http://") || source.starts_with("https://") {
            Self::Remote(source)
        } else if let Some(path) = source.strip_prefix("file://") {
            Self::Local(PathBuf::from(path))
        } else {
            Self::Local(PathBuf::from(source))
        }
    }

    /// Resolve a relative local path against `base_dir`.
    pub fn anchored(self, base_dir: Option<&Path>) -> Self {
        match (self, base_dir) {
            (Self::Local(path), Some(dir)) if path.is_relative() => Self::Local(dir.join(path)),
            (source, _) => source,
        }
    }
}

/// A patch targeting one package.
///
/// Identity fields never change after construction. The local path, hash,
/// strip level and verification flag are filled in once by the fetch, verify
/// and apply steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    package: String,
    description: String,
    source: String,
    provenance: String,
    hash: PatchHash,
    strip_level: StripLevel,
    base_dir: Option<PathBuf>,
    local_path: Option<PathBuf>,
    verified: bool,
    applied: bool,
}

impl Patch {
    /// Create a patch, failing fast on a malformed hash.
    ///
    /// If `source` names an existing local file its path is used directly and
    /// no fetch is needed.
    pub fn new(
        package: impl Into<String>,
        description: impl Into<String>,
        source: impl Into<String>,
        provenance: impl Into<String>,
        hash: Option<&str>,
        strip_level: StripLevel,
    ) -> PatchResult<Self> {
        let source = source.into();
        let hash = PatchHash::parse(hash, &source)?;

        let local_path = match PatchSource::classify(&source) {
            PatchSource::Local(path) if path.is_file() => Some(path),
            _ => None,
        };

        Ok(Self {
            package: package.into(),
            description: description.into(),
            source,
            provenance: provenance.into(),
            hash,
            strip_level,
            base_dir: None,
            local_path,
            verified: false,
            applied: false,
        })
    }

    /// Build a patch from a user declaration.
    pub fn from_declaration(
        package: &str,
        declaration: &PatchDeclaration,
        provenance: &str,
    ) -> PatchResult<Self> {
        let (description, url) = declaration.required_fields(package)?;

        let strip_level = match &declaration.patch_level {
            None => StripLevel::Auto,
            Some(DeclaredLevel::Number(level)) => StripLevel::Explicit(*level),
            Some(DeclaredLevel::Text(text)) => {
                text.parse()
                    .map_err(|reason| PatchError::InvalidPatchDeclaration {
                        package: package.to_string(),
                        reason,
                    })?
            }
        };

        Self::new(
            package,
            description,
            url,
            provenance,
            declaration.hash.as_deref(),
            strip_level,
        )
    }

    /// Anchor a relative local source on `dir` instead of the working
    /// directory.
    ///
    /// Called while building the patch, before it is fetched. A source that
    /// names an existing file under `dir` is localized immediately.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        if matches!(PatchSource::classify(&self.source), PatchSource::Local(_)) {
            let local_path = match self.location() {
                PatchSource::Local(path) if path.is_file() => Some(path),
                _ => None,
            };
            self.local_path = local_path;
        }
        self
    }

    /// Where the content is read from, with relative paths anchored.
    pub fn location(&self) -> PatchSource<'_> {
        PatchSource::classify(&self.source).anchored(self.base_dir.as_deref())
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// URL or path the patch content comes from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn provenance(&self) -> &str {
        &self.provenance
    }

    pub fn hash(&self) -> &PatchHash {
        &self.hash
    }

    pub fn strip_level(&self) -> StripLevel {
        self.strip_level
    }

    pub fn local_path(&self) -> Option<&Path> {
        self.local_path.as_deref()
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    pub fn is_root(&self) -> bool {
        self.provenance == PROVENANCE_ROOT
    }

    pub fn state(&self) -> PatchState {
        if self.applied {
            PatchState::Applied
        } else if self.verified {
            PatchState::Verified
        } else if self.local_path.is_some() {
            PatchState::Localized
        } else {
            PatchState::Declared
        }
    }

    /// Whether two patches describe the same change to the same package.
    pub fn same_declaration(&self, other: &Patch) -> bool {
        self.package == other.package
            && self.source == other.source
            && self.description == other.description
    }

    /// Serializable projection written to the installed-state record.
    pub fn to_record(&self) -> PatchRecord {
        PatchRecord {
            description: self.description.clone(),
            url: self.source.clone(),
            patch_level: self.strip_level.explicit(),
            hash: self.hash.as_sha1().map(str::to_string),
        }
    }

    /// Whether `record` shows this patch as already applied.
    ///
    /// Source and description must match. A declared hash or explicit strip
    /// level must match the recorded one; otherwise any pinned value does.
    pub fn matches_record(&self, record: &PatchRecord) -> bool {
        let hash_matches = match self.hash.as_sha1() {
            Some(hash) => record.hash.as_deref() == Some(hash),
            None => record.hash.is_some(),
        };
        let level_matches = match self.strip_level.explicit() {
            Some(level) => record.patch_level == Some(level),
            None => record.patch_level.is_some(),
        };
        record.url == self.source
            && record.description == self.description
            && hash_matches
            && level_matches
    }

    pub(crate) fn set_local_path(&mut self, path: PathBuf) -> PatchResult<()> {
        if let Some(existing) = &self.local_path {
            return Err(PatchError::LogicViolation(format!(
                "patch {} is already localized at {}",
                self.source,
                existing.display()
            )));
        }
        self.local_path = Some(path);
        Ok(())
    }

    pub(crate) fn pin_hash(&mut self, digest: String) {
        if self.hash.is_unchecked() {
            self.hash = PatchHash::Sha1(digest);
        }
    }

    pub(crate) fn mark_verified(&mut self) {
        self.verified = true;
    }

    pub(crate) fn pin_strip_level(&mut self, level: u32) {
        if self.strip_level.is_auto() {
            self.strip_level = StripLevel::Explicit(level);
        }
    }

    pub(crate) fn mark_applied(&mut self) -> PatchResult<()> {
        if !self.verified {
            return Err(PatchError::LogicViolation(format!(
                "cannot mark patch {} applied before it is verified",
                self.source
            )));
        }
        self.applied = true;
        Ok(())
    }
}
