//! Ordered collection of resolved patches.

use tracing::debug;

use super::core::{Patch, PROVENANCE_DEPENDENCY, PROVENANCE_ROOT};

/// How the collection treats a patch identical to one already present.
///
/// Identity is (target package, source, description).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Keep every entry; the same patch may be applied twice.
    #[default]
    Keep,
    /// Drop later duplicates.
    Skip,
}

/// Selects patches by provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvenanceFilter {
    All,
    Only(String),
}

impl ProvenanceFilter {
    pub fn root() -> Self {
        Self::Only(PROVENANCE_ROOT.to_string())
    }

    pub fn dependency() -> Self {
        Self::Only(PROVENANCE_DEPENDENCY.to_string())
    }

    fn matches(&self, patch: &Patch) -> bool {
        match self {
            Self::All => true,
            Self::Only(provenance) => patch.provenance() == provenance,
        }
    }
}

impl From<&str> for ProvenanceFilter {
    fn from(value: &str) -> Self {
        if value == "all" {
            Self::All
        } else {
            Self::Only(value.to_string())
        }
    }
}

/// Append-only, insertion-ordered list of patches.
///
/// Order is application order: resolvers run root sources first, so root
/// patches precede dependency patches for the same package.
#[derive(Debug, Clone, Default)]
pub struct PatchCollection {
    patches: Vec<Patch>,
    policy: DuplicatePolicy,
}

impl PatchCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: DuplicatePolicy) -> Self {
        Self {
            patches: Vec::new(),
            policy,
        }
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Append a patch. Returns `false` if the duplicate policy dropped it.
    pub fn add(&mut self, patch: Patch) -> bool {
        if self.policy == DuplicatePolicy::Skip
            && self.patches.iter().any(|p| p.same_declaration(&patch))
        {
            debug!(
                package = %patch.package(),
                url = %patch.source(),
                "Skipping duplicate patch declaration"
            );
            return false;
        }
        self.patches.push(patch);
        true
    }

    /// Patches matching `filter`, in insertion order.
    pub fn patches(&self, filter: impl Into<ProvenanceFilter>) -> Vec<&Patch> {
        let filter = filter.into();
        self.patches.iter().filter(|p| filter.matches(p)).collect()
    }

    /// Patches targeting `package`, in insertion order.
    pub fn patches_for_package(&self, package: &str) -> Vec<&Patch> {
        self.patches
            .iter()
            .filter(|p| p.package() == package)
            .collect()
    }

    pub(crate) fn patches_for_package_mut(&mut self, package: &str) -> Vec<&mut Patch> {
        self.patches
            .iter_mut()
            .filter(|p| p.package() == package)
            .collect()
    }

    /// Distinct target package names, in order of first appearance.
    pub fn packages(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for patch in &self.patches {
            if !names.contains(&patch.package()) {
                names.push(patch.package());
            }
        }
        names
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Patch> {
        self.patches.iter()
    }
}
