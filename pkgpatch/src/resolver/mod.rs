//! Patch resolvers.
//!
//! A resolver reads patch declarations from one source and appends the
//! resulting [`Patch`](crate::patch::Patch) values to a shared
//! [`PatchCollection`].
//!
//! # Architecture
//!
//! ```text
//! ResolutionCoordinator (runs once per process)
//!         │
//!         ├── ResolverKind::RootConfig     ── "patches" in root config
//!         ├── ResolverKind::PatchListFile  ── JSON file named by "patches-file"
//!         └── ResolverKind::External       ── from each ResolverProvider, in order
//!                 └── DependencyResolver   ── "patches" in installed packages' extra
//! ```

mod coordinator;
mod dependency;
mod patches_file;
mod root;

pub use coordinator::{ResolutionCoordinator, ResolutionReport, ResolverRun};
pub use dependency::{DependencyResolver, DependencyResolverProvider};
pub use patches_file::{PatchListFileResolver, MALFORMED_JSON, NO_PATCHES_FOUND};
pub use root::RootConfigResolver;

use std::path::Path;

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{PatchError, PatchResult};
use crate::patch::{parse_package_declarations, Patch, PatchCollection};

/// Outcome of one resolver run.
#[derive(Debug, Default)]
pub struct ResolveOutcome {
    /// Patches appended to the collection.
    pub added: usize,
    /// Declarations that could not be turned into patches.
    pub rejected: Vec<PatchError>,
}

/// A source of patch declarations.
pub trait Resolver {
    /// Short identifier used in logs and reports.
    fn name(&self) -> &str;

    /// Cheap, side-effect free check that the source is present.
    fn is_enabled(&self) -> bool;

    /// Progress message shown when the resolver runs.
    fn describe(&self) -> String;

    /// Read the source and append its patches to `collection`.
    ///
    /// Only called when [`Resolver::is_enabled`] returned true.
    fn resolve(&self, collection: &mut PatchCollection) -> PatchResult<ResolveOutcome>;
}

/// Supplies additional resolvers, the extension point for other plugins.
pub trait ResolverProvider {
    /// Identifier named in configuration errors.
    fn name(&self) -> &str;

    fn resolvers(&self) -> PatchResult<Vec<Box<dyn Resolver>>>;
}

/// The resolvers the coordinator knows how to run.
pub enum ResolverKind {
    RootConfig(RootConfigResolver),
    PatchListFile(PatchListFileResolver),
    External(Box<dyn Resolver>),
}

impl ResolverKind {
    fn inner(&self) -> &dyn Resolver {
        match self {
            Self::RootConfig(resolver) => resolver as &dyn Resolver,
            Self::PatchListFile(resolver) => resolver as &dyn Resolver,
            Self::External(resolver) => resolver.as_ref(),
        }
    }
}

impl Resolver for ResolverKind {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn is_enabled(&self) -> bool {
        self.inner().is_enabled()
    }

    fn describe(&self) -> String {
        self.inner().describe()
    }

    fn resolve(&self, collection: &mut PatchCollection) -> PatchResult<ResolveOutcome> {
        self.inner().resolve(collection)
    }
}

impl std::fmt::Debug for ResolverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::RootConfig(_) => "RootConfig",
            Self::PatchListFile(_) => "PatchListFile",
            Self::External(_) => "External",
        };
        f.debug_tuple(kind).field(&self.name()).finish()
    }
}

/// Turn a `package -> declarations` map into patches with `provenance`.
///
/// Relative local patch paths are anchored on `base_dir` when one is given.
pub(crate) fn add_declarations(
    packages: &Map<String, Value>,
    provenance: &str,
    base_dir: Option<&Path>,
    collection: &mut PatchCollection,
) -> ResolveOutcome {
    let mut outcome = ResolveOutcome::default();

    for (package, value) in packages {
        let parsed = parse_package_declarations(package, value);
        outcome.rejected.extend(parsed.rejected);

        for declaration in &parsed.declarations {
            match Patch::from_declaration(package, declaration, provenance) {
                Ok(patch) => {
                    let patch = match base_dir {
                        Some(dir) => patch.with_base_dir(dir),
                        None => patch,
                    };
                    if collection.add(patch) {
                        outcome.added += 1;
                    }
                }
                Err(e) => outcome.rejected.push(e),
            }
        }
    }

    for error in &outcome.rejected {
        warn!(provenance, error = %error, "Ignoring invalid patch declaration");
    }

    outcome
}
