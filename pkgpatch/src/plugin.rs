//! Per-run owner of the patching pipeline.
//!
//! The host calls [`PatchPlugin::on_pre_package`] before installing or
//! updating a package and [`PatchPlugin::on_post_package`] once the package
//! is on disk. Resolution happens once, on the first of either call.

use std::path::Path;

use serde_json::Value;
use tracing::info;

use crate::apply::{ApplyEngine, PackageReport, PatchEventListener, RunSummary};
use crate::config::{EnvSource, PatchesConfig};
use crate::error::PatchResult;
use crate::fetch::{HttpDownloader, PatchFetcher};
use crate::installed::{InstalledPackage, InstalledRepository};
use crate::patch::PatchCollection;
use crate::resolver::{
    DependencyResolverProvider, PatchListFileResolver, ResolutionCoordinator, ResolutionReport,
    ResolverProvider, RootConfigResolver,
};

/// Owns everything one run needs: the coordinator and its latch, the patch
/// collection, the apply engine and the installed-state record.
pub struct PatchPlugin {
    coordinator: ResolutionCoordinator,
    collection: PatchCollection,
    engine: ApplyEngine,
    repository: Box<dyn InstalledRepository>,
    summary: RunSummary,
}

impl PatchPlugin {
    pub fn new(
        coordinator: ResolutionCoordinator,
        engine: ApplyEngine,
        repository: Box<dyn InstalledRepository>,
    ) -> Self {
        let collection = PatchCollection::with_policy(engine.config().duplicate_policy());
        Self {
            coordinator,
            collection,
            engine,
            repository,
            summary: RunSummary::default(),
        }
    }

    /// Wire the standard pipeline from the root configuration block.
    ///
    /// `base_dir` anchors a relative `patches-file` and relative patch paths
    /// declared by the root project. `installed` feeds the
    /// dependency resolver. Patches are downloaded over HTTP(S) and applied
    /// with whichever of `patch` and `git` are installed.
    pub fn from_root_config(
        root: &Value,
        base_dir: &Path,
        installed: Vec<InstalledPackage>,
        repository: Box<dyn InstalledRepository>,
        env: &dyn EnvSource,
    ) -> PatchResult<Self> {
        let config = PatchesConfig::from_root_config(root, env)?;

        let coordinator = ResolutionCoordinator::new(
            RootConfigResolver::from_root_config(root).with_base_dir(base_dir),
            PatchListFileResolver::from_root_config(root, base_dir),
        )
        .with_provider(Box::new(DependencyResolverProvider::new(installed)));

        let fetcher = PatchFetcher::new(Box::new(HttpDownloader::new()?))?;
        let engine = ApplyEngine::new(config, fetcher);

        Ok(Self::new(coordinator, engine, repository))
    }

    pub fn add_provider(&mut self, provider: Box<dyn ResolverProvider>) {
        self.coordinator.add_provider(provider);
    }

    pub fn add_listener(&mut self, listener: Box<dyn PatchEventListener>) {
        self.engine.add_listener(listener);
    }

    pub fn config(&self) -> &PatchesConfig {
        self.engine.config()
    }

    pub fn collection(&self) -> &PatchCollection {
        &self.collection
    }

    /// Pre-install / pre-update hook. Resolves on the first call only.
    pub fn on_pre_package(&mut self) -> PatchResult<&ResolutionReport> {
        self.coordinator.resolve(&mut self.collection)
    }

    /// Post-install / post-update hook for one package.
    ///
    /// # Arguments
    ///
    /// * `package` - Name of the package that was just installed or updated
    /// * `install_path` - Directory holding its files
    ///
    /// # Returns
    ///
    /// The package's report, also kept for [`PatchPlugin::finish`].
    ///
    /// # Errors
    ///
    /// Fatal errors, and [`Aborted`](crate::PatchError::Aborted) when
    /// `stop-on-patch-failure` ends the package early.
    pub fn on_post_package(&mut self, package: &str, install_path: &Path) -> PatchResult<&PackageReport> {
        self.on_pre_package()?;

        let report = self.engine.apply_all(
            package,
            install_path,
            &mut self.collection,
            self.repository.as_mut(),
        )?;
        self.summary.push(report);

        let index = self.summary.reports.len() - 1;
        Ok(&self.summary.reports[index])
    }

    /// Whether `package`'s installed record already lists every patch that
    /// would be applied to it. Resolves first if needed.
    ///
    /// A host reinstalls packages before post-install, so this only matters
    /// when replaying over a tree that was patched by an earlier run.
    pub fn is_up_to_date(&mut self, package: &InstalledPackage) -> PatchResult<bool> {
        self.on_pre_package()?;
        Ok(self.engine.is_up_to_date(
            &package.name,
            &self.collection,
            &package.applied_patches(),
        ))
    }

    /// End the run, dropping staged patch files.
    pub fn finish(self) -> RunSummary {
        info!(
            applied = self.summary.applied_count(),
            skipped = self.summary.skipped_count(),
            failed = self.summary.failed_count(),
            "Patching finished"
        );
        self.summary
    }
}
