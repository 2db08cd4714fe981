//! Applying a package's patches in order.

use std::path::Path;

use tracing::{debug, info, warn};

use super::applier::{default_appliers, PatchApplier};
use super::events::{PatchEvent, PatchEventListener};
use super::report::{FailedPatch, PackageReport, PackageSkip, SkippedPatch};
use crate::config::PatchesConfig;
use crate::error::{PatchError, PatchResult};
use crate::fetch::PatchFetcher;
use crate::installed::InstalledRepository;
use crate::patch::{Patch, PatchCollection, PatchRecord};

/// Fetches, verifies and applies patches, then records the outcome.
///
/// For each patch the strip level is either the declared one, tried alone,
/// or each level of the probe order in turn. At every level each available
/// applier is dry-run first; the first one that accepts applies the patch
/// and the level is pinned.
pub struct ApplyEngine {
    config: PatchesConfig,
    fetcher: PatchFetcher,
    appliers: Vec<Box<dyn PatchApplier>>,
    listeners: Vec<Box<dyn PatchEventListener>>,
}

impl ApplyEngine {
    /// Create an engine using whichever of `patch` and `git` are installed.
    pub fn new(config: PatchesConfig, fetcher: PatchFetcher) -> Self {
        Self {
            config,
            fetcher,
            appliers: Vec::new(),
            listeners: Vec::new(),
        }
        .with_appliers(default_appliers())
    }

    /// Replace the appliers. Unavailable ones are dropped.
    pub fn with_appliers(mut self, appliers: Vec<Box<dyn PatchApplier>>) -> Self {
        self.appliers = appliers
            .into_iter()
            .filter(|applier| {
                let available = applier.is_available();
                if !available {
                    debug!(applier = applier.name(), "Patch applier not available");
                }
                available
            })
            .collect();
        self
    }

    pub fn add_listener(&mut self, listener: Box<dyn PatchEventListener>) {
        self.listeners.push(listener);
    }

    pub fn config(&self) -> &PatchesConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &PatchFetcher {
        &self.fetcher
    }

    /// Whether `recorded` already lists exactly the patches
    /// [`ApplyEngine::apply_all`] would apply to `package`, in order.
    ///
    /// Used when replaying installs over a tree that may already be patched.
    /// Packages the engine would skip outright are never up to date, so
    /// `apply_all` still reports why they were skipped.
    pub fn is_up_to_date(
        &self,
        package: &str,
        collection: &PatchCollection,
        recorded: &[PatchRecord],
    ) -> bool {
        if !self.config.patching_enabled || self.config.is_ignored(package) {
            return false;
        }

        let wanted: Vec<&Patch> = collection
            .patches_for_package(package)
            .into_iter()
            .filter(|patch| self.config.dependency_patching_enabled || patch.is_root())
            .collect();

        !wanted.is_empty()
            && wanted.len() == recorded.len()
            && wanted
                .iter()
                .zip(recorded)
                .all(|(patch, record)| patch.matches_record(record))
    }

    /// Apply every patch targeting `package` to the tree at `install_path`.
    ///
    /// Patches go in collection order. With `stop-on-patch-failure` on, the
    /// first failure ends the package with [`PatchError::Aborted`] and later
    /// patches are not attempted; otherwise failures are collected into the
    /// report. Either way the patches that did apply are recorded.
    pub fn apply_all(
        &self,
        package: &str,
        install_path: &Path,
        collection: &mut PatchCollection,
        repository: &mut dyn InstalledRepository,
    ) -> PatchResult<PackageReport> {
        if !self.config.patching_enabled {
            debug!(package, "Patching disabled, skipping package");
            return Ok(PackageReport::skipped_package(
                package,
                PackageSkip::PatchingDisabled,
            ));
        }

        if self.config.is_ignored(package) {
            info!(package, "Package is ignored, skipping patches");
            return Ok(PackageReport::skipped_package(package, PackageSkip::Ignored));
        }

        let patches = collection.patches_for_package_mut(package);
        if patches.is_empty() {
            debug!(package, "No patches found");
            return Ok(PackageReport::skipped_package(package, PackageSkip::NoPatches));
        }

        info!(package, count = patches.len(), "Applying patches");
        let mut report = PackageReport::new(package);

        for patch in patches {
            if !self.config.dependency_patching_enabled && !patch.is_root() {
                info!(
                    package,
                    url = %patch.source(),
                    "Dependency patching disabled, skipping patch"
                );
                report.skipped.push(SkippedPatch {
                    description: patch.description().to_string(),
                    source: patch.source().to_string(),
                    reason: "dependency patching is disabled".to_string(),
                });
                continue;
            }

            self.emit(&PatchEvent::pre_apply(patch));

            match self.apply_one(patch, install_path) {
                Ok(()) => {
                    info!(
                        package,
                        description = %patch.description(),
                        url = %patch.source(),
                        level = ?patch.strip_level().explicit(),
                        "Patch applied"
                    );
                    self.emit(&PatchEvent::post_apply(patch));
                    report.applied.push(patch.to_record());
                }
                Err(error) => {
                    let message = error.to_string();
                    self.emit(&PatchEvent::apply_failed(patch, &message));

                    if error.is_fatal() || self.config.stop_on_patch_failure {
                        if let Err(record_error) =
                            repository.record_patches(package, report.applied.clone())
                        {
                            warn!(package, error = %record_error, "Could not record applied patches");
                        }
                        if error.is_fatal() {
                            return Err(error);
                        }
                        return Err(PatchError::Aborted {
                            package: package.to_string(),
                            description: patch.description().to_string(),
                            cause: Box::new(error),
                        });
                    }

                    warn!(
                        package,
                        description = %patch.description(),
                        url = %patch.source(),
                        error = %message,
                        "Patch failed, continuing"
                    );
                    report.failed.push(FailedPatch {
                        description: patch.description().to_string(),
                        source: patch.source().to_string(),
                        error,
                    });
                }
            }
        }

        repository.record_patches(package, report.applied.clone())?;
        Ok(report)
    }

    fn apply_one(&self, patch: &mut Patch, install_path: &Path) -> PatchResult<()> {
        self.fetcher.materialize(patch)?;

        let local = patch
            .local_path()
            .map(Path::to_path_buf)
            .ok_or_else(|| PatchError::LogicViolation("verified patch has no local path".to_string()))?;

        if !install_path.is_dir() {
            return Err(apply_failure(
                patch,
                format!("install path {} does not exist", install_path.display()),
            ));
        }

        if self.appliers.is_empty() {
            return Err(apply_failure(patch, "no patch tool is available".to_string()));
        }

        let levels = patch.strip_level().candidates();
        for &level in &levels {
            for applier in &self.appliers {
                if !applier.check(&local, level, install_path) {
                    continue;
                }

                debug!(
                    url = %patch.source(),
                    applier = applier.name(),
                    level,
                    "Dry run accepted"
                );
                applier
                    .apply(&local, level, install_path)
                    .map_err(|reason| apply_failure(patch, reason))?;

                patch.pin_strip_level(level);
                return patch.mark_applied();
            }
        }

        let tried: Vec<String> = levels.iter().map(|l| format!("-p{}", l)).collect();
        Err(apply_failure(
            patch,
            format!("no applier accepted the patch at {}", tried.join(", ")),
        ))
    }

    fn emit(&self, event: &PatchEvent<'_>) {
        for listener in &self.listeners {
            listener.on_event(event);
        }
    }
}

fn apply_failure(patch: &Patch, reason: String) -> PatchError {
    PatchError::ApplyFailure {
        package: patch.package().to_string(),
        source_url: patch.source().to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::PatchEventKind;
    use crate::fetch::{sha1_hex, PatchDownloader};
    use crate::patch::{PatchRecord, StripLevel, PROVENANCE_DEPENDENCY, PROVENANCE_ROOT};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::fs;
    use std::path::PathBuf;
    use std::rc::Rc;
    use tempfile::TempDir;

    const PACKAGE: &str = "vendor/pkg";

    struct Offline;

    impl PatchDownloader for Offline {
        fn download(&self, url: &str) -> PatchResult<Vec<u8>> {
            Err(PatchError::download(url, format!("Could not download patch from {}", url)))
        }
    }

    type Calls = Rc<RefCell<Vec<(String, u32)>>>;

    /// Accepts a patch at the listed levels, logging every real application.
    struct ScriptedApplier {
        accepts: Vec<u32>,
        available: bool,
        applied: Calls,
    }

    impl PatchApplier for ScriptedApplier {
        fn name(&self) -> &str {
            "scripted"
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn check(&self, _patch_file: &Path, level: u32, _target_dir: &Path) -> bool {
            self.accepts.contains(&level)
        }

        fn apply(&self, patch_file: &Path, level: u32, _target_dir: &Path) -> Result<(), String> {
            let name = patch_file.file_name().unwrap().to_string_lossy().into_owned();
            self.applied.borrow_mut().push((name, level));
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemoryRepository {
        records: HashMap<String, Vec<PatchRecord>>,
    }

    impl InstalledRepository for MemoryRepository {
        fn record_patches(&mut self, package: &str, records: Vec<PatchRecord>) -> PatchResult<()> {
            self.records.insert(package.to_string(), records);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingListener {
        events: Rc<RefCell<Vec<(PatchEventKind, String)>>>,
    }

    impl PatchEventListener for RecordingListener {
        fn on_event(&self, event: &PatchEvent<'_>) {
            self.events
                .borrow_mut()
                .push((event.kind, event.patch.description().to_string()));
        }
    }

    struct Fixture {
        temp: TempDir,
        install: PathBuf,
        applied: Calls,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let install = temp.path().join("install");
            fs::create_dir(&install).unwrap();
            Self {
                temp,
                install,
                applied: Calls::default(),
            }
        }

        fn patch_file(&self, name: &str) -> String {
            let path = self.temp.path().join(name);
            fs::write(&path, format!("content of {}", name)).unwrap();
            path.to_string_lossy().into_owned()
        }

        fn patch(&self, name: &str, provenance: &str, hash: Option<&str>, level: StripLevel) -> Patch {
            let source = self.patch_file(name);
            Patch::new(PACKAGE, name, source, provenance, hash, level).unwrap()
        }

        fn engine(&self, config: PatchesConfig, accepts: Vec<u32>) -> ApplyEngine {
            let fetcher = PatchFetcher::new_in(Box::new(Offline), self.temp.path()).unwrap();
            ApplyEngine::new(config, fetcher).with_appliers(vec![Box::new(ScriptedApplier {
                accepts,
                available: true,
                applied: Rc::clone(&self.applied),
            })])
        }

        fn applied(&self) -> Vec<(String, u32)> {
            self.applied.borrow().clone()
        }
    }

    fn collection(patches: Vec<Patch>) -> PatchCollection {
        let mut collection = PatchCollection::new();
        for patch in patches {
            collection.add(patch);
        }
        collection
    }

    #[test]
    fn test_probes_levels_in_order_and_pins() {
        let fx = Fixture::new();
        let engine = fx.engine(PatchesConfig::default(), vec![2]);
        let mut patches = collection(vec![fx.patch("a.patch", PROVENANCE_ROOT, None, StripLevel::Auto)]);
        let mut repo = MemoryRepository::default();

        let report = engine
            .apply_all(PACKAGE, &fx.install, &mut patches, &mut repo)
            .unwrap();

        assert_eq!(fx.applied(), vec![("a.patch".to_string(), 2)]);
        assert_eq!(report.applied.len(), 1);
        assert_eq!(report.applied[0].patch_level, Some(2));
        assert_eq!(
            report.applied[0].hash.as_deref(),
            Some(sha1_hex(b"content of a.patch").as_str())
        );
        assert_eq!(repo.records[PACKAGE], report.applied);

        let patch = patches.patches_for_package(PACKAGE)[0];
        assert_eq!(patch.strip_level(), StripLevel::Explicit(2));
    }

    #[test]
    fn test_explicit_level_is_not_probed() {
        let fx = Fixture::new();
        let engine = fx.engine(
            PatchesConfig::default().with_stop_on_patch_failure(false),
            vec![1],
        );
        let mut patches = collection(vec![fx.patch(
            "a.patch",
            PROVENANCE_ROOT,
            None,
            StripLevel::Explicit(0),
        )]);
        let mut repo = MemoryRepository::default();

        let report = engine
            .apply_all(PACKAGE, &fx.install, &mut patches, &mut repo)
            .unwrap();

        assert!(fx.applied().is_empty());
        assert!(report.has_failures());
        let message = report.failed[0].error.to_string();
        assert!(message.contains("-p0"), "{}", message);
        assert!(!message.contains("-p1"), "{}", message);
    }

    #[test]
    fn test_stop_on_failure_aborts_remaining_patches() {
        let fx = Fixture::new();
        let engine = fx.engine(PatchesConfig::default(), vec![1]);
        let mut patches = collection(vec![
            fx.patch("first.patch", PROVENANCE_ROOT, None, StripLevel::Auto),
            fx.patch(
                "second.patch",
                PROVENANCE_ROOT,
                Some("d0f5d393fbbcb0a6836b5b89808cda16fe442cc4"),
                StripLevel::Auto,
            ),
            fx.patch("third.patch", PROVENANCE_ROOT, None, StripLevel::Auto),
        ]);
        let mut repo = MemoryRepository::default();

        let err = engine
            .apply_all(PACKAGE, &fx.install, &mut patches, &mut repo)
            .unwrap_err();

        assert!(matches!(
            err,
            PatchError::Aborted { ref description, .. } if description == "second.patch"
        ));
        assert!(err.to_string().contains("SHA-1 mismatch"));
        assert_eq!(fx.applied(), vec![("first.patch".to_string(), 1)]);
        assert_eq!(repo.records[PACKAGE].len(), 1);

        let third = patches.patches_for_package(PACKAGE)[2];
        assert!(third.local_path().is_some());
        assert!(!third.is_verified());
    }

    #[test]
    fn test_continue_on_failure_collects_errors() {
        let fx = Fixture::new();
        let engine = fx.engine(
            PatchesConfig::default().with_stop_on_patch_failure(false),
            vec![1],
        );
        let mut patches = collection(vec![
            fx.patch("first.patch", PROVENANCE_ROOT, None, StripLevel::Auto),
            fx.patch(
                "second.patch",
                PROVENANCE_ROOT,
                Some("d0f5d393fbbcb0a6836b5b89808cda16fe442cc4"),
                StripLevel::Auto,
            ),
            fx.patch("third.patch", PROVENANCE_ROOT, None, StripLevel::Auto),
        ]);
        let mut repo = MemoryRepository::default();

        let report = engine
            .apply_all(PACKAGE, &fx.install, &mut patches, &mut repo)
            .unwrap();

        assert_eq!(report.applied.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].description, "second.patch");
        assert!(report.failed[0].error.is_recoverable());
        assert_eq!(
            fx.applied(),
            vec![("first.patch".to_string(), 1), ("third.patch".to_string(), 1)]
        );
    }

    #[test]
    fn test_dependency_patches_skipped_when_disabled() {
        let fx = Fixture::new();
        let engine = fx.engine(
            PatchesConfig::default().with_dependency_patching_enabled(false),
            vec![1],
        );
        let mut patches = collection(vec![
            fx.patch("dep.patch", PROVENANCE_DEPENDENCY, None, StripLevel::Auto),
            fx.patch("root.patch", PROVENANCE_ROOT, None, StripLevel::Auto),
        ]);
        let mut repo = MemoryRepository::default();

        let report = engine
            .apply_all(PACKAGE, &fx.install, &mut patches, &mut repo)
            .unwrap();

        assert_eq!(fx.applied(), vec![("root.patch".to_string(), 1)]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].description, "dep.patch");
    }

    #[test]
    fn test_disabled_and_ignored_packages_untouched() {
        let fx = Fixture::new();
        let mut patches = collection(vec![fx.patch("a.patch", PROVENANCE_ROOT, None, StripLevel::Auto)]);
        let mut repo = MemoryRepository::default();

        let disabled = fx.engine(PatchesConfig::default().with_patching_enabled(false), vec![1]);
        let report = disabled
            .apply_all(PACKAGE, &fx.install, &mut patches, &mut repo)
            .unwrap();
        assert_eq!(report.skip, Some(PackageSkip::PatchingDisabled));

        let ignoring = fx.engine(
            PatchesConfig::default().with_ignore_packages(vec![PACKAGE.to_string()]),
            vec![1],
        );
        let report = ignoring
            .apply_all(PACKAGE, &fx.install, &mut patches, &mut repo)
            .unwrap();
        assert_eq!(report.skip, Some(PackageSkip::Ignored));

        assert!(fx.applied().is_empty());
        assert!(repo.records.is_empty());
    }

    #[test]
    fn test_package_without_patches() {
        let fx = Fixture::new();
        let engine = fx.engine(PatchesConfig::default(), vec![1]);
        let mut patches = PatchCollection::new();
        let mut repo = MemoryRepository::default();

        let report = engine
            .apply_all("vendor/other", &fx.install, &mut patches, &mut repo)
            .unwrap();
        assert_eq!(report.skip, Some(PackageSkip::NoPatches));
    }

    #[test]
    fn test_no_available_applier() {
        let fx = Fixture::new();
        let fetcher = PatchFetcher::new_in(Box::new(Offline), fx.temp.path()).unwrap();
        let engine = ApplyEngine::new(PatchesConfig::default(), fetcher).with_appliers(vec![
            Box::new(ScriptedApplier {
                accepts: vec![1],
                available: false,
                applied: Rc::clone(&fx.applied),
            }),
        ]);
        let mut patches = collection(vec![fx.patch("a.patch", PROVENANCE_ROOT, None, StripLevel::Auto)]);
        let mut repo = MemoryRepository::default();

        let err = engine
            .apply_all(PACKAGE, &fx.install, &mut patches, &mut repo)
            .unwrap_err();
        assert!(err.to_string().contains("no patch tool is available"));
    }

    #[test]
    fn test_events_bracket_each_patch() {
        let fx = Fixture::new();
        let mut engine = fx.engine(
            PatchesConfig::default().with_stop_on_patch_failure(false),
            vec![1],
        );
        let listener = RecordingListener::default();
        let events = Rc::clone(&listener.events);
        engine.add_listener(Box::new(listener));

        let mut patches = collection(vec![
            fx.patch("good.patch", PROVENANCE_ROOT, None, StripLevel::Auto),
            fx.patch("bad.patch", PROVENANCE_ROOT, None, StripLevel::Explicit(3)),
        ]);
        let mut repo = MemoryRepository::default();
        engine
            .apply_all(PACKAGE, &fx.install, &mut patches, &mut repo)
            .unwrap();

        let kinds: Vec<_> = events.borrow().iter().map(|(k, d)| (*k, d.clone())).collect();
        assert_eq!(
            kinds,
            vec![
                (PatchEventKind::PreApply, "good.patch".to_string()),
                (PatchEventKind::PostApply, "good.patch".to_string()),
                (PatchEventKind::PreApply, "bad.patch".to_string()),
                (PatchEventKind::ApplyFailed, "bad.patch".to_string()),
            ]
        );
    }

    #[test]
    fn test_recorded_patches_are_up_to_date() {
        let fx = Fixture::new();
        let engine = fx.engine(PatchesConfig::default(), vec![1]);
        let fresh = || {
            collection(vec![
                fx.patch("a.patch", PROVENANCE_ROOT, None, StripLevel::Auto),
                fx.patch("b.patch", PROVENANCE_ROOT, None, StripLevel::Explicit(1)),
            ])
        };
        let mut repo = MemoryRepository::default();

        assert!(!engine.is_up_to_date(PACKAGE, &fresh(), &[]));

        engine
            .apply_all(PACKAGE, &fx.install, &mut fresh(), &mut repo)
            .unwrap();
        let recorded = repo.records[PACKAGE].clone();
        assert!(engine.is_up_to_date(PACKAGE, &fresh(), &recorded));

        let extra = collection(vec![
            fx.patch("a.patch", PROVENANCE_ROOT, None, StripLevel::Auto),
            fx.patch("b.patch", PROVENANCE_ROOT, None, StripLevel::Explicit(1)),
            fx.patch("c.patch", PROVENANCE_ROOT, None, StripLevel::Auto),
        ]);
        assert!(!engine.is_up_to_date(PACKAGE, &extra, &recorded));

        let ignoring = fx.engine(
            PatchesConfig::default().with_ignore_packages(vec![PACKAGE.to_string()]),
            vec![1],
        );
        assert!(!ignoring.is_up_to_date(PACKAGE, &fresh(), &recorded));
    }

    #[test]
    fn test_up_to_date_ignores_gated_dependency_patches() {
        let fx = Fixture::new();
        let engine = fx.engine(
            PatchesConfig::default().with_dependency_patching_enabled(false),
            vec![1],
        );
        let mut patches = collection(vec![
            fx.patch("root.patch", PROVENANCE_ROOT, None, StripLevel::Auto),
            fx.patch("dep.patch", PROVENANCE_DEPENDENCY, None, StripLevel::Auto),
        ]);
        let mut repo = MemoryRepository::default();

        engine
            .apply_all(PACKAGE, &fx.install, &mut patches, &mut repo)
            .unwrap();
        assert_eq!(repo.records[PACKAGE].len(), 1);
        assert!(engine.is_up_to_date(PACKAGE, &patches, &repo.records[PACKAGE]));
    }
}
