//! One-shot execution of the resolver chain.

use tracing::{debug, info, warn};

use super::{
    PatchListFileResolver, Resolver, ResolverKind, ResolverProvider, RootConfigResolver,
};
use crate::error::{PatchError, PatchResult};
use crate::patch::PatchCollection;

/// What one resolver contributed during resolution.
#[derive(Debug)]
pub struct ResolverRun {
    pub name: String,
    pub enabled: bool,
    pub added: usize,
    /// Declaration-level problems; the resolver's other patches were kept.
    pub rejected: Vec<PatchError>,
    /// Set when the resolver as a whole failed (e.g. a broken patches file).
    pub failure: Option<PatchError>,
}

/// Summary of the resolution pass.
#[derive(Debug, Default)]
pub struct ResolutionReport {
    pub runs: Vec<ResolverRun>,
}

impl ResolutionReport {
    pub fn total_added(&self) -> usize {
        self.runs.iter().map(|r| r.added).sum()
    }

    /// Whether any resolver failed or rejected a declaration.
    pub fn has_problems(&self) -> bool {
        self.runs
            .iter()
            .any(|r| r.failure.is_some() || !r.rejected.is_empty())
    }
}

/// Runs the resolver chain exactly once.
///
/// Order is fixed: root configuration, patches file, then the resolvers of
/// each provider in registration order.
pub struct ResolutionCoordinator {
    builtin: Vec<ResolverKind>,
    providers: Vec<Box<dyn ResolverProvider>>,
    already_resolved: bool,
    report: ResolutionReport,
}

impl ResolutionCoordinator {
    pub fn new(root: RootConfigResolver, patches_file: PatchListFileResolver) -> Self {
        Self {
            builtin: vec![
                ResolverKind::RootConfig(root),
                ResolverKind::PatchListFile(patches_file),
            ],
            providers: Vec::new(),
            already_resolved: false,
            report: ResolutionReport::default(),
        }
    }

    /// Register a provider of external resolvers.
    pub fn with_provider(mut self, provider: Box<dyn ResolverProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn add_provider(&mut self, provider: Box<dyn ResolverProvider>) {
        self.providers.push(provider);
    }

    pub fn is_resolved(&self) -> bool {
        self.already_resolved
    }

    pub fn report(&self) -> &ResolutionReport {
        &self.report
    }

    /// Resolve all patches into `collection`.
    ///
    /// Later calls return the first report without touching `collection`.
    /// A provider failure aborts before any resolver runs; a resolver failure
    /// is recorded and the chain continues.
    pub fn resolve(&mut self, collection: &mut PatchCollection) -> PatchResult<&ResolutionReport> {
        if self.already_resolved {
            debug!("Patches already resolved, skipping");
            return Ok(&self.report);
        }

        let external = self.external_resolvers()?;
        let mut report = ResolutionReport::default();

        for resolver in self.builtin.iter().chain(external.iter()) {
            report.runs.push(run_resolver(resolver, collection));
        }

        info!(
            patches = report.total_added(),
            resolvers = report.runs.len(),
            "Patch resolution complete"
        );

        self.report = report;
        self.already_resolved = true;
        Ok(&self.report)
    }

    fn external_resolvers(&self) -> PatchResult<Vec<ResolverKind>> {
        let mut resolvers = Vec::new();

        for provider in &self.providers {
            let provided = provider.resolvers().map_err(|e| {
                PatchError::InvalidConfiguration(format!(
                    "resolver provider {} failed to return resolvers: {}",
                    provider.name(),
                    e
                ))
            })?;

            if provided.iter().any(|r| r.name().trim().is_empty()) {
                return Err(PatchError::InvalidConfiguration(format!(
                    "resolver provider {} returned an invalid resolver",
                    provider.name()
                )));
            }

            resolvers.extend(provided.into_iter().map(ResolverKind::External));
        }

        Ok(resolvers)
    }
}

fn run_resolver(resolver: &dyn Resolver, collection: &mut PatchCollection) -> ResolverRun {
    let name = resolver.name().to_string();

    if !resolver.is_enabled() {
        debug!(resolver = %name, "Resolver disabled");
        return ResolverRun {
            name,
            enabled: false,
            added: 0,
            rejected: Vec::new(),
            failure: None,
        };
    }

    info!(resolver = %name, "{}", resolver.describe());

    match resolver.resolve(collection) {
        Ok(outcome) => ResolverRun {
            name,
            enabled: true,
            added: outcome.added,
            rejected: outcome.rejected,
            failure: None,
        },
        Err(e) => {
            warn!(resolver = %name, error = %e, "Resolver failed");
            ResolverRun {
                name,
                enabled: true,
                added: 0,
                rejected: Vec::new(),
                failure: Some(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::{Patch, StripLevel};
    use crate::resolver::ResolveOutcome;
    use serde_json::json;
    use std::cell::Cell;
    use std::path::Path;
    use std::rc::Rc;

    struct CountingResolver {
        name: String,
        calls: Rc<Cell<usize>>,
    }

    impl Resolver for CountingResolver {
        fn name(&self) -> &str {
            &self.name
        }

        fn is_enabled(&self) -> bool {
            true
        }

        fn describe(&self) -> String {
            format!("Gathering patches from {}", self.name)
        }

        fn resolve(&self, collection: &mut PatchCollection) -> PatchResult<ResolveOutcome> {
            self.calls.set(self.calls.get() + 1);
            collection.add(
                Patch::new(
                    "vendor/a",
                    format!("from {}", self.name),
                    "https://example.com/x.patch",
                    "plugin",
                    None,
                    StripLevel::Auto,
                )
                .unwrap(),
            );
            Ok(ResolveOutcome {
                added: 1,
                rejected: Vec::new(),
            })
        }
    }

    struct TestProvider {
        name: &'static str,
        resolvers: Vec<&'static str>,
        calls: Rc<Cell<usize>>,
        fail: bool,
    }

    impl ResolverProvider for TestProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn resolvers(&self) -> PatchResult<Vec<Box<dyn Resolver>>> {
            if self.fail {
                return Err(PatchError::InvalidConfiguration("boom".to_string()));
            }
            Ok(self
                .resolvers
                .iter()
                .map(|name| {
                    Box::new(CountingResolver {
                        name: name.to_string(),
                        calls: self.calls.clone(),
                    }) as Box<dyn Resolver>
                })
                .collect())
        }
    }

    fn root_only() -> ResolutionCoordinator {
        let root = json!({"patches": {"vendor/a": [
            {"description": "root fix", "url": "https://example.com/root.patch"}
        ]}});
        ResolutionCoordinator::new(
            RootConfigResolver::from_root_config(&root),
            PatchListFileResolver::from_root_config(&root, Path::new(".")),
        )
    }

    #[test]
    fn test_resolves_once() {
        let calls = Rc::new(Cell::new(0));
        let mut coordinator = root_only().with_provider(Box::new(TestProvider {
            name: "test",
            resolvers: vec!["plugin"],
            calls: calls.clone(),
            fail: false,
        }));
        let mut collection = PatchCollection::new();

        coordinator.resolve(&mut collection).unwrap();
        coordinator.resolve(&mut collection).unwrap();

        assert!(coordinator.is_resolved());
        assert_eq!(calls.get(), 1);
        assert_eq!(collection.len(), 2);
    }

    #[test]
    fn test_order_is_root_file_then_external() {
        let calls = Rc::new(Cell::new(0));
        let mut coordinator = root_only()
            .with_provider(Box::new(TestProvider {
                name: "first",
                resolvers: vec!["one", "two"],
                calls: calls.clone(),
                fail: false,
            }))
            .with_provider(Box::new(TestProvider {
                name: "second",
                resolvers: vec!["three"],
                calls: calls.clone(),
                fail: false,
            }));
        let mut collection = PatchCollection::new();

        let report = coordinator.resolve(&mut collection).unwrap();
        let names: Vec<_> = report.runs.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["root-config", "patches-file", "one", "two", "three"]
        );

        let descriptions: Vec<_> = collection.iter().map(|p| p.description()).collect();
        assert_eq!(
            descriptions,
            vec!["root fix", "from one", "from two", "from three"]
        );
    }

    #[test]
    fn test_provider_failure_is_configuration_error() {
        let mut coordinator = root_only().with_provider(Box::new(TestProvider {
            name: "broken-plugin",
            resolvers: vec![],
            calls: Rc::new(Cell::new(0)),
            fail: true,
        }));
        let mut collection = PatchCollection::new();

        let err = coordinator.resolve(&mut collection).unwrap_err();
        assert!(matches!(err, PatchError::InvalidConfiguration(ref msg) if msg.contains("broken-plugin")));
        assert!(collection.is_empty());
        assert!(!coordinator.is_resolved());
    }

    #[test]
    fn test_unnamed_resolver_rejected() {
        let mut coordinator = root_only().with_provider(Box::new(TestProvider {
            name: "sloppy-plugin",
            resolvers: vec![""],
            calls: Rc::new(Cell::new(0)),
            fail: false,
        }));
        let mut collection = PatchCollection::new();

        let err = coordinator.resolve(&mut collection).unwrap_err();
        assert!(err.to_string().contains("sloppy-plugin"));
    }

    #[test]
    fn test_broken_patches_file_does_not_stop_other_resolvers() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("patches.json"), "{ nope").unwrap();
        let root = json!({
            "patches": {"vendor/a": [{"description": "root fix", "url": "https://example.com/r.patch"}]},
            "patches-file": "patches.json"
        });
        let calls = Rc::new(Cell::new(0));
        let mut coordinator = ResolutionCoordinator::new(
            RootConfigResolver::from_root_config(&root),
            PatchListFileResolver::from_root_config(&root, temp.path()),
        )
        .with_provider(Box::new(TestProvider {
            name: "test",
            resolvers: vec!["plugin"],
            calls: calls.clone(),
            fail: false,
        }));
        let mut collection = PatchCollection::new();

        let report = coordinator.resolve(&mut collection).unwrap();

        assert!(report.has_problems());
        assert!(matches!(
            report.runs[1].failure,
            Some(PatchError::InvalidPatchListFile { .. })
        ));
        assert_eq!(calls.get(), 1);
        assert_eq!(collection.len(), 2);
    }
}
