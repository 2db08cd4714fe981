//! Patches that installed dependencies declare about themselves or others.

use std::path::PathBuf;

use serde_json::{Map, Value};
use tracing::debug;

use super::{add_declarations, ResolveOutcome, Resolver, ResolverProvider};
use crate::error::PatchResult;
use crate::installed::InstalledPackage;
use crate::patch::{PatchCollection, PROVENANCE_DEPENDENCY};

/// Reads the `extra.patches` map of every installed package.
#[derive(Debug, Clone, Default)]
pub struct DependencyResolver {
    /// (declaring package, its install path, its `patches` map), in install
    /// order. Relative patch paths are taken from the install path.
    declarations: Vec<(String, PathBuf, Map<String, Value>)>,
}

impl DependencyResolver {
    pub fn new(packages: &[InstalledPackage]) -> Self {
        let declarations = packages
            .iter()
            .filter_map(|package| {
                package
                    .extra
                    .get("patches")
                    .and_then(Value::as_object)
                    .filter(|patches| !patches.is_empty())
                    .map(|patches| {
                        (
                            package.name.clone(),
                            package.install_path.clone(),
                            patches.clone(),
                        )
                    })
            })
            .collect();
        Self { declarations }
    }
}

impl Resolver for DependencyResolver {
    fn name(&self) -> &str {
        "dependencies"
    }

    fn is_enabled(&self) -> bool {
        !self.declarations.is_empty()
    }

    fn describe(&self) -> String {
        "Gathering patches from dependencies".to_string()
    }

    fn resolve(&self, collection: &mut PatchCollection) -> PatchResult<ResolveOutcome> {
        let mut total = ResolveOutcome::default();
        for (declaring, install_path, patches) in &self.declarations {
            debug!(package = %declaring, "Reading patches declared by dependency");
            let outcome = add_declarations(
                patches,
                PROVENANCE_DEPENDENCY,
                Some(install_path),
                collection,
            );
            total.added += outcome.added;
            total.rejected.extend(outcome.rejected);
        }
        Ok(total)
    }
}

/// Built-in provider contributing the [`DependencyResolver`].
#[derive(Debug, Clone)]
pub struct DependencyResolverProvider {
    packages: Vec<InstalledPackage>,
}

impl DependencyResolverProvider {
    pub fn new(packages: Vec<InstalledPackage>) -> Self {
        Self { packages }
    }
}

impl ResolverProvider for DependencyResolverProvider {
    fn name(&self) -> &str {
        "core-dependency-provider"
    }

    fn resolvers(&self) -> PatchResult<Vec<Box<dyn Resolver>>> {
        Ok(vec![Box::new(DependencyResolver::new(&self.packages))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn package(name: &str, extra: Value) -> InstalledPackage {
        InstalledPackage {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            install_path: format!("vendor/{}", name).into(),
            extra,
        }
    }

    #[test]
    fn test_disabled_when_no_package_declares_patches() {
        let resolver = DependencyResolver::new(&[
            package("a/a", json!({})),
            package("b/b", json!({"patches": {}})),
        ]);
        assert!(!resolver.is_enabled());
    }

    #[test]
    fn test_patches_get_dependency_provenance() {
        let resolver = DependencyResolver::new(&[
            package(
                "drupal/module",
                json!({"patches": {"drupal/core": [
                    {"description": "Core fix needed by module", "url": "https://example.com/core.patch"}
                ]}}),
            ),
            package(
                "other/lib",
                json!({"patches": {"other/lib": {"Self fix": "https://example.com/self.patch"}}}),
            ),
        ]);
        assert!(resolver.is_enabled());

        let mut collection = PatchCollection::new();
        let outcome = resolver.resolve(&mut collection).unwrap();

        assert_eq!(outcome.added, 2);
        assert_eq!(collection.patches("dependency").len(), 2);
        assert_eq!(collection.patches_for_package("drupal/core").len(), 1);
    }

    #[test]
    fn test_relative_paths_use_declaring_install_path() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("own.patch"), "").unwrap();
        let mut declaring = package(
            "drupal/module",
            json!({"patches": {"drupal/core": {"Shipped fix": "own.patch"}}}),
        );
        declaring.install_path = temp.path().to_path_buf();

        let mut collection = PatchCollection::new();
        DependencyResolver::new(&[declaring])
            .resolve(&mut collection)
            .unwrap();

        let patch = collection.patches_for_package("drupal/core")[0];
        assert_eq!(patch.local_path(), Some(temp.path().join("own.patch").as_path()));
        assert_eq!(patch.source(), "own.patch");
    }

    #[test]
    fn test_provider_returns_one_resolver() {
        let provider = DependencyResolverProvider::new(vec![]);
        let resolvers = provider.resolvers().unwrap();
        assert_eq!(resolvers.len(), 1);
        assert_eq!(resolvers[0].name(), "dependencies");
    }
}
