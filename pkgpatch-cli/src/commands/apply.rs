//! `pkgpatch apply` - replay post-install events for installed packages.

use clap::Args;
use console::style;
use pkgpatch::apply::{PackageSkip, PatchEvent, PatchEventKind, PatchEventListener, RunSummary};
use pkgpatch::installed::InstalledPackage;
use tracing::debug;

use super::common::{print_problems, ProjectArgs};
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Only patch these packages (repeatable); defaults to every installed package
    #[arg(long = "package", value_name = "NAME")]
    pub packages: Vec<String>,

    /// Re-apply patches even when the installed record says they are applied
    #[arg(long)]
    pub force: bool,
}

/// Prints one line per patch as it is applied.
struct ConsoleListener;

impl PatchEventListener for ConsoleListener {
    fn on_event(&self, event: &PatchEvent<'_>) {
        let patch = event.patch;
        match event.kind {
            PatchEventKind::PreApply => {
                println!(
                    "    - Applying patch {} ({})",
                    style(patch.description()).cyan(),
                    patch.source()
                );
            }
            PatchEventKind::PostApply => debug!(url = %patch.source(), "Applied"),
            PatchEventKind::ApplyFailed => {
                println!(
                    "      {} {}",
                    style("failed:").red(),
                    event.error.unwrap_or("unknown error")
                );
            }
        }
    }
}

pub fn run(args: ApplyArgs) -> Result<(), CliError> {
    let project = args.project.load()?;
    let repository = project.repository()?;
    let targets = select_packages(repository.packages(), &args.packages)?;

    let mut plugin = project.plugin(repository)?;
    plugin.add_listener(Box::new(ConsoleListener));
    let problems = print_problems(plugin.on_pre_package()?);

    for package in &targets {
        if plugin.collection().patches_for_package(&package.name).is_empty() {
            continue;
        }
        if !args.force && plugin.is_up_to_date(package)? {
            println!("  - {} is up to date", style(&package.name).green());
            continue;
        }
        println!("  - Patching {}", style(&package.name).green());
        let report = plugin.on_post_package(&package.name, &package.install_path)?;
        match report.skip {
            Some(PackageSkip::Ignored) => println!("    (ignored)"),
            Some(PackageSkip::PatchingDisabled) => println!("    (patching disabled)"),
            _ => {}
        }
    }

    let summary = plugin.finish();
    print_summary(&summary);

    if summary.has_failures() {
        return Err(CliError::PatchFailures(summary.failed_count()));
    }
    if problems > 0 {
        return Err(CliError::ResolutionProblems(problems));
    }
    Ok(())
}

/// Installed packages to patch, in install order.
fn select_packages(
    installed: Vec<InstalledPackage>,
    wanted: &[String],
) -> Result<Vec<InstalledPackage>, CliError> {
    if wanted.is_empty() {
        return Ok(installed);
    }

    if let Some(missing) = wanted
        .iter()
        .find(|name| !installed.iter().any(|p| &p.name == *name))
    {
        return Err(CliError::Config(format!(
            "package {} is not installed",
            missing
        )));
    }

    Ok(installed
        .into_iter()
        .filter(|p| wanted.contains(&p.name))
        .collect())
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!(
        "{} applied, {} skipped, {} failed",
        style(summary.applied_count()).green(),
        summary.skipped_count(),
        if summary.failed_count() > 0 {
            style(summary.failed_count()).red()
        } else {
            style(summary.failed_count())
        }
    );
    for (package, failure) in summary.failures() {
        println!(
            "  {} {}: {} ({})",
            style("✗").red(),
            package,
            failure.description,
            failure.error
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn installed(name: &str) -> InstalledPackage {
        InstalledPackage {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            install_path: format!("/vendor/{}", name).into(),
            extra: json!({}),
        }
    }

    #[test]
    fn test_select_all_by_default() {
        let selected = select_packages(vec![installed("a/a"), installed("b/b")], &[]).unwrap();
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn test_select_keeps_install_order() {
        let selected = select_packages(
            vec![installed("a/a"), installed("b/b"), installed("c/c")],
            &["c/c".to_string(), "a/a".to_string()],
        )
        .unwrap();
        let names: Vec<_> = selected.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a/a", "c/c"]);
    }

    #[test]
    fn test_broken_patches_file_fails_the_run() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("patches.json"), r#"{"other": {}}"#).unwrap();
        let manifest = temp.path().join("pkgpatch.json");
        std::fs::write(&manifest, r#"{"patches-file": "patches.json"}"#).unwrap();

        let args = ApplyArgs {
            project: ProjectArgs {
                manifest,
                installed: None,
            },
            packages: Vec::new(),
            force: false,
        };
        assert!(matches!(run(args), Err(CliError::ResolutionProblems(1))));
    }

    #[test]
    fn test_select_unknown_package() {
        let err = select_packages(vec![installed("a/a")], &["z/z".to_string()]).unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: package z/z is not installed");
    }
}
