//! `pkgpatch resolve` - list the patches every resolver contributes.

use clap::Args;
use console::style;
use pkgpatch::patch::{Patch, PatchCollection, ProvenanceFilter};

use super::common::{print_problems, ProjectArgs};
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Only show patches of this provenance (root, dependency or all)
    #[arg(long, default_value = "all")]
    pub provenance: String,
}

pub fn run(args: ResolveArgs) -> Result<(), CliError> {
    let project = args.project.load()?;
    let mut plugin = project.plugin(project.repository()?)?;

    let problems = print_problems(plugin.on_pre_package()?);

    print_collection(plugin.collection(), ProvenanceFilter::from(args.provenance.as_str()));

    if problems > 0 {
        return Err(CliError::ResolutionProblems(problems));
    }
    Ok(())
}

fn print_collection(collection: &PatchCollection, filter: ProvenanceFilter) {
    let patches = collection.patches(filter);
    if patches.is_empty() {
        println!("No patches found.");
        return;
    }

    for package in collection.packages() {
        let mut targeting = patches.iter().filter(|p| p.package() == package).peekable();
        if targeting.peek().is_none() {
            continue;
        }
        println!("{}", style(package).green().bold());
        for patch in targeting {
            println!("  - {}", describe(patch));
        }
    }

    println!();
    println!("{} patch(es) resolved", patches.len());
}

fn describe(patch: &Patch) -> String {
    let mut line = format!(
        "{} ({}) [{}]",
        patch.description(),
        patch.source(),
        patch.provenance()
    );
    if let Some(hash) = patch.hash().as_sha1() {
        line.push_str(&format!(" sha1:{}", hash));
    }
    if let Some(level) = patch.strip_level().explicit() {
        line.push_str(&format!(" -p{}", level));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgpatch::patch::StripLevel;

    #[test]
    fn test_describe_includes_pins() {
        let patch = Patch::new(
            "vendor/a",
            "Fix",
            "https://example.com/fix.patch",
            "root",
            Some("da39a3ee5e6b4b0d3255bfef95601890afd80709"),
            StripLevel::Explicit(2),
        )
        .unwrap();

        assert_eq!(
            describe(&patch),
            "Fix (https://example.com/fix.patch) [root] sha1:da39a3ee5e6b4b0d3255bfef95601890afd80709 -p2"
        );
    }

    #[test]
    fn test_describe_auto_level_unhashed() {
        let patch = Patch::new(
            "vendor/a",
            "Fix",
            "https://example.com/fix.patch",
            "dependency",
            None,
            StripLevel::Auto,
        )
        .unwrap();

        assert_eq!(describe(&patch), "Fix (https://example.com/fix.patch) [dependency]");
    }
}
