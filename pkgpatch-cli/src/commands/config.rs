//! `pkgpatch config` - show the effective patching configuration.

use clap::Args;
use console::style;
use pkgpatch::config::{env_var_name, EnvSource, ProcessEnv};
use pkgpatch::PatchesConfig;

use super::common::{load_manifest, ProjectArgs};
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
}

pub fn run(args: ConfigArgs) -> Result<(), CliError> {
    let manifest = load_manifest(&args.project.manifest)?;
    let config = PatchesConfig::from_root_config(&manifest, &ProcessEnv)?;

    println!("Patching Configuration");
    println!("======================");
    println!();
    for line in render(&config, &ProcessEnv) {
        println!("{}", line);
    }

    if let Some(file) = manifest.get("patches-file").and_then(|v| v.as_str()) {
        println!();
        println!("  patches-file = {}", file);
    }

    Ok(())
}

/// One line per option, marking those overridden from the environment.
fn render(config: &PatchesConfig, env: &dyn EnvSource) -> Vec<String> {
    config
        .entries()
        .into_iter()
        .map(|(name, value)| {
            let value = if value.is_empty() {
                "(none)".to_string()
            } else {
                value
            };
            let var = env_var_name(name);
            if env.var(&var).is_some() {
                format!("  {} = {}  {}", name, value, style(format!("(from {})", var)).dim())
            } else {
                format!("  {} = {}", name, value)
            }
        })
        .collect()
}
