//! Loading the manifest and installed state shared by all commands.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use console::style;
use pkgpatch::config::ProcessEnv;
use pkgpatch::installed::JsonInstalledRepository;
use pkgpatch::resolver::ResolutionReport;
use pkgpatch::PatchPlugin;
use serde_json::Value;

use crate::error::CliError;

/// Default manifest file name.
pub const DEFAULT_MANIFEST: &str = "pkgpatch.json";

/// Default installed-state file name, next to the manifest.
pub const DEFAULT_INSTALLED: &str = "installed.json";

/// Location of the project's files.
#[derive(Debug, Clone, Args)]
pub struct ProjectArgs {
    /// Root manifest holding `patches`, `patches-file` and `patches-config`
    #[arg(long, default_value = DEFAULT_MANIFEST)]
    pub manifest: PathBuf,

    /// Installed-state file (defaults to installed.json beside the manifest)
    #[arg(long)]
    pub installed: Option<PathBuf>,
}

/// A loaded project.
pub struct Project {
    pub manifest: Value,
    pub base_dir: PathBuf,
    pub installed_path: PathBuf,
}

impl ProjectArgs {
    pub fn load(&self) -> Result<Project, CliError> {
        let manifest = load_manifest(&self.manifest)?;
        let base_dir = self
            .manifest
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let installed_path = self
            .installed
            .clone()
            .unwrap_or_else(|| base_dir.join(DEFAULT_INSTALLED));

        Ok(Project {
            manifest,
            base_dir,
            installed_path,
        })
    }
}

impl Project {
    pub fn repository(&self) -> Result<JsonInstalledRepository, CliError> {
        Ok(JsonInstalledRepository::load(&self.installed_path)?)
    }

    /// Build the plugin with the installed packages feeding dependency patches.
    pub fn plugin(&self, repository: JsonInstalledRepository) -> Result<PatchPlugin, CliError> {
        let installed = repository.packages();
        Ok(PatchPlugin::from_root_config(
            &self.manifest,
            &self.base_dir,
            installed,
            Box::new(repository),
            &ProcessEnv,
        )?)
    }
}

/// Read and parse the manifest, which must be a JSON object.
pub fn load_manifest(path: &Path) -> Result<Value, CliError> {
    let content = fs::read_to_string(path).map_err(|e| CliError::Manifest {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let manifest: Value = serde_json::from_str(&content).map_err(|e| CliError::Manifest {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    if !manifest.is_object() {
        return Err(CliError::Manifest {
            path: path.to_path_buf(),
            message: "expected a JSON object".to_string(),
        });
    }

    Ok(manifest)
}

/// One line per broken source or rejected declaration.
pub fn resolution_problems(report: &ResolutionReport) -> Vec<String> {
    report
        .runs
        .iter()
        .flat_map(|run| {
            run.failure
                .iter()
                .chain(run.rejected.iter())
                .map(move |error| format!("{}: {}", run.name, error))
        })
        .collect()
}

/// Print resolution problems to stderr and return how many there were.
pub fn print_problems(report: &ResolutionReport) -> usize {
    let problems = resolution_problems(report);
    for problem in &problems {
        eprintln!("{} {}", style("warning:").yellow().bold(), problem);
    }
    problems.len()
}
