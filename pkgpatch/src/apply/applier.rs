//! Shell-based patch appliers.
//!
//! Both appliers drive an external tool and are probed with a dry run
//! before the real application, so a rejected level never touches the tree.

use std::ffi::OsString;
use std::path::Path;
use std::process::Command;

use tracing::debug;

/// Applies a local patch file to a directory at a given strip level.
pub trait PatchApplier {
    /// Short tool name used in logs and failure reasons.
    fn name(&self) -> &str;

    /// Whether the backing tool can be run on this host.
    fn is_available(&self) -> bool;

    /// Whether the patch would apply cleanly, without modifying anything.
    fn check(&self, patch_file: &Path, level: u32, target_dir: &Path) -> bool;

    /// Apply the patch. The error carries the tool's diagnostics.
    fn apply(&self, patch_file: &Path, level: u32, target_dir: &Path) -> Result<(), String>;
}

/// Run a prepared command, folding non-zero exits into the tool's stderr.
fn run(tool: &str, mut command: Command) -> Result<(), String> {
    let output = command
        .output()
        .map_err(|e| format!("Failed to run {}: {}", tool, e))?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let detail = if stderr.trim().is_empty() {
        stdout.trim().to_string()
    } else {
        stderr.trim().to_string()
    };
    Err(format!("{} failed: {}", tool, detail))
}

/// GNU `patch`.
#[derive(Debug, Clone)]
pub struct GnuPatchApplier {
    program: OsString,
}

impl GnuPatchApplier {
    pub fn new() -> Self {
        Self {
            program: OsString::from("patch"),
        }
    }

    fn command(&self, patch_file: &Path, level: u32, target_dir: &Path, dry_run: bool) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg(format!("-p{}", level))
            .arg("--forward")
            .arg("--batch")
            .arg("--no-backup-if-mismatch")
            .arg("-d")
            .arg(target_dir)
            .arg("-i")
            .arg(patch_file);
        if dry_run {
            command.arg("--dry-run");
        }
        command
    }
}

impl Default for GnuPatchApplier {
    fn default() -> Self {
        Self::new()
    }
}

impl PatchApplier for GnuPatchApplier {
    fn name(&self) -> &str {
        "patch"
    }

    fn is_available(&self) -> bool {
        which::which(&self.program).is_ok()
    }

    fn check(&self, patch_file: &Path, level: u32, target_dir: &Path) -> bool {
        let result = run("patch", self.command(patch_file, level, target_dir, true));
        if let Err(reason) = &result {
            debug!(level, reason = %reason, "patch dry run rejected");
        }
        result.is_ok()
    }

    fn apply(&self, patch_file: &Path, level: u32, target_dir: &Path) -> Result<(), String> {
        run("patch", self.command(patch_file, level, target_dir, false))
    }
}

/// `git apply`, usable whether or not the target is a repository.
#[derive(Debug, Clone)]
pub struct GitApplier {
    program: OsString,
}

impl GitApplier {
    pub fn new() -> Self {
        Self {
            program: OsString::from("git"),
        }
    }

    fn command(&self, patch_file: &Path, level: u32, target_dir: &Path, check: bool) -> Command {
        let mut command = Command::new(&self.program);
        command.current_dir(target_dir);
        // Keep git from discovering an enclosing repository and applying
        // paths relative to its top level instead of the package directory.
        if let Some(parent) = target_dir.parent() {
            command.env("GIT_CEILING_DIRECTORIES", parent);
        }
        command.arg("apply").arg(format!("-p{}", level));
        if check {
            command.arg("--check");
        }
        command.arg(patch_file);
        command
    }
}

impl Default for GitApplier {
    fn default() -> Self {
        Self::new()
    }
}

impl PatchApplier for GitApplier {
    fn name(&self) -> &str {
        "git"
    }

    fn is_available(&self) -> bool {
        which::which(&self.program).is_ok()
    }

    fn check(&self, patch_file: &Path, level: u32, target_dir: &Path) -> bool {
        let result = run("git apply", self.command(patch_file, level, target_dir, true));
        if let Err(reason) = &result {
            debug!(level, reason = %reason, "git apply --check rejected");
        }
        result.is_ok()
    }

    fn apply(&self, patch_file: &Path, level: u32, target_dir: &Path) -> Result<(), String> {
        run("git apply", self.command(patch_file, level, target_dir, false))
    }
}

/// Appliers in probe order.
pub fn default_appliers() -> Vec<Box<dyn PatchApplier>> {
    vec![Box::new(GnuPatchApplier::new()), Box::new(GitApplier::new())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const PATCH: &str = "--- a/file.txt\n+++ b/file.txt\n@@ -1 +1 @@\n-old\n+new\n";

    fn fixture() -> (TempDir, std::path::PathBuf, std::path::PathBuf) {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("pkg");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("file.txt"), "old\n").unwrap();
        let patch = temp.path().join("fix.patch");
        fs::write(&patch, PATCH).unwrap();
        (temp, target, patch)
    }

    #[test]
    fn test_gnu_patch_args() {
        let applier = GnuPatchApplier::new();
        let command = applier.command(Path::new("/p/fix.patch"), 2, Path::new("/t"), true);
        let args: Vec<_> = command.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args[0], "-p2");
        assert!(args.contains(&"--dry-run".to_string()));
        assert!(args.contains(&"/p/fix.patch".to_string()));
    }

    #[test]
    fn test_git_apply_args() {
        let applier = GitApplier::new();
        let command = applier.command(Path::new("/p/fix.patch"), 0, Path::new("/t/pkg"), false);
        let args: Vec<_> = command.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, vec!["apply", "-p0", "/p/fix.patch"]);
        assert_eq!(command.get_current_dir(), Some(Path::new("/t/pkg")));
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let applier = GnuPatchApplier {
            program: OsString::from("pkgpatch-no-such-tool"),
        };
        assert!(!applier.is_available());
        assert!(applier
            .apply(Path::new("x.patch"), 1, Path::new("."))
            .unwrap_err()
            .starts_with("Failed to run patch"));
    }

    #[test]
    fn test_gnu_patch_applies_at_level_one() {
        let applier = GnuPatchApplier::new();
        if !applier.is_available() {
            return;
        }
        let (_temp, target, patch) = fixture();

        assert!(!applier.check(&patch, 0, &target));
        assert!(applier.check(&patch, 1, &target));
        // Dry run leaves the tree alone
        assert_eq!(fs::read_to_string(target.join("file.txt")).unwrap(), "old\n");

        applier.apply(&patch, 1, &target).unwrap();
        assert_eq!(fs::read_to_string(target.join("file.txt")).unwrap(), "new\n");
    }

    #[test]
    fn test_git_apply_outside_repository() {
        let applier = GitApplier::new();
        if !applier.is_available() {
            return;
        }
        let (_temp, target, patch) = fixture();

        assert!(applier.check(&patch, 1, &target));
        applier.apply(&patch, 1, &target).unwrap();
        assert_eq!(fs::read_to_string(target.join("file.txt")).unwrap(), "new\n");
    }
}
