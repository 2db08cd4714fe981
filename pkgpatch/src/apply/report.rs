//! Outcome of patching packages.

use crate::error::PatchError;
use crate::patch::PatchRecord;

/// Why a whole package was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageSkip {
    /// `patching-enabled` is off.
    PatchingDisabled,
    /// The package is on the ignore list.
    Ignored,
    /// Nothing targets the package.
    NoPatches,
}

/// A patch that was not attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPatch {
    pub description: String,
    pub source: String,
    pub reason: String,
}

/// A patch that failed while the run continued.
#[derive(Debug)]
pub struct FailedPatch {
    pub description: String,
    pub source: String,
    pub error: PatchError,
}

/// What happened to one package.
#[derive(Debug)]
pub struct PackageReport {
    pub package: String,
    pub skip: Option<PackageSkip>,
    pub applied: Vec<PatchRecord>,
    pub skipped: Vec<SkippedPatch>,
    pub failed: Vec<FailedPatch>,
}

impl PackageReport {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            skip: None,
            applied: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn skipped_package(package: impl Into<String>, skip: PackageSkip) -> Self {
        Self {
            skip: Some(skip),
            ..Self::new(package)
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Totals across all packages of a run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<PackageReport>,
}

impl RunSummary {
    pub fn push(&mut self, report: PackageReport) {
        self.reports.push(report);
    }

    pub fn applied_count(&self) -> usize {
        self.reports.iter().map(|r| r.applied.len()).sum()
    }

    pub fn skipped_count(&self) -> usize {
        self.reports.iter().map(|r| r.skipped.len()).sum()
    }

    pub fn failed_count(&self) -> usize {
        self.reports.iter().map(|r| r.failed.len()).sum()
    }

    pub fn has_failures(&self) -> bool {
        self.reports.iter().any(PackageReport::has_failures)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &FailedPatch)> {
        self.reports
            .iter()
            .flat_map(|r| r.failed.iter().map(move |f| (r.package.as_str(), f)))
    }
}
