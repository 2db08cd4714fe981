//! Patch application.
//!
//! [`ApplyEngine`] walks the patches of one package, materializes each one
//! through the fetcher, hands it to the first [`PatchApplier`] whose dry run
//! accepts it, and records what was applied.

mod applier;
mod engine;
mod events;
mod report;

pub use applier::{default_appliers, GitApplier, GnuPatchApplier, PatchApplier};
pub use engine::ApplyEngine;
pub use events::{PatchEvent, PatchEventKind, PatchEventListener};
pub use report::{FailedPatch, PackageReport, PackageSkip, RunSummary, SkippedPatch};
