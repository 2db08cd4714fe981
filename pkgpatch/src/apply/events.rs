//! Notifications emitted around each patch application.

use crate::patch::Patch;

/// Stage of a single patch application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchEventKind {
    PreApply,
    PostApply,
    ApplyFailed,
}

/// A patch application event.
#[derive(Debug, Clone, Copy)]
pub struct PatchEvent<'a> {
    pub kind: PatchEventKind,
    pub patch: &'a Patch,
    /// Failure reason, for [`PatchEventKind::ApplyFailed`].
    pub error: Option<&'a str>,
}

impl<'a> PatchEvent<'a> {
    pub fn pre_apply(patch: &'a Patch) -> Self {
        Self {
            kind: PatchEventKind::PreApply,
            patch,
            error: None,
        }
    }

    pub fn post_apply(patch: &'a Patch) -> Self {
        Self {
            kind: PatchEventKind::PostApply,
            patch,
            error: None,
        }
    }

    pub fn apply_failed(patch: &'a Patch, error: &'a str) -> Self {
        Self {
            kind: PatchEventKind::ApplyFailed,
            patch,
            error: Some(error),
        }
    }
}

/// Receives patch events. Listeners observe; they cannot veto.
pub trait PatchEventListener {
    fn on_event(&self, event: &PatchEvent<'_>);
}
