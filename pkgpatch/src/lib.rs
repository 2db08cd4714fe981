//! pkgpatch - patch resolution and application for installed packages
//!
//! This library gathers patch declarations from the root project, an
//! optional patch-list file and installed dependencies, fetches and verifies
//! each patch once, and applies them to package trees with `patch` or
//! `git apply`, recording exactly what was applied.
//!
//! # Pipeline
//!
//! ```text
//! resolver ──▶ PatchCollection ──▶ fetch (localize + SHA-1) ──▶ apply ──▶ installed record
//! ```
//!
//! [`plugin::PatchPlugin`] owns one run and exposes the pre/post package
//! hooks a host package manager calls.

pub mod apply;
pub mod config;
pub mod error;
pub mod fetch;
pub mod installed;
pub mod logging;
pub mod patch;
pub mod plugin;
pub mod resolver;

pub use config::PatchesConfig;
pub use error::{PatchError, PatchResult};
pub use plugin::PatchPlugin;
