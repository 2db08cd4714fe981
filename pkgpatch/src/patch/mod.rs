//! Patch value types.
//!
//! - **Patch**: one patch for one package, with provenance, expected hash and
//!   strip level
//! - **PatchDeclaration**: the user-authored form a resolver reads
//! - **PatchRecord**: the form written back after a successful apply
//! - **PatchCollection**: ordered set of patches gathered during resolution
//!
//! # Patch lifecycle
//!
//! ```text
//! Declared ──fetch──▶ Localized ──verify──▶ Verified ──apply──▶ Applied
//! ```
//!
//! A patch whose source is an existing local file starts out `Localized`.

mod collection;
mod core;
mod declaration;
mod hash;
mod level;

pub use self::core::{Patch, PatchSource, PatchState, PROVENANCE_DEPENDENCY, PROVENANCE_ROOT};
pub use collection::{DuplicatePolicy, PatchCollection, ProvenanceFilter};
pub use declaration::{
    parse_package_declarations, DeclaredLevel, PackageDeclarations, PatchDeclaration, PatchRecord,
};
pub use hash::{is_valid_sha1, PatchHash, NO_CHECK_HASH};
pub use level::{StripLevel, STRIP_LEVEL_AUTO, STRIP_LEVEL_PROBE_ORDER};
