//! Patch fetching and verification.
//!
//! - Remote download over HTTP(S) (`http`)
//! - SHA-1 digests (`checksum`)
//! - Localize + verify with hash pinning (`fetcher`)
//!
//! # Example
//!
//! ```ignore
//! use pkgpatch::fetch::{HttpDownloader, PatchFetcher};
//!
//! let fetcher = PatchFetcher::new(Box::new(HttpDownloader::new()?))?;
//! fetcher.fetch(&mut patch)?;
//! fetcher.verify(&mut patch)?;
//! assert!(patch.is_verified());
//! ```

mod checksum;
mod fetcher;
mod http;

pub use checksum::{calculate_file_sha1, sha1_hex};
pub use fetcher::PatchFetcher;
pub use http::{HttpDownloader, PatchDownloader};
