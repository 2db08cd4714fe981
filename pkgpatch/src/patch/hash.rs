//! Expected content hash of a patch.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{PatchError, PatchResult};

/// Sentinel text used in logs and listings for a hash not yet known.
pub const NO_CHECK_HASH: &str = "no-check";

fn sha1_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-fA-F0-9]{40}$").expect("static regex is valid"))
}

/// Whether `value` is a 40 character hexadecimal SHA-1 digest.
pub fn is_valid_sha1(value: &str) -> bool {
    sha1_pattern().is_match(value)
}

/// The hash a patch is expected to have.
///
/// `Unchecked` means nothing was declared; the first successful
/// verification pins the computed digest.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PatchHash {
    #[default]
    Unchecked,
    Sha1(String),
}

impl PatchHash {
    /// Parse an optional declared hash, failing on anything that is not SHA-1.
    pub fn parse(value: Option<&str>, url: &str) -> PatchResult<Self> {
        match value {
            None => Ok(Self::Unchecked),
            Some(hash) if is_valid_sha1(hash) => Ok(Self::Sha1(hash.to_string())),
            Some(hash) => Err(PatchError::InvalidHashFormat {
                url: url.to_string(),
                hash: hash.to_string(),
            }),
        }
    }

    pub fn as_sha1(&self) -> Option<&str> {
        match self {
            Self::Unchecked => None,
            Self::Sha1(hash) => Some(hash),
        }
    }

    pub fn is_unchecked(&self) -> bool {
        matches!(self, Self::Unchecked)
    }
}

impl fmt::Display for PatchHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unchecked => write!(f, "{}", NO_CHECK_HASH),
            Self::Sha1(hash) => write!(f, "{}", hash),
        }
    }
}
