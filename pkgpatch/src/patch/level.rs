//! Strip level (`-p<N>`) handling.

use std::fmt;
use std::str::FromStr;

/// Keyword selecting automatic strip level detection.
pub const STRIP_LEVEL_AUTO: &str = "auto";

/// Levels tried, in order, when a patch does not declare one.
pub const STRIP_LEVEL_PROBE_ORDER: [u32; 4] = [1, 0, 2, 4];

/// How many leading path components to strip when applying a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StripLevel {
    /// Probe [`STRIP_LEVEL_PROBE_ORDER`] at apply time.
    #[default]
    Auto,
    /// Use exactly this level.
    Explicit(u32),
}

impl StripLevel {
    /// Levels an applier may try for this patch, in order.
    pub fn candidates(&self) -> Vec<u32> {
        match self {
            Self::Auto => STRIP_LEVEL_PROBE_ORDER.to_vec(),
            Self::Explicit(level) => vec![*level],
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, Self::Auto)
    }

    pub fn explicit(&self) -> Option<u32> {
        match self {
            Self::Auto => None,
            Self::Explicit(level) => Some(*level),
        }
    }
}

impl FromStr for StripLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case(STRIP_LEVEL_AUTO) {
            return Ok(Self::Auto);
        }
        trimmed
            .parse::<u32>()
            .map(Self::Explicit)
            .map_err(|_| format!("patch level must be a non-negative integer or 'auto', got '{}'", s))
    }
}

impl fmt::Display for StripLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "{}", STRIP_LEVEL_AUTO),
            Self::Explicit(level) => write!(f, "{}", level),
        }
    }
}
