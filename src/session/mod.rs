//! Persisted session intent.
//!
//! The next foreground session is stored as the whole contents of a single
//! file. The supervisor and the switch trigger only ever talk to each other
//! through this file, so every write goes through a temp file plus atomic
//! rename and every read degrades to [`SessionTarget::Steam`].

mod storage;

pub use storage::SessionState;

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One of the two mutually exclusive foreground sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionTarget {
    /// Compositor-hosted game client.
    #[default]
    Steam,
    /// Desktop environment.
    Desktop,
}

impl SessionTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Steam => "steam",
            Self::Desktop => "desktop",
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Steam => Self::Desktop,
            Self::Desktop => Self::Steam,
        }
    }

    /// Normalises a user request: trimmed, case-insensitive, `plasma` accepted
    /// as an alias for the desktop.
    pub fn from_request(raw: &str) -> Result<Self, UnknownTarget> {
        let normalized = raw.trim().to_lowercase();
        match normalized.as_str() {
            "plasma" => Ok(Self::Desktop),
            other => other.parse(),
        }
    }
}

impl fmt::Display for SessionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("target '{0}' not recognized")]
pub struct UnknownTarget(pub String);

impl FromStr for SessionTarget {
    type Err = UnknownTarget;

    /// Strict parse of the on-disk token.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "steam" => Ok(Self::Steam),
            "desktop" => Ok(Self::Desktop),
            other => Err(UnknownTarget(other.to_string())),
        }
    }
}
