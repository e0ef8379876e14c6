//! Severity levels that gate which records reach which outputs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Derives `Ord` so every output can compare a record's level against its configured minimum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Follows program execution; very high volume.
    Trace = 0,
    /// Debugging details.
    Debug = 1,
    /// General information.
    #[default]
    Info = 2,
    /// Non-critical issues.
    Warn = 3,
    /// Errors and exceptions. Records at this level carry a captured stack.
    Error = 4,
    /// Data that is normally not logged and must pass whatever the configured level is.
    Special = 5,
}

impl Level {
    /// Lowercase wire name, as written in the `level` field of every record.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Special => "special",
        }
    }

    /// Fixed-width tag used by console rendering.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Trace => "TRAC",
            Self::Debug => "DBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERRR",
            Self::Special => "****",
        }
    }

    /// `true` when a record at `self` passes an output configured with `min`.
    #[must_use]
    pub fn can_log(self, min: Self) -> bool {
        self >= min
    }

    #[must_use]
    pub const fn to_number(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn from_number(num: u8) -> Option<Self> {
        match num {
            0 => Some(Self::Trace),
            1 => Some(Self::Debug),
            2 => Some(Self::Info),
            3 => Some(Self::Warn),
            4 => Some(Self::Error),
            5 => Some(Self::Special),
            _ => None,
        }
    }

    /// Every level in ascending order.
    #[must_use]
    pub const fn all() -> [Self; 6] {
        [
            Self::Trace,
            Self::Debug,
            Self::Info,
            Self::Warn,
            Self::Error,
            Self::Special,
        ]
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned by `FromStr` so callers can distinguish "unknown level" from other parse failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLevelError(String);

impl fmt::Display for ParseLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown log level: '{}'", self.0)
    }
}

impl std::error::Error for ParseLevelError {}

impl From<ParseLevelError> for crate::Error {
    fn from(e: ParseLevelError) -> Self {
        Self::InvalidLevel(e.0)
    }
}

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" | "err" => Ok(Self::Error),
            "special" => Ok(Self::Special),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}
