//! Unified error type for all relaylog operations.

use std::path::PathBuf;

/// Error type for relaylog operations.
#[derive(Debug)]
pub enum Error {
    /// I/O error.
    Io(std::io::Error),
    /// TOML config parsing error.
    ConfigParse(toml::de::Error),
    /// Config directory not found.
    ConfigDirNotFound,
    /// JSON serialization or parsing error.
    Json(serde_json::Error),
    /// Invalid log level string.
    InvalidLevel(String),
    /// Port outside `1..=65535`.
    InvalidPort(u32),
    /// Empty or unusable host name.
    InvalidHost(String),
    /// Any other rejected configuration value.
    InvalidConfig(String),
    /// A network component was created outside a tokio runtime.
    NoRuntime,
    /// `configure` was called on a child logger.
    NotRoot(String),
    /// Archive packaging failed.
    Archive(PathBuf, String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::ConfigParse(e) => write!(f, "parse error: {e}"),
            Self::ConfigDirNotFound => write!(f, "config directory not found"),
            Self::Json(e) => write!(f, "JSON error: {e}"),
            Self::InvalidLevel(level) => write!(f, "invalid logger level: {level}"),
            Self::InvalidPort(port) => write!(f, "port out of range (1-65535): {port}"),
            Self::InvalidHost(host) => write!(f, "invalid host: '{host}'"),
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::NoRuntime => write!(f, "no tokio runtime available"),
            Self::NotRoot(context) => {
                write!(f, "only the root logger can be configured (got '{context}')")
            }
            Self::Archive(path, msg) => write!(f, "archive {} failed: {msg}", path.display()),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::ConfigParse(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Self::ConfigParse(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// Rejects ports the OS would refuse or silently remap (`0` means "any").
///
/// # Errors
/// [`Error::InvalidPort`] when `port` is outside `1..=65535`.
pub fn validate_port(port: u32) -> Result<u16, Error> {
    u16::try_from(port)
        .ok()
        .filter(|p| *p != 0)
        .ok_or(Error::InvalidPort(port))
}

/// # Errors
/// [`Error::InvalidHost`] for empty or whitespace-only hosts.
pub fn validate_host(host: &str) -> Result<(), Error> {
    if host.trim().is_empty() {
        return Err(Error::InvalidHost(host.to_string()));
    }
    Ok(())
}
