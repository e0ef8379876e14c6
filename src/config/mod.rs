//! TOML configuration loading and validation.
//!
//! Kept apart from the struct definitions so file handling and the checks
//! that serde cannot express stay independent of the schema.

mod structs;

pub use structs::{
    ArchiveConfig, ClientConfig, ConsoleConfig, DEFAULT_EXCLUDED_CONTEXTS, Endpoint,
    GeneralConfig, LoggerConfig, RelayConfig, RemoteLogConfig, RollingFileConfig,
};

use crate::error::{Error, validate_host, validate_port};
use crate::internal;
use crate::record::RESERVED_FIELDS;
use crate::render::is_valid_time_format;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// An empty file is a valid config: every section falls back to its defaults.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub console: ConsoleConfig,
    pub rolling_file: RollingFileConfig,
    pub remote_log: RemoteLogConfig,
    pub relay: RelayConfig,
    pub client: ClientConfig,
    pub archive: ArchiveConfig,
}

impl Config {
    /// Loads the user config, or defaults when none exists.
    ///
    /// # Errors
    /// No config directory on this platform, an unreadable file, or invalid TOML.
    pub fn load() -> Result<Self, Error> {
        let path = Self::get_config_path()?;
        let config = Self::load_from(&path)?;
        internal::debug("CONFIG", &format!("Config loaded from {}", path.display()));
        Ok(config)
    }

    /// Loads an explicit file; a missing file yields defaults.
    ///
    /// # Errors
    /// The file cannot be read or is not valid TOML for this schema.
    pub fn load_from(path: &Path) -> Result<Self, Error> {
        if !path.exists() {
            internal::debug(
                "CONFIG",
                &format!("{} not found, using defaults", path.display()),
            );
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// # Errors
    /// Invalid TOML, or a level name that does not exist.
    pub fn parse(content: &str) -> Result<Self, Error> {
        Ok(toml::from_str(content)?)
    }

    /// `~/.config/relaylog/relaylog.toml`
    ///
    /// # Errors
    /// The platform has no config directory.
    pub fn get_config_path() -> Result<PathBuf, Error> {
        directories::BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("relaylog").join("relaylog.toml"))
            .ok_or(Error::ConfigDirNotFound)
    }

    /// Rejects values serde accepts but the runtime cannot use.
    ///
    /// # Errors
    /// The first offending value.
    pub fn validate(&self) -> Result<(), Error> {
        for key in self.general.base_log.keys() {
            if RESERVED_FIELDS.contains(&key.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "base_log may not set reserved field '{key}'"
                )));
            }
        }

        for format in [&self.console.time_format, &self.client.time_format] {
            if !is_valid_time_format(format) {
                return Err(Error::InvalidConfig(format!("bad time format '{format}'")));
            }
        }

        if self.rolling_file.file.trim().is_empty() {
            return Err(Error::InvalidConfig("rolling_file.file is empty".into()));
        }

        for endpoint in self.remote_log.listen.iter().chain(&self.remote_log.connect) {
            validate_host(&endpoint.host)?;
            validate_port(endpoint.port)?;
        }

        let relay = &self.relay;
        validate_host(&relay.input_host)?;
        validate_port(relay.input_port)?;
        validate_host(&relay.output_host)?;
        validate_port(relay.output_port)?;
        if relay.history_size == 0 || relay.chunk_size == 0 {
            return Err(Error::InvalidConfig(
                "relay history_size and chunk_size must be positive".into(),
            ));
        }

        validate_host(&self.client.host)?;
        validate_port(self.client.port)?;
        Ok(())
    }

    /// The sections a `MasterLogger` is configured from.
    #[must_use]
    pub fn logger_config(&self) -> LoggerConfig {
        LoggerConfig {
            level: self.general.level,
            base_log: self.general.base_log.clone(),
            console: self.console.clone(),
            rolling_file: self.rolling_file.clone(),
            remote_log: self.remote_log.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_valid() {
        let config = Config::parse("").unwrap();
        config.validate().unwrap();
        assert_eq!(config.relay.output_port, 18001);
        assert_eq!(config.rolling_file.max_size_mb, 10);
    }

    #[test]
    fn reserved_base_log_key_is_rejected() {
        let config = Config::parse("[general.base_log]\npid = 4\n").unwrap();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }
}
