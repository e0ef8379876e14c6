//! Configuration struct definitions.

use crate::level::Level;
use crate::render::{DEFAULT_TAGS, DEFAULT_TIME_FORMAT};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// General configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Minimum level of the root logger.
    pub level: Level,
    /// Properties merged into every record.
    pub base_log: Map<String, Value>,
    /// Threshold for relaylog's own diagnostics.
    pub internal_level: Level,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            level: Level::Info,
            base_log: Map::new(),
            internal_level: Level::Warn,
        }
    }
}

/// Console output configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub level: Level,
    pub colors: bool,
    /// strftime pattern for the `timeMs` tag.
    pub time_format: String,
    /// Record fields shown as `[value]` columns, in order.
    pub tags: Vec<String>,
    /// Payload properties never printed.
    pub exclude_properties: Vec<String>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: Level::Trace,
            colors: true,
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            tags: DEFAULT_TAGS.iter().map(ToString::to_string).collect(),
            exclude_properties: Vec::new(),
        }
    }
}

/// Rolling file output configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RollingFileConfig {
    pub enabled: bool,
    /// Archive the log directory after each day rollover.
    pub auto_archive: bool,
    pub level: Level,
    /// Directory for log files; `~` is expanded.
    pub log_dir: String,
    /// File name prefix.
    pub file: String,
    /// Size threshold for a rollover within one day; `0` disables size rotation.
    pub max_size_mb: u64,
}

impl Default for RollingFileConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_archive: true,
            level: Level::Trace,
            log_dir: "./logs".to_string(),
            file: "log".to_string(),
            max_size_mb: 10,
        }
    }
}

/// A `host` + `port` pair. The port is kept wide so out-of-range values reach
/// validation instead of failing inside the TOML parser.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u32,
}

impl Endpoint {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u32) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

/// Remote TCP log stream configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteLogConfig {
    pub enabled: bool,
    pub level: Level,
    /// Addresses to accept log consumers on.
    pub listen: Vec<Endpoint>,
    /// Consumers to dial, reconnecting when they drop.
    pub connect: Vec<Endpoint>,
}

impl Default for RemoteLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: Level::Trace,
            listen: Vec::new(),
            connect: Vec::new(),
        }
    }
}

/// Relay server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub input_host: String,
    pub input_port: u32,
    pub output_host: String,
    pub output_port: u32,
    /// Records kept for replay to new consumers.
    pub history_size: usize,
    /// Lines per write when replaying history.
    pub chunk_size: usize,
    /// Peer IP to display name.
    pub machine_names: HashMap<String, String>,
    pub exclude_contexts: Vec<String>,
    pub exclude_messages: Vec<String>,
}

pub const DEFAULT_EXCLUDED_CONTEXTS: &[&str] = &["webTraffic", "apiTraffic", "smtp-email"];

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            input_host: "0.0.0.0".to_string(),
            input_port: 18002,
            output_host: "127.0.0.1".to_string(),
            output_port: 18001,
            history_size: 1024,
            chunk_size: 32,
            machine_names: HashMap::from([("127.0.0.1".to_string(), "localhost".to_string())]),
            exclude_contexts: DEFAULT_EXCLUDED_CONTEXTS
                .iter()
                .map(ToString::to_string)
                .collect(),
            exclude_messages: Vec::new(),
        }
    }
}

/// Relay consumer configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub port: u32,
    pub colors: bool,
    pub time_format: String,
    pub tags: Vec<String>,
    pub exclude_properties: Vec<String>,
    pub exclude_contexts: Vec<String>,
    pub exclude_messages: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 18001,
            colors: true,
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            tags: ["timeMs", "host", "ip", "context", "user", "process"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            exclude_properties: Vec::new(),
            exclude_contexts: Vec::new(),
            exclude_messages: Vec::new(),
        }
    }
}

/// Defaults for `relaylog archive`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub source_dir: String,
    pub should_delete_logs: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            source_dir: "./logs".to_string(),
            should_delete_logs: true,
        }
    }
}

/// Everything `MasterLogger::configure` replaces in one step.
#[derive(Debug, Clone, Default)]
pub struct LoggerConfig {
    pub level: Level,
    pub base_log: Map<String, Value>,
    pub console: ConsoleConfig,
    pub rolling_file: RollingFileConfig,
    pub remote_log: RemoteLogConfig,
}
