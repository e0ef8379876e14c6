//! The structured record every output receives, and its one-line JSON wire form.

use crate::identity::ProcessIdentity;
use crate::level::Level;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field names a logger's base log may not shadow.
pub const RESERVED_FIELDS: &[&str] = &[
    "timeMs", "ip", "host", "user", "process", "pid", "context", "level", "log", "logStack",
];

/// Record body: free text or a property map with an optional `msg` member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Text(String),
    Fields(Map<String, Value>),
    /// Arrays, numbers and anything else a producer sends.
    Other(Value),
}

impl Payload {
    /// The human-readable message: the text itself, or the `msg` member of a map.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s.clone()),
            Self::Fields(map) => map.get("msg").and_then(value_to_text),
            Self::Other(_) => None,
        }
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(map: Map<String, Value>) -> Self {
        Self::Fields(map)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => Self::Text(s),
            Value::Object(map) => Self::Fields(map),
            other => Self::Other(other),
        }
    }
}

/// Renders a JSON scalar the way a message line shows it; `null` has no text.
#[must_use]
pub fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// One log entry. Serialized with camelCase keys, one object per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub time_ms: i64,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub process: String,
    #[serde(default)]
    pub pid: u32,
    /// Dotted hierarchical name of the emitting logger, e.g. `master.db`.
    #[serde(default)]
    pub context: String,
    pub level: Level,
    pub log: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_stack: Option<Vec<String>>,
    /// Base-log properties merged into every record of a logger.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LogRecord {
    /// Record stamped with `identity` and the current time.
    #[must_use]
    pub fn new(
        identity: &ProcessIdentity,
        context: impl Into<String>,
        level: Level,
        log: impl Into<Payload>,
    ) -> Self {
        Self {
            time_ms: now_ms(),
            ip: identity.ip.clone(),
            host: identity.host.clone(),
            user: identity.user.clone(),
            process: identity.process.clone(),
            pid: identity.pid,
            context: context.into(),
            level,
            log: log.into(),
            log_stack: None,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn message(&self) -> Option<String> {
        self.log.message()
    }

    /// Serializes to a single line; serde_json escapes embedded newlines, so the
    /// result never contains the `\n` record delimiter.
    ///
    /// # Errors
    /// Fails only if a payload value cannot be represented as JSON.
    pub fn to_json_line(&self) -> Result<String, crate::Error> {
        Ok(serde_json::to_string(self)?)
    }

    /// # Errors
    /// Malformed JSON or a missing required field.
    pub fn from_json_line(line: &str) -> Result<Self, crate::Error> {
        Ok(serde_json::from_str(line)?)
    }
}

/// Current wall-clock time in epoch milliseconds.
#[must_use]
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
