//! Human-readable rendering of records, shared by the console output, the
//! relay client and the internal diagnostic logger.
//!
//! Works on `serde_json::Value` rather than `LogRecord` because the client
//! renders whatever producers send, including entries that are not full records.

mod color;

pub use color::{Color, colorize, message_color, property_color, tag_color};

use crate::level::Level;
use crate::record::value_to_text;
use serde_json::Value;
use std::fmt::Write;

/// Default tag columns, in display order.
pub const DEFAULT_TAGS: &[&str] = &["timeMs", "host", "ip", "context", "process"];

/// Default `timeMs` rendering (UTC).
pub const DEFAULT_TIME_FORMAT: &str = "%y-%m-%d %H:%M:%S %Z";

/// Formats one entry as `[tag] [tag] LEVL: message { prop: value; }`.
#[derive(Debug, Clone)]
pub struct RecordRenderer {
    colors: bool,
    time_format: String,
    tags: Vec<String>,
    exclude_properties: Vec<String>,
    special_label: String,
}

impl Default for RecordRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            colors: true,
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            tags: DEFAULT_TAGS.iter().map(ToString::to_string).collect(),
            exclude_properties: Vec::new(),
            special_label: Level::Special.tag().to_string(),
        }
    }

    #[must_use]
    pub const fn colors(mut self, enabled: bool) -> Self {
        self.colors = enabled;
        self
    }

    /// strftime pattern applied to `timeMs` in UTC.
    #[must_use]
    pub fn time_format(mut self, format: impl Into<String>) -> Self {
        self.time_format = format.into();
        self
    }

    #[must_use]
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn exclude_properties<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_properties = names.into_iter().map(Into::into).collect();
        self
    }

    /// Label printed for `special` records; the relay client uses `SPEC`.
    #[must_use]
    pub fn special_label(mut self, label: impl Into<String>) -> Self {
        self.special_label = label.into();
        self
    }

    /// Level of an entry; unknown or missing levels render as `info`.
    #[must_use]
    pub fn entry_level(entry: &Value) -> Level {
        entry
            .get("level")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or(Level::Info)
    }

    /// Renders one entry without a trailing newline.
    #[must_use]
    pub fn render(&self, entry: &Value) -> String {
        let Value::Object(fields) = entry else {
            let text = value_to_text(entry).unwrap_or_default();
            return self.paint(&text, Color::gray());
        };

        let level = Self::entry_level(entry);
        let mut tags = String::new();
        for name in &self.tags {
            let Some(value) = fields.get(name) else {
                continue;
            };
            let text = if name == "timeMs" {
                value
                    .as_i64()
                    .and_then(|ms| self.format_time(ms))
                    .or_else(|| value_to_text(value))
            } else {
                value_to_text(value)
            };
            if let Some(text) = text.filter(|t| !t.is_empty()) {
                let _ = write!(tags, "[{text}] ");
            }
        }
        let _ = write!(tags, "{}: ", self.level_label(level));

        let log = fields.get("log").unwrap_or(entry);
        let msg = match log {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => map.get("msg").and_then(value_to_text),
            _ => None,
        };
        let props = self.properties(log);

        let mut out = self.paint(&tags, tag_color(level));
        if let Some(msg) = msg {
            out.push_str(&self.paint(&msg.replace("\\n", "\n"), message_color(level)));
        }
        if !props.is_empty() {
            out.push_str(&self.paint(&format!(" {{ {props}}}"), property_color(level)));
        }
        out
    }

    fn properties(&self, log: &Value) -> String {
        match log {
            Value::Array(_) => serde_json::to_string_pretty(log).unwrap_or_default(),
            Value::Object(map) => {
                let mut props = String::new();
                for (name, value) in map {
                    if name == "msg"
                        || name.starts_with('_')
                        || self.exclude_properties.iter().any(|e| e == name)
                    {
                        continue;
                    }
                    let text = match value {
                        Value::Object(_) | Value::Array(_) => value.to_string(),
                        other => value_to_text(other).unwrap_or_else(|| "null".to_string()),
                    };
                    let _ = write!(props, "{name}: {text}; ");
                }
                props
            }
            _ => String::new(),
        }
    }

    fn level_label(&self, level: Level) -> &str {
        match level {
            Level::Special => &self.special_label,
            other => other.tag(),
        }
    }

    /// `None` for out-of-range timestamps or an invalid pattern.
    fn format_time(&self, ms: i64) -> Option<String> {
        let time = chrono::DateTime::from_timestamp_millis(ms)?;
        let mut out = String::new();
        write!(out, "{}", time.format(&self.time_format)).ok()?;
        Some(out)
    }

    fn paint(&self, text: &str, color: Color) -> String {
        if self.colors {
            colorize(text, color)
        } else {
            text.to_string()
        }
    }
}

/// Checks a strftime pattern up front; chrono only reports bad specifiers while formatting.
#[must_use]
pub fn is_valid_time_format(format: &str) -> bool {
    chrono::format::StrftimeItems::new(format)
        .all(|item| !matches!(item, chrono::format::Item::Error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plain() -> RecordRenderer {
        RecordRenderer::new().colors(false)
    }

    #[test]
    fn renders_tags_level_message_and_properties() {
        let entry = json!({
            "timeMs": 1_588_281_135_000_i64,
            "host": "box",
            "context": "master.db",
            "level": "warn",
            "log": {"msg": "slow query", "ms": 120, "_private": 1, "sql": {"t": "x"}}
        });
        let line = plain().render(&entry);
        assert_eq!(
            line,
            "[20-04-30 21:12:15 UTC] [box] [master.db] WARN: slow query { ms: 120; sql: {\"t\":\"x\"}; }"
        );
    }

    #[test]
    fn string_payload_and_excluded_properties() {
        let entry = json!({"level": "error", "log": "boom"});
        assert_eq!(plain().render(&entry), "ERRR: boom");

        let entry = json!({"level": "info", "log": {"msg": "m", "secret": 1, "keep": 2}});
        let line = plain().exclude_properties(["secret"]).render(&entry);
        assert_eq!(line, "INFO: m { keep: 2; }");
    }

    #[test]
    fn bare_strings_and_special_label() {
        assert_eq!(plain().render(&json!("relay started")), "relay started");
        let entry = json!({"level": "special", "log": "x"});
        assert_eq!(plain().special_label("SPEC").render(&entry), "SPEC: x");
    }

    #[test]
    fn validates_time_formats() {
        assert!(is_valid_time_format(DEFAULT_TIME_FORMAT));
        assert!(!is_valid_time_format("%Q"));
    }
}
