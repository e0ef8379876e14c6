//! Log relay: a fan-in/fan-out hub with replayable history, plus the pieces
//! the relay client shares with it.

mod history;
mod line_buffer;
mod server;

pub use history::{DEFAULT_HISTORY_SIZE, HistoryRing};
pub use line_buffer::{LineBuffer, MAX_PENDING_BYTES, split_lines};
pub use server::{RELAY_CONTEXT, RelayHandle, RelayServer};

use serde_json::Value;

/// The message of an entry as producers write it: a bare string, a top-level
/// `msg`, a string `log` payload, or the `msg` member of a map payload.
#[must_use]
pub fn entry_message(entry: &Value) -> Option<&str> {
    match entry {
        Value::String(s) => Some(s),
        Value::Object(fields) => fields
            .get("msg")
            .and_then(Value::as_str)
            .or_else(|| match fields.get("log") {
                Some(Value::String(s)) => Some(s.as_str()),
                Some(Value::Object(log)) => log.get("msg").and_then(Value::as_str),
                _ => None,
            }),
        _ => None,
    }
}

/// Drops entries by context name or exact message.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    exclude_contexts: Vec<String>,
    exclude_messages: Vec<String>,
}

impl EntryFilter {
    #[must_use]
    pub const fn new(exclude_contexts: Vec<String>, exclude_messages: Vec<String>) -> Self {
        Self {
            exclude_contexts,
            exclude_messages,
        }
    }

    #[must_use]
    pub fn excludes(&self, entry: &Value) -> bool {
        if let Some(context) = entry.get("context").and_then(Value::as_str)
            && self.exclude_contexts.iter().any(|c| c == context)
        {
            return true;
        }
        entry_message(entry).is_some_and(|msg| self.exclude_messages.iter().any(|m| m == msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_lookup_order() {
        assert_eq!(entry_message(&json!("plain")), Some("plain"));
        assert_eq!(entry_message(&json!({"msg": "top", "log": "inner"})), Some("top"));
        assert_eq!(entry_message(&json!({"log": {"msg": "nested"}})), Some("nested"));
        assert_eq!(entry_message(&json!({"log": [1, 2]})), None);
    }

    #[test]
    fn filter_by_context_and_message() {
        let filter = EntryFilter::new(vec!["webTraffic".into()], vec!["heartbeat".into()]);
        assert!(filter.excludes(&json!({"context": "webTraffic", "log": "x"})));
        assert!(filter.excludes(&json!({"context": "api", "log": "heartbeat"})));
        assert!(filter.excludes(&json!("heartbeat")));
        assert!(!filter.excludes(&json!({"context": "api", "log": "x"})));
    }
}
