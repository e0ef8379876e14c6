//! Worker-side logger and the messages exchanged with the master.

use super::{Logger, capture_log_stack, child_context};
use crate::identity::ProcessIdentity;
use crate::internal;
use crate::level::Level;
use crate::record::Payload;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::Sender;

/// Master/worker protocol. Every message names the logger group it belongs
/// to; receivers ignore other groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ForkMessage {
    /// Worker asks for the current level.
    #[serde(rename = "logger-level-request", rename_all = "camelCase")]
    LevelRequest { group_id: String },
    /// Master announces its level, on request or after reconfiguration.
    #[serde(rename = "logger-level", rename_all = "camelCase")]
    LoggerLevel { group_id: String, level: Level },
    /// A record produced by a worker.
    #[serde(rename = "logger-log", rename_all = "camelCase")]
    Log {
        group_id: String,
        process: String,
        pid: u32,
        context_name: String,
        level: Level,
        log: Payload,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        log_stack: Option<Vec<String>>,
    },
}

impl ForkMessage {
    #[must_use]
    pub fn group_id(&self) -> &str {
        match self {
            Self::LevelRequest { group_id }
            | Self::LoggerLevel { group_id, .. }
            | Self::Log { group_id, .. } => group_id,
        }
    }
}

struct ForkShared {
    group_id: String,
    level: AtomicU8,
    process: String,
    pid: u32,
    tx: Sender<ForkMessage>,
}

/// Logger for a worker. Records go to the master; the level is whatever the
/// master last announced (trace until then).
#[derive(Clone)]
pub struct ForkLogger {
    shared: Arc<ForkShared>,
    context: String,
}

impl ForkLogger {
    /// Creates the worker's root logger and asks the master for its level.
    #[must_use]
    pub fn new(group_id: impl Into<String>, identity: &ProcessIdentity, tx: Sender<ForkMessage>) -> Self {
        let group_id = group_id.into();
        if tx
            .send(ForkMessage::LevelRequest {
                group_id: group_id.clone(),
            })
            .is_err()
        {
            internal::warn("FORK", "Master channel closed before level request");
        }
        Self {
            shared: Arc::new(ForkShared {
                group_id,
                level: AtomicU8::new(Level::Trace.to_number()),
                process: identity.process.clone(),
                pid: identity.pid,
                tx,
            }),
            context: String::new(),
        }
    }

    /// Applies a level announcement from the master. Returns whether it applied.
    pub fn apply_message(&self, message: &ForkMessage) -> bool {
        match message {
            ForkMessage::LoggerLevel { group_id, level } if *group_id == self.shared.group_id => {
                self.set_level(*level);
                true
            }
            _ => false,
        }
    }
}

impl Logger for ForkLogger {
    fn group_id(&self) -> &str {
        &self.shared.group_id
    }

    fn context_name(&self) -> &str {
        &self.context
    }

    fn level(&self) -> Level {
        Level::from_number(self.shared.level.load(Ordering::Relaxed)).unwrap_or_default()
    }

    fn set_level(&self, level: Level) {
        self.shared.level.store(level.to_number(), Ordering::Relaxed);
    }

    fn create_logger(&self, name: &str) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            context: child_context(&self.context, name),
        }
    }

    fn log(&self, level: Level, payload: Payload) {
        if !level.can_log(self.level()) {
            return;
        }
        let log_stack = (level == Level::Error).then(capture_log_stack);
        let message = ForkMessage::Log {
            group_id: self.shared.group_id.clone(),
            process: self.shared.process.clone(),
            pid: self.shared.pid,
            context_name: self.context.clone(),
            level,
            log: payload,
            log_stack,
        };
        if self.shared.tx.send(message).is_err() {
            internal::warn("FORK", "Master channel closed, record dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn messages_use_kebab_type_and_camel_fields() {
        let msg = ForkMessage::LoggerLevel {
            group_id: "g".into(),
            level: Level::Warn,
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "logger-level", "groupId": "g", "level": "warn"})
        );

        let parsed: ForkMessage = serde_json::from_value(json!({
            "type": "logger-log", "groupId": "g", "process": "w", "pid": 7,
            "contextName": "a.b", "level": "info", "log": {"msg": "hi"}
        }))
        .unwrap();
        assert_eq!(parsed.group_id(), "g");
        assert!(matches!(parsed, ForkMessage::Log { pid: 7, log_stack: None, .. }));
    }
}
