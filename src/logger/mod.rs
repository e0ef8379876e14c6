//! Hierarchical loggers. A root logger owns the outputs; children share the
//! root's state and only add a dotted context name (`master.db.pool`).
//!
//! Worker processes log through a [`ForkLogger`], which forwards records over
//! a channel to the process that owns the [`MasterLogger`].

mod fork;
mod master;

pub use fork::{ForkLogger, ForkMessage};
pub use master::{DEFAULT_ROOT_CONTEXT, MasterLogger};

use crate::level::Level;
use crate::record::Payload;

/// A record as seen by event subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    pub context: String,
    pub level: Level,
    pub message: Payload,
    pub log_stack: Option<Vec<String>>,
}

/// What every logger can do. Level queries read the root's level, so setting it
/// on any logger of a tree affects the whole tree.
pub trait Logger: Sized {
    fn group_id(&self) -> &str;

    fn context_name(&self) -> &str;

    fn level(&self) -> Level;

    fn set_level(&self, level: Level);

    /// Child logger whose context is `{self}.{name}`, or `name` under an empty context.
    #[must_use]
    fn create_logger(&self, name: &str) -> Self;

    /// Writes `payload` when `level` passes the current level.
    fn log(&self, level: Level, payload: Payload);

    fn trace(&self, log: impl Into<Payload>) {
        self.log(Level::Trace, log.into());
    }

    fn debug(&self, log: impl Into<Payload>) {
        self.log(Level::Debug, log.into());
    }

    fn info(&self, log: impl Into<Payload>) {
        self.log(Level::Info, log.into());
    }

    fn warn(&self, log: impl Into<Payload>) {
        self.log(Level::Warn, log.into());
    }

    fn error(&self, log: impl Into<Payload>) {
        self.log(Level::Error, log.into());
    }

    /// Always written, whatever the configured level.
    fn special(&self, log: impl Into<Payload>) {
        self.log(Level::Special, log.into());
    }

    fn can_trace(&self) -> bool {
        Level::Trace.can_log(self.level())
    }

    fn can_debug(&self) -> bool {
        Level::Debug.can_log(self.level())
    }

    fn can_info(&self) -> bool {
        Level::Info.can_log(self.level())
    }

    fn can_warn(&self) -> bool {
        Level::Warn.can_log(self.level())
    }

    fn can_error(&self) -> bool {
        Level::Error.can_log(self.level())
    }
}

/// Joins a parent context and a child name with a dot.
pub(crate) fn child_context(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}.{name}")
    }
}

/// Call stack attached to error records, one trimmed frame line per entry.
pub(crate) fn capture_log_stack() -> Vec<String> {
    std::backtrace::Backtrace::force_capture()
        .to_string()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}
