//! relaylog's own diagnostic logger.
//!
//! Socket errors, failed file writes and archive failures are reported here
//! instead of being returned to callers that have no way to act on them.
//! Lines go to stderr through the same renderer the console output uses.
//!
//! Uses `OnceLock` so the logger is initialized exactly once; the first call
//! to [`init`] wins, and logging before any `init` falls back to
//! `RELAYLOG_LEVEL` or `warn`.

use crate::level::Level;
use crate::record::now_ms;
use crate::render::RecordRenderer;
use serde_json::json;
use std::io::{self, IsTerminal, Write};
use std::sync::OnceLock;

/// Environment variable overriding the default diagnostic level.
pub const LEVEL_ENV: &str = "RELAYLOG_LEVEL";

static INTERNAL_LOGGER: OnceLock<InternalLogger> = OnceLock::new();

struct InternalLogger {
    min_level: Level,
    renderer: RecordRenderer,
}

impl InternalLogger {
    fn new(min_level: Level) -> Self {
        Self {
            min_level,
            renderer: RecordRenderer::new()
                .colors(io::stderr().is_terminal())
                .tags(["timeMs", "context"]),
        }
    }
}

fn env_level() -> Option<Level> {
    std::env::var(LEVEL_ENV).ok()?.parse().ok()
}

/// Sets the diagnostic threshold. `RELAYLOG_LEVEL` takes precedence when set.
pub fn init(level: Level) {
    let was_init = INTERNAL_LOGGER.get().is_some();
    INTERNAL_LOGGER.get_or_init(|| InternalLogger::new(env_level().unwrap_or(level)));
    if !was_init {
        debug("INTERNAL", &format!("Diagnostic level: {}", current_level()));
    }
}

fn logger() -> &'static InternalLogger {
    INTERNAL_LOGGER.get_or_init(|| InternalLogger::new(env_level().unwrap_or(Level::Warn)))
}

/// Threshold currently applied to diagnostics.
#[must_use]
pub fn current_level() -> Level {
    logger().min_level
}

/// Emits at a level chosen at runtime.
pub fn log_at(level: Level, scope: &str, msg: &str) {
    let logger = logger();
    if level < logger.min_level {
        return;
    }
    let entry = json!({
        "timeMs": now_ms(),
        "context": scope,
        "level": level.as_str(),
        "log": msg,
    });
    let line = logger.renderer.render(&entry);
    let _ = writeln!(io::stderr(), "{line}");
}

pub fn trace(scope: &str, msg: &str) {
    log_at(Level::Trace, scope, msg);
}

pub fn debug(scope: &str, msg: &str) {
    log_at(Level::Debug, scope, msg);
}

/// Operational milestones: listener bound, connection established.
pub fn info(scope: &str, msg: &str) {
    log_at(Level::Info, scope, msg);
}

/// Recoverable anomalies: unexpected socket errors, dropped connections.
pub fn warn(scope: &str, msg: &str) {
    log_at(Level::Warn, scope, msg);
}

/// Failed writes, failed archives.
pub fn error(scope: &str, msg: &str) {
    log_at(Level::Error, scope, msg);
}
