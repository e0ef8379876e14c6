//! Sinks a logger fans each record out to.
//!
//! The record is serialized once by the logger; every output receives both the
//! JSON line and the structured record so file and network sinks can write the
//! line verbatim while the console renders the fields.

mod console;
mod rolling;

pub use console::ConsoleOutput;
pub use rolling::{ARCHIVE_DELAY, ArchiveFn, Clock, MS_PER_DAY, RollingFileOutput, SystemClock};

use crate::level::Level;
use crate::record::LogRecord;

/// `Send + Sync` so one set of outputs can serve loggers on any thread.
pub trait Output: Send + Sync {
    /// Stable name used in configuration (`console`, `rollingFile`, `remoteLog`).
    fn name(&self) -> &'static str;

    /// Writes one record. Outputs filter by their own minimum level, so a
    /// record below it is accepted and dropped.
    ///
    /// # Errors
    /// I/O errors from the underlying sink. The output stays usable afterwards.
    fn write(&self, level: Level, serialized: &str, record: &LogRecord) -> Result<(), crate::Error>;

    /// Releases handles; called when a logger is reconfigured. Must be idempotent.
    fn end(&self) {}
}
