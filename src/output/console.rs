//! Colored terminal output; errors go to stderr, everything else to stdout.

use super::Output;
use crate::config::ConsoleConfig;
use crate::level::Level;
use crate::record::LogRecord;
use crate::render::RecordRenderer;
use std::io::{self, Write};

#[derive(Debug, Clone)]
pub struct ConsoleOutput {
    enabled: bool,
    min_level: Level,
    renderer: RecordRenderer,
}

impl Default for ConsoleOutput {
    fn default() -> Self {
        Self::new(&ConsoleConfig::default())
    }
}

impl ConsoleOutput {
    #[must_use]
    pub fn new(config: &ConsoleConfig) -> Self {
        Self {
            enabled: config.enabled,
            min_level: config.level,
            renderer: RecordRenderer::new()
                .colors(config.colors)
                .time_format(&config.time_format)
                .tags(config.tags.iter().cloned())
                .exclude_properties(config.exclude_properties.iter().cloned()),
        }
    }

    /// The line `write` would print, without the newline.
    ///
    /// # Errors
    /// Only if the record cannot be converted to JSON.
    pub fn render_record(&self, record: &LogRecord) -> Result<String, crate::Error> {
        let value = serde_json::to_value(record)?;
        Ok(self.renderer.render(&value))
    }
}

impl Output for ConsoleOutput {
    fn name(&self) -> &'static str {
        "console"
    }

    fn write(&self, level: Level, serialized: &str, record: &LogRecord) -> Result<(), crate::Error> {
        if serialized.is_empty() || !self.enabled || !level.can_log(self.min_level) {
            return Ok(());
        }

        let line = self.render_record(record)?;
        if level == Level::Error {
            writeln!(io::stderr(), "{line}")?;
        } else {
            writeln!(io::stdout(), "{line}")?;
        }
        Ok(())
    }
}
