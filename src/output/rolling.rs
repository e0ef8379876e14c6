//! Append-only log files that roll over on a new UTC day or once a size
//! threshold is crossed, handing finished days to the archiver.

use super::Output;
use crate::config::RollingFileConfig;
use crate::internal;
use crate::level::Level;
use crate::record::{LogRecord, now_ms};
use crate::sync::lock;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

pub const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Time between a day rollover and the archive callback, so the closed file can settle.
pub const ARCHIVE_DELAY: Duration = Duration::from_secs(7);

/// Called after a day rollover to archive the previous day's files.
pub type ArchiveFn = Arc<dyn Fn() + Send + Sync>;

/// Source of "now" for rotation decisions; swapped out in tests to simulate day changes.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;

    /// Start of the current UTC day in epoch milliseconds.
    fn day_start_ms(&self) -> i64 {
        let now = self.now_ms();
        now - now.rem_euclid(MS_PER_DAY)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        now_ms()
    }
}

#[derive(Debug, Default)]
struct RotationState {
    /// Day of the open file; 0 before the first write.
    day_start: i64,
    roll_count: u32,
    /// Roll count the next write should use. Bumped by the size check, reset by a day change.
    pending_roll: u32,
    written_bytes: u64,
    current_path: Option<PathBuf>,
    file: Option<File>,
}

pub struct RollingFileOutput {
    enabled: bool,
    auto_archive: bool,
    min_level: Level,
    log_dir: PathBuf,
    file_prefix: String,
    max_bytes: u64,
    start_time: i64,
    clock: Arc<dyn Clock>,
    archive_fn: Option<ArchiveFn>,
    state: Mutex<RotationState>,
}

impl RollingFileOutput {
    /// Creates the log directory up front so a bad path fails at configuration time.
    ///
    /// # Errors
    /// The log directory cannot be created.
    pub fn new(config: &RollingFileConfig) -> Result<Self, crate::Error> {
        let log_dir = PathBuf::from(shellexpand::tilde(&config.log_dir).as_ref());
        fs::create_dir_all(&log_dir)?;
        internal::debug(
            "FILE",
            &format!("Rolling file output in {}", log_dir.display()),
        );

        Ok(Self {
            enabled: config.enabled,
            auto_archive: config.auto_archive,
            min_level: config.level,
            log_dir,
            file_prefix: config.file.clone(),
            max_bytes: config.max_size_mb.saturating_mul(1024 * 1024),
            start_time: now_ms(),
            clock: Arc::new(SystemClock),
            archive_fn: None,
            state: Mutex::new(RotationState::default()),
        })
    }

    #[must_use]
    pub fn with_archive_fn(mut self, archive_fn: ArchiveFn) -> Self {
        self.archive_fn = Some(archive_fn);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// File currently being written, `None` before the first write.
    #[must_use]
    pub fn current_file(&self) -> Option<PathBuf> {
        self.lock().current_path.clone()
    }

    /// Size-triggered rollovers within the current day.
    #[must_use]
    pub fn roll_count(&self) -> u32 {
        self.lock().roll_count
    }

    #[must_use]
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Millisecond timestamp embedded in every file name of this process.
    #[must_use]
    pub const fn start_time(&self) -> i64 {
        self.start_time
    }

    /// `{log_dir}/{file}.{YYYY-MM-DD}.{start ms}.{roll:02}.log`
    #[must_use]
    pub fn file_path(&self, day_start: i64, roll_count: u32) -> PathBuf {
        let ymd = chrono::DateTime::from_timestamp_millis(day_start)
            .map_or_else(|| day_start.to_string(), |d| d.format("%Y-%m-%d").to_string());
        self.log_dir.join(format!(
            "{}.{ymd}.{}.{roll_count:02}.log",
            self.file_prefix, self.start_time
        ))
    }

    fn lock(&self) -> MutexGuard<'_, RotationState> {
        lock(&self.state)
    }

    fn schedule_archive(&self) {
        let Some(archive_fn) = self.archive_fn.clone() else {
            return;
        };
        let spawned = thread::Builder::new()
            .name("relaylog-archive".into())
            .spawn(move || {
                thread::sleep(ARCHIVE_DELAY);
                archive_fn();
            });
        if let Err(e) = spawned {
            internal::error("FILE", &format!("Failed to schedule archive: {e}"));
        }
    }
}

impl Output for RollingFileOutput {
    fn name(&self) -> &'static str {
        "rollingFile"
    }

    fn write(&self, level: Level, serialized: &str, _record: &LogRecord) -> Result<(), crate::Error> {
        if serialized.is_empty() || !self.enabled || !level.can_log(self.min_level) {
            return Ok(());
        }

        let mut state = self.lock();
        let today = self.clock.day_start_ms();

        if self.max_bytes > 0 && state.written_bytes >= self.max_bytes {
            state.pending_roll += 1;
            state.written_bytes = 0;
        }

        // A new day discards a size roll detected in the same check.
        let day_changed = today != state.day_start;
        if day_changed {
            state.pending_roll = 0;
        }
        let roll_changed = state.pending_roll != state.roll_count;

        if state.file.is_none() || day_changed || roll_changed {
            state.file = None;
            state.day_start = today;
            state.roll_count = state.pending_roll;

            let path = self.file_path(today, state.roll_count);
            internal::debug("FILE", &format!("Opening {}", path.display()));
            state.current_path = Some(path.clone());

            if day_changed && self.auto_archive {
                self.schedule_archive();
            }

            match OpenOptions::new().create(true).append(true).open(&path) {
                Ok(file) => state.file = Some(file),
                Err(e) => {
                    internal::error(
                        "FILE",
                        &format!("Failed to open log file {}: {e}", path.display()),
                    );
                    return Err(e.into());
                }
            }
        }

        state.written_bytes += serialized.len() as u64;

        let mut line = String::with_capacity(serialized.len() + 1);
        line.push_str(serialized);
        line.push('\n');

        let result = match state.file.as_mut() {
            Some(file) => file.write_all(line.as_bytes()),
            None => Ok(()),
        };
        if let Err(e) = result {
            internal::error("FILE", &format!("Failed to write log line: {e}; {serialized}"));
            // Reopened on the next write.
            state.file = None;
            return Err(e.into());
        }
        Ok(())
    }

    fn end(&self) {
        let mut state = self.lock();
        if let Some(mut file) = state.file.take() {
            let _ = file.flush();
        }
    }
}
