//! The process-owning logger: holds the outputs, writes records, archives the
//! log directory, and serves worker loggers.

use super::{ForkMessage, LogEvent, Logger, capture_log_stack, child_context};
use crate::archive::{ArchiveCallback, ArchiveOutcome, ArchiveRequest, LogArchiver};
use crate::config::LoggerConfig;
use crate::error::Error;
use crate::identity::ProcessIdentity;
use crate::internal;
use crate::level::Level;
use crate::output::{ConsoleOutput, Output, RollingFileOutput};
use crate::record::{LogRecord, Payload, RESERVED_FIELDS, now_ms};
use crate::remote::RemoteOutput;
use crate::sync::{lock, read, write};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::thread;

/// Context of a root logger created without one.
pub const DEFAULT_ROOT_CONTEXT: &str = "master";

/// Files whose contents are archived but which are truncated instead of deleted.
const CLEARED_FILES: &[&str] = &["err.log", "forever.log"];

struct Root {
    group_id: String,
    identity: ProcessIdentity,
    level: AtomicU8,
    base_log: RwLock<Map<String, Value>>,
    outputs: RwLock<Vec<Arc<dyn Output>>>,
    rolling_file: RwLock<Option<Arc<RollingFileOutput>>>,
    archiver: LogArchiver,
    forks: Mutex<Vec<Sender<ForkMessage>>>,
    subscribers: Mutex<Vec<Sender<LogEvent>>>,
}

/// Root or child logger of the owning process. Clones are cheap and share everything.
#[derive(Clone)]
pub struct MasterLogger {
    root: Arc<Root>,
    context: String,
    is_root: bool,
}

impl MasterLogger {
    /// Root logger with context `master`, level trace and no outputs until configured.
    #[must_use]
    pub fn new(group_id: impl Into<String>, identity: ProcessIdentity) -> Self {
        Self::with_context(group_id, identity, DEFAULT_ROOT_CONTEXT)
    }

    #[must_use]
    pub fn with_context(
        group_id: impl Into<String>,
        identity: ProcessIdentity,
        context: impl Into<String>,
    ) -> Self {
        Self {
            root: Arc::new(Root {
                group_id: group_id.into(),
                identity,
                level: AtomicU8::new(Level::Trace.to_number()),
                base_log: RwLock::new(Map::new()),
                outputs: RwLock::new(Vec::new()),
                rolling_file: RwLock::new(None),
                archiver: LogArchiver::new(),
                forks: Mutex::new(Vec::new()),
                subscribers: Mutex::new(Vec::new()),
            }),
            context: context.into(),
            is_root: true,
        }
    }

    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.is_root
    }

    #[must_use]
    pub fn identity(&self) -> &ProcessIdentity {
        &self.root.identity
    }

    /// Replaces the outputs, level and base log. Outputs are built before the
    /// old ones are ended, so a failed configure leaves the logger as it was.
    ///
    /// # Errors
    /// [`Error::NotRoot`] on a child, a reserved base-log key, an unusable log
    /// directory, or remote endpoints configured outside a tokio runtime.
    pub fn configure(&self, config: &LoggerConfig) -> Result<(), Error> {
        if !self.is_root {
            return Err(Error::NotRoot(self.context.clone()));
        }
        if let Some(key) = config
            .base_log
            .keys()
            .find(|key| RESERVED_FIELDS.contains(&key.as_str()))
        {
            return Err(Error::InvalidConfig(format!(
                "base_log may not set reserved field '{key}'"
            )));
        }

        let mut outputs: Vec<Arc<dyn Output>> = Vec::new();
        if config.console.enabled {
            outputs.push(Arc::new(ConsoleOutput::new(&config.console)));
        }

        let rolling_file = if config.rolling_file.enabled {
            let weak = Arc::downgrade(&self.root);
            let group_id = self.root.group_id.clone();
            let rolling = Arc::new(RollingFileOutput::new(&config.rolling_file)?.with_archive_fn(
                Arc::new(move || archive_from_rollover(&weak, &group_id)),
            ));
            outputs.push(Arc::clone(&rolling) as Arc<dyn Output>);
            Some(rolling)
        } else {
            None
        };

        let remote = &config.remote_log;
        if remote.enabled && !(remote.listen.is_empty() && remote.connect.is_empty()) {
            let output = RemoteOutput::new(remote)?;
            output.spawn_init(remote.clone());
            outputs.push(Arc::new(output));
        }

        let previous = std::mem::replace(&mut *write(&self.root.outputs), outputs);
        for output in &previous {
            output.end();
        }
        *write(&self.root.rolling_file) = rolling_file;
        *write(&self.root.base_log) = config.base_log.clone();
        self.set_level(config.level);

        internal::debug(
            "LOGGER",
            &format!(
                "Configured '{}' at level {} with {} outputs",
                self.root.group_id,
                config.level,
                read(&self.root.outputs).len()
            ),
        );
        self.broadcast_level();
        Ok(())
    }

    /// Adds an output alongside the configured ones.
    pub fn add_output(&self, output: Arc<dyn Output>) {
        write(&self.root.outputs).push(output);
    }

    /// Ends every output; the logger keeps working with none.
    pub fn end(&self) {
        let outputs = std::mem::take(&mut *write(&self.root.outputs));
        for output in &outputs {
            output.end();
        }
        *write(&self.root.rolling_file) = None;
    }

    /// Receives an event for every record written anywhere in this tree,
    /// including records forwarded by workers.
    #[must_use]
    pub fn subscribe(&self) -> Receiver<LogEvent> {
        let (tx, rx) = std::sync::mpsc::channel();
        lock(&self.root.subscribers).push(tx);
        rx
    }

    /// Archives the log directory into `archive.{YYYY-MM-DD}.{now ms}.tar.gz`
    /// inside it. Compressed files and the file currently being written are
    /// left alone, `err.log` and `forever.log` are truncated, everything else
    /// is deleted. Returns the target path, or `None` when an archive is
    /// already running.
    pub fn archive(&self, callback: Option<ArchiveCallback>) -> Option<PathBuf> {
        if self.root.archiver.is_busy() {
            if let Some(callback) = callback {
                callback(ArchiveOutcome::Busy);
            }
            return None;
        }

        let rolling = read(&self.root.rolling_file).clone();
        let source_dir = rolling
            .as_ref()
            .map_or_else(|| PathBuf::from("./logs"), |r| r.log_dir().to_path_buf());
        let ymd = chrono::Utc::now().format("%Y-%m-%d");
        let target = source_dir.join(format!("archive.{ymd}.{}.tar.gz", now_ms()));

        let mut request = ArchiveRequest::new(&target, true)
            .source_dir(&source_dir)
            .ignore(move |path| {
                let current = rolling.as_ref().and_then(|r| r.current_file());
                path.extension().is_some_and(|ext| ext == "gz")
                    || current.is_some_and(|c| c.file_name() == path.file_name())
            })
            .clear(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| CLEARED_FILES.contains(&name))
            });
        if let Some(callback) = callback {
            request = request.on_complete(callback);
        }

        self.root.archiver.archive(request).then_some(target)
    }

    #[must_use]
    pub fn is_archiving(&self) -> bool {
        self.root.archiver.is_busy()
    }

    /// Handles one message from a worker. Returns the reply to send back, if any.
    pub fn handle_fork_message(&self, message: ForkMessage) -> Option<ForkMessage> {
        if message.group_id() != self.root.group_id {
            return None;
        }
        match message {
            ForkMessage::Log {
                process,
                pid,
                context_name,
                level,
                log,
                log_stack,
                ..
            } => {
                self.write_record(&process, pid, &context_name, level, log, log_stack);
                None
            }
            ForkMessage::LevelRequest { .. } => Some(self.level_message()),
            ForkMessage::LoggerLevel { .. } => None,
        }
    }

    /// Serves a worker on a background thread: its messages arrive on `rx`,
    /// replies and later level changes go out on `tx`.
    pub fn listen_to_fork(
        &self,
        rx: Receiver<ForkMessage>,
        tx: Sender<ForkMessage>,
    ) -> std::io::Result<thread::JoinHandle<()>> {
        lock(&self.root.forks).push(tx.clone());
        let logger = self.clone();
        thread::Builder::new()
            .name("relaylog-fork".into())
            .spawn(move || {
                for message in rx {
                    if let Some(reply) = logger.handle_fork_message(message)
                        && tx.send(reply).is_err()
                    {
                        break;
                    }
                }
                internal::debug("LOGGER", "Fork channel closed");
            })
    }

    fn level_message(&self) -> ForkMessage {
        ForkMessage::LoggerLevel {
            group_id: self.root.group_id.clone(),
            level: self.level(),
        }
    }

    fn broadcast_level(&self) {
        let message = self.level_message();
        lock(&self.root.forks).retain(|tx| tx.send(message.clone()).is_ok());
    }

    fn write_record(
        &self,
        process: &str,
        pid: u32,
        context: &str,
        level: Level,
        payload: Payload,
        log_stack: Option<Vec<String>>,
    ) {
        let mut record = LogRecord::new(&self.root.identity, context, level, payload);
        record.process = process.to_string();
        record.pid = pid;
        record.log_stack = log_stack;
        record.extra = read(&self.root.base_log).clone();

        match record.to_json_line() {
            Ok(line) => {
                for output in read(&self.root.outputs).iter() {
                    let _ = output.write(level, &line, &record);
                }
            }
            Err(e) => internal::error("LOGGER", &format!("Failed to serialize record: {e}")),
        }

        self.emit(record);
    }

    fn emit(&self, record: LogRecord) {
        let mut subscribers = lock(&self.root.subscribers);
        if subscribers.is_empty() {
            return;
        }
        let event = LogEvent {
            context: record.context,
            level: record.level,
            message: record.log,
            log_stack: record.log_stack,
        };
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Directory the rolling file output writes to, when configured.
    #[must_use]
    pub fn log_dir(&self) -> Option<PathBuf> {
        read(&self.root.rolling_file)
            .as_ref()
            .map(|r| r.log_dir().to_path_buf())
    }

    /// File the rolling output is currently writing.
    #[must_use]
    pub fn current_log_file(&self) -> Option<PathBuf> {
        read(&self.root.rolling_file)
            .as_ref()
            .and_then(|r| r.current_file())
    }
}

fn archive_from_rollover(root: &Weak<Root>, group_id: &str) {
    let Some(root) = root.upgrade() else {
        return;
    };
    let logger = MasterLogger {
        root,
        context: DEFAULT_ROOT_CONTEXT.to_string(),
        is_root: true,
    };
    let group_id = group_id.to_string();
    let started = logger.archive(Some(Box::new(move |outcome| match outcome {
        ArchiveOutcome::Done => {
            internal::debug("LOGGER", &format!("Rollover archive for '{group_id}' done"));
        }
        ArchiveOutcome::Busy => {}
        ArchiveOutcome::Failed(e) => {
            internal::error("LOGGER", &format!("Rollover archive failed: {e}"));
        }
    })));
    if let Some(target) = started {
        internal::info("LOGGER", &format!("Archiving logs to {}", target.display()));
    }
}

impl Logger for MasterLogger {
    fn group_id(&self) -> &str {
        &self.root.group_id
    }

    fn context_name(&self) -> &str {
        &self.context
    }

    fn level(&self) -> Level {
        Level::from_number(self.root.level.load(Ordering::Relaxed)).unwrap_or_default()
    }

    fn set_level(&self, level: Level) {
        self.root.level.store(level.to_number(), Ordering::Relaxed);
    }

    fn create_logger(&self, name: &str) -> Self {
        Self {
            root: Arc::clone(&self.root),
            context: child_context(&self.context, name),
            is_root: false,
        }
    }

    fn log(&self, level: Level, payload: Payload) {
        if !level.can_log(self.level()) {
            return;
        }
        let log_stack = (level == Level::Error).then(capture_log_stack);
        let identity = &self.root.identity;
        self.write_record(
            &identity.process,
            identity.pid,
            &self.context,
            level,
            payload,
            log_stack,
        );
    }
}
