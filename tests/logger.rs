//! Tests for master and worker loggers.

use relaylog::config::{ConsoleConfig, LoggerConfig, RollingFileConfig};
use relaylog::{
    ArchiveOutcome, Error, ForkLogger, ForkMessage, Level, LogRecord, Logger, MasterLogger,
    Output, Payload, ProcessIdentity,
};
use serde_json::{Map, Value, json};
use std::fs;
use std::path::Path;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(10);

#[derive(Default)]
struct MemoryOutput {
    lines: Mutex<Vec<String>>,
}

impl MemoryOutput {
    fn records(&self) -> Vec<LogRecord> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .map(|l| LogRecord::from_json_line(l).unwrap())
            .collect()
    }
}

impl Output for MemoryOutput {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn write(&self, _level: Level, serialized: &str, _record: &LogRecord) -> Result<(), Error> {
        self.lines.lock().unwrap().push(serialized.to_string());
        Ok(())
    }
}

fn identity() -> ProcessIdentity {
    ProcessIdentity::new("box", "10.0.0.2", "svc", "api", 4242)
}

fn master_with_memory() -> (MasterLogger, Arc<MemoryOutput>) {
    let logger = MasterLogger::new("api", identity());
    let memory = Arc::new(MemoryOutput::default());
    logger.add_output(Arc::clone(&memory) as Arc<dyn Output>);
    (logger, memory)
}

fn file_config(dir: &Path, level: Level) -> LoggerConfig {
    LoggerConfig {
        level,
        console: ConsoleConfig {
            enabled: false,
            ..ConsoleConfig::default()
        },
        rolling_file: RollingFileConfig {
            auto_archive: false,
            log_dir: dir.to_string_lossy().into_owned(),
            file: "api".to_string(),
            ..RollingFileConfig::default()
        },
        ..LoggerConfig::default()
    }
}

#[test]
fn child_contexts_are_dotted() {
    let logger = MasterLogger::new("api", identity());
    assert!(logger.is_root());
    assert_eq!(logger.context_name(), "master");

    let db = logger.create_logger("db");
    let pool = db.create_logger("pool");
    assert!(!db.is_root());
    assert_eq!(db.context_name(), "master.db");
    assert_eq!(pool.context_name(), "master.db.pool");
    assert_eq!(pool.group_id(), "api");

    let bare = MasterLogger::with_context("api", identity(), "");
    assert_eq!(bare.create_logger("db").context_name(), "db");
}

#[test]
fn records_carry_identity_and_context() {
    let (logger, memory) = master_with_memory();
    logger.create_logger("db").info("connected");

    let records = memory.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.context, "master.db");
    assert_eq!(record.level, Level::Info);
    assert_eq!(record.host, "box");
    assert_eq!(record.ip, "10.0.0.2");
    assert_eq!(record.user, "svc");
    assert_eq!(record.process, "api");
    assert_eq!(record.pid, 4242);
    assert_eq!(record.log, Payload::Text("connected".into()));
    assert!(record.log_stack.is_none());
}

#[test]
fn level_is_shared_across_the_tree() {
    let (logger, memory) = master_with_memory();
    let child = logger.create_logger("worker");

    child.set_level(Level::Warn);
    assert_eq!(logger.level(), Level::Warn);
    assert!(!logger.can_info());
    assert!(logger.can_warn());
    assert!(logger.can_error());

    child.debug("hidden");
    child.info("hidden");
    child.warn("shown");
    child.special("always");

    let levels: Vec<Level> = memory.records().iter().map(|r| r.level).collect();
    assert_eq!(levels, vec![Level::Warn, Level::Special]);
}

#[test]
fn error_records_carry_a_stack() {
    let (logger, memory) = master_with_memory();
    logger.error("boom");

    let record = &memory.records()[0];
    assert!(record.log_stack.as_ref().is_some_and(|s| !s.is_empty()));
}

#[test]
fn structured_payloads_keep_their_fields() {
    let (logger, memory) = master_with_memory();
    logger.warn(json!({"msg": "slow query", "ms": 120}));

    let record = &memory.records()[0];
    assert_eq!(record.message().as_deref(), Some("slow query"));
    match &record.log {
        Payload::Fields(fields) => assert_eq!(fields["ms"], json!(120)),
        other => panic!("expected fields, got {other:?}"),
    }
}

#[test]
fn configure_on_child_is_refused() {
    let logger = MasterLogger::new("api", identity());
    let child = logger.create_logger("db");

    let result = child.configure(&LoggerConfig::default());
    assert!(matches!(result, Err(Error::NotRoot(ctx)) if ctx == "master.db"));
}

#[test]
fn configure_rejects_reserved_base_log_keys() {
    let temp = TempDir::new().unwrap();
    let logger = MasterLogger::new("api", identity());
    let mut config = file_config(temp.path(), Level::Info);
    config.base_log.insert("level".into(), json!("x"));

    assert!(matches!(
        logger.configure(&config),
        Err(Error::InvalidConfig(_))
    ));
    assert!(logger.log_dir().is_none());
}

#[test]
fn configure_writes_files_with_base_log() {
    let temp = TempDir::new().unwrap();
    let logger = MasterLogger::new("api", identity());
    let mut config = file_config(temp.path(), Level::Info);
    config.base_log = Map::from_iter([("service".to_string(), Value::from("billing"))]);
    logger.configure(&config).unwrap();

    assert_eq!(logger.level(), Level::Info);
    assert_eq!(logger.log_dir().as_deref(), Some(temp.path()));

    logger.debug("dropped");
    logger.info("written");

    let path = logger.current_log_file().unwrap();
    let content = fs::read_to_string(path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 1);
    let record = LogRecord::from_json_line(lines[0]).unwrap();
    assert_eq!(record.message().as_deref(), Some("written"));
    assert_eq!(record.extra["service"], json!("billing"));
}

#[test]
fn reconfigure_replaces_outputs() {
    let temp = TempDir::new().unwrap();
    let (logger, memory) = master_with_memory();
    logger.configure(&file_config(temp.path(), Level::Trace)).unwrap();

    logger.info("after");
    assert!(memory.records().is_empty());

    logger.end();
    assert!(logger.current_log_file().is_none());
    logger.info("no outputs, no panic");
}

#[test]
fn subscribers_see_every_record() {
    let (logger, _memory) = master_with_memory();
    let events = logger.subscribe();

    logger.create_logger("http").warn("slow");

    let event = events.recv_timeout(WAIT).unwrap();
    assert_eq!(event.context, "master.http");
    assert_eq!(event.level, Level::Warn);
    assert_eq!(event.message, Payload::Text("slow".into()));
}

#[test]
fn fork_logger_follows_master_level_and_forwards_records() {
    let (logger, memory) = master_with_memory();
    logger.set_level(Level::Info);
    let events = logger.subscribe();

    let (to_master, master_rx) = mpsc::channel();
    let (to_worker, worker_rx) = mpsc::channel();
    let serving = logger.listen_to_fork(master_rx, to_worker).unwrap();

    let worker_identity = ProcessIdentity::new("box", "10.0.0.2", "svc", "worker", 5151);
    let worker = ForkLogger::new("api", &worker_identity, to_master);
    assert_eq!(worker.level(), Level::Trace);

    let reply = worker_rx.recv_timeout(WAIT).unwrap();
    assert_eq!(
        reply,
        ForkMessage::LoggerLevel {
            group_id: "api".into(),
            level: Level::Info
        }
    );
    assert!(worker.apply_message(&reply));
    assert_eq!(worker.level(), Level::Info);

    let job = worker.create_logger("job");
    assert_eq!(job.context_name(), "job");
    job.debug("filtered in the worker");
    job.info("from worker");

    let event = events.recv_timeout(WAIT).unwrap();
    assert_eq!(event.context, "job");
    assert_eq!(event.message, Payload::Text("from worker".into()));

    let forwarded = memory.records();
    assert_eq!(forwarded.len(), 1);
    assert_eq!(forwarded[0].process, "worker");
    assert_eq!(forwarded[0].pid, 5151);
    assert_eq!(forwarded[0].host, "box");

    drop(worker);
    drop(job);
    serving.join().unwrap();
}

#[test]
fn configure_broadcasts_level_to_workers() {
    let temp = TempDir::new().unwrap();
    let logger = MasterLogger::new("api", identity());
    let (_to_master, master_rx) = mpsc::channel();
    let (to_worker, worker_rx) = mpsc::channel();
    let _serving = logger.listen_to_fork(master_rx, to_worker).unwrap();

    logger.configure(&file_config(temp.path(), Level::Error)).unwrap();

    let message = worker_rx.recv_timeout(WAIT).unwrap();
    assert_eq!(
        message,
        ForkMessage::LoggerLevel {
            group_id: "api".into(),
            level: Level::Error
        }
    );
}

#[test]
fn messages_for_other_groups_are_ignored() {
    let (logger, memory) = master_with_memory();

    let reply = logger.handle_fork_message(ForkMessage::LevelRequest {
        group_id: "other".into(),
    });
    assert!(reply.is_none());

    logger.handle_fork_message(ForkMessage::Log {
        group_id: "other".into(),
        process: "x".into(),
        pid: 1,
        context_name: "x".into(),
        level: Level::Error,
        log: Payload::Text("nope".into()),
        log_stack: None,
    });
    assert!(memory.records().is_empty());
}

#[test]
fn fork_messages_use_tagged_wire_names() {
    let message = ForkMessage::LoggerLevel {
        group_id: "api".into(),
        level: Level::Warn,
    };
    let value = serde_json::to_value(&message).unwrap();
    assert_eq!(
        value,
        json!({"type": "logger-level", "groupId": "api", "level": "warn"})
    );
}

#[test]
fn archive_skips_current_file_and_clears_error_log() {
    let temp = TempDir::new().unwrap();
    let logger = MasterLogger::new("api", identity());
    logger.configure(&file_config(temp.path(), Level::Trace)).unwrap();
    logger.info("current");

    let current = logger.current_log_file().unwrap();
    fs::write(temp.path().join("api.2024-01-01.1.00.log"), "old\n").unwrap();
    fs::write(temp.path().join("err.log"), "bad\n").unwrap();

    let (tx, rx) = mpsc::channel();
    let target = logger
        .archive(Some(Box::new(move |outcome| {
            let _ = tx.send(outcome);
        })))
        .unwrap();
    assert!(matches!(rx.recv_timeout(WAIT).unwrap(), ArchiveOutcome::Done));
    assert!(!logger.is_archiving());

    assert!(target.starts_with(temp.path()));
    assert!(target.exists());
    assert!(current.exists());
    assert!(!temp.path().join("api.2024-01-01.1.00.log").exists());
    assert_eq!(fs::read_to_string(temp.path().join("err.log")).unwrap(), "");
}
