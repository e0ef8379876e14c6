//! `relaylog` - process logging with rolling files, TCP log streams and a
//! history-keeping relay.
//!
//! - Hierarchical loggers (`master.db.pool`) with per-tree levels
//! - Outputs: colored console, day/size rolling files with archival, TCP fan-out
//! - A relay that collects records from many producers and replays recent
//!   history to every consumer that connects
//! - Worker loggers that forward records to the owning process over a channel
//!
//! # Example
//!
//! ```
//! use relaylog::{ConsoleOutput, Logger, MasterLogger, ProcessIdentity};
//! use std::sync::Arc;
//!
//! let identity = ProcessIdentity::new("box", "10.0.0.2", "svc", "api", 4242);
//! let logger = MasterLogger::new("api", identity);
//! logger.add_output(Arc::new(ConsoleOutput::default()));
//!
//! let db = logger.create_logger("db");
//! assert_eq!(db.context_name(), "master.db");
//! db.info("connected");
//! db.warn(serde_json::json!({"msg": "slow query", "ms": 120}));
//! ```
//!
//! # Features
//!
//! - `cli` (default): the `relaylog` binary's argument parsing and subcommands

pub mod archive;
pub mod client;
pub mod config;
pub mod error;
pub mod identity;
pub mod internal;
pub mod level;
pub mod logger;
pub mod output;
pub mod record;
pub mod relay;
pub mod remote;
pub mod render;

mod sync;

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;

// Re-exports for convenience
pub use archive::{ArchiveOutcome, ArchiveRequest, LogArchiver};
pub use config::{Config, LoggerConfig};
pub use error::Error;
pub use identity::ProcessIdentity;
pub use level::Level;
pub use logger::{ForkLogger, ForkMessage, LogEvent, Logger, MasterLogger};
pub use output::{Clock, ConsoleOutput, Output, RollingFileOutput, SystemClock};
pub use record::{LogRecord, Payload};
pub use relay::{HistoryRing, LineBuffer, RelayHandle, RelayServer};
pub use remote::{Listener, RemoteOutput};
pub use render::RecordRenderer;
