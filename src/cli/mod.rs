//! CLI module for relaylog.
//!
//! Clap definitions live here; each subcommand's handler lives in `commands`.

pub mod commands;
pub mod util;

use crate::level::Level;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// relaylog - ship, relay and read newline-delimited JSON logs.
#[derive(Parser)]
#[command(
    name = "relaylog",
    version,
    about = "Ship, relay and read newline-delimited JSON logs"
)]
pub struct Cli {
    /// Config file (default: ~/.config/relaylog/relaylog.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Threshold for relaylog's own diagnostics on stderr
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<Level>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Run a relay: accept producers on the input side, serve consumers on the output side.
    Relay {
        /// Input listen host
        input_host: Option<String>,
        /// Input listen port
        input_port: Option<u32>,
        /// Output listen host
        output_host: Option<String>,
        /// Output listen port
        output_port: Option<u32>,
    },
    /// Connect to a relay or log listener and print what it sends.
    Client {
        /// Server host
        host: Option<String>,
        /// Server port
        port: Option<u32>,
        /// Disable colors
        #[arg(long)]
        no_color: bool,
    },
    /// Pack a log directory into a .tar.gz.
    Archive {
        /// Directory to archive
        #[arg(long, value_name = "DIR")]
        source: Option<PathBuf>,
        /// Archive file to write
        #[arg(long, value_name = "FILE")]
        target: Option<PathBuf>,
        /// Keep archived files instead of deleting them
        #[arg(long)]
        keep: bool,
    },
    /// Read records (JSON lines or plain text) from stdin and send them to log consumers.
    Stream {
        /// Consumer to dial, as HOST:PORT (repeatable)
        #[arg(long, value_name = "HOST:PORT")]
        connect: Vec<String>,
        /// Address to accept consumers on, as HOST:PORT (repeatable)
        #[arg(long, value_name = "HOST:PORT")]
        listen: Vec<String>,
        /// Level of plain-text lines
        #[arg(long, default_value = "info")]
        level: Level,
        /// Context of plain-text lines
        #[arg(long, default_value = "stream")]
        context: String,
    },
    /// Print the version.
    Version,
}

pub use commands::{cmd_archive, cmd_client, cmd_relay, cmd_stream};
pub use util::{build_runtime, parse_endpoint};
