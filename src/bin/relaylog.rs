//! `relaylog` binary.
//!
//! Usage:
//!   relaylog relay [input_host] [input_port] [output_host] [output_port]
//!   relaylog client [host] [port]
//!   relaylog archive [--source DIR] [--target FILE] [--keep]
//!   relaylog stream --connect HOST:PORT [--listen HOST:PORT] [--level LEVEL]
//!   relaylog version

use clap::Parser;
use relaylog::cli::{Cli, Command, cmd_archive, cmd_client, cmd_relay, cmd_stream};
use relaylog::config::Config;
use relaylog::internal;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let config = match loaded.and_then(|c| c.validate().map(|()| c)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            return ExitCode::FAILURE;
        }
    };

    internal::init(cli.log_level.unwrap_or(config.general.internal_level));

    match cli.command {
        Command::Relay {
            input_host,
            input_port,
            output_host,
            output_port,
        } => cmd_relay(&config, input_host, input_port, output_host, output_port),
        Command::Client {
            host,
            port,
            no_color,
        } => cmd_client(&config, host, port, no_color),
        Command::Archive {
            source,
            target,
            keep,
        } => cmd_archive(&config, source, target, keep),
        Command::Stream {
            connect,
            listen,
            level,
            context,
        } => cmd_stream(&config, &connect, &listen, level, &context),
        Command::Version => {
            println!("relaylog {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
    }
}
