//! `relaylog relay`: runs until interrupted.

use crate::cli::util::build_runtime;
use crate::config::Config;
use crate::identity::ProcessIdentity;
use crate::internal;
use crate::relay::RelayServer;
use std::process::ExitCode;

/// Positional arguments override the `[relay]` section.
#[must_use]
pub fn cmd_relay(
    config: &Config,
    input_host: Option<String>,
    input_port: Option<u32>,
    output_host: Option<String>,
    output_port: Option<u32>,
) -> ExitCode {
    let mut relay_config = config.relay.clone();
    if let Some(host) = input_host {
        relay_config.input_host = host;
    }
    if let Some(port) = input_port {
        relay_config.input_port = port;
    }
    if let Some(host) = output_host {
        relay_config.output_host = host;
    }
    if let Some(port) = output_port {
        relay_config.output_port = port;
    }

    let runtime = match build_runtime() {
        Ok(rt) => rt,
        Err(e) => {
            internal::error("RELAY", &format!("Failed to start runtime: {e}"));
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(async move {
        let server = RelayServer::new(relay_config, ProcessIdentity::resolve());
        let handle = match server.start().await {
            Ok(handle) => handle,
            Err(e) => {
                internal::error("RELAY", &format!("Failed to start relay: {e}"));
                return ExitCode::FAILURE;
            }
        };
        println!(
            "relay: inputs on {}, outputs on {}",
            handle.input_addr(),
            handle.output_addr()
        );

        if let Err(e) = tokio::signal::ctrl_c().await {
            internal::warn("RELAY", &format!("Signal handler failed: {e}"));
        }
        internal::info("RELAY", "Shutting down");
        handle.shutdown().await;
        ExitCode::SUCCESS
    })
}
