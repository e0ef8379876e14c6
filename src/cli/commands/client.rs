use crate::cli::util::build_runtime;
use crate::client;
use crate::config::Config;
use crate::internal;
use std::io;
use std::process::ExitCode;

/// Prints records until the server closes the connection.
#[must_use]
pub fn cmd_client(
    config: &Config,
    host: Option<String>,
    port: Option<u32>,
    no_color: bool,
) -> ExitCode {
    let mut client_config = config.client.clone();
    if let Some(host) = host {
        client_config.host = host;
    }
    if let Some(port) = port {
        client_config.port = port;
    }
    if no_color {
        client_config.colors = false;
    }

    let runtime = match build_runtime() {
        Ok(rt) => rt,
        Err(e) => {
            internal::error("CLIENT", &format!("Failed to start runtime: {e}"));
            return ExitCode::FAILURE;
        }
    };

    let mut stdout = io::stdout();
    match runtime.block_on(client::run(&client_config, &mut stdout)) {
        Ok(stats) => {
            internal::debug(
                "CLIENT",
                &format!(
                    "Server closed: {} printed, {} excluded, {} unparsable",
                    stats.printed, stats.excluded, stats.parse_errors
                ),
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            internal::error("CLIENT", &format!("{e}"));
            ExitCode::FAILURE
        }
    }
}
