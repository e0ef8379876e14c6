//! `relaylog stream`: pipe a program's output to log consumers.

use crate::cli::util::{build_runtime, parse_endpoint};
use crate::config::{Config, Endpoint};
use crate::identity::ProcessIdentity;
use crate::internal;
use crate::level::Level;
use crate::output::Output;
use crate::record::LogRecord;
use crate::remote::RemoteOutput;
use std::process::ExitCode;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Time left for queued lines to reach consumers after stdin closes.
const FLUSH_GRACE: Duration = Duration::from_secs(1);

fn parse_all(endpoints: &[String]) -> Result<Vec<Endpoint>, crate::Error> {
    endpoints.iter().map(|e| parse_endpoint(e)).collect()
}

/// A line that already is a record is forwarded untouched; anything else is
/// wrapped in a new record.
fn to_record(identity: &ProcessIdentity, context: &str, level: Level, line: &str) -> LogRecord {
    LogRecord::from_json_line(line)
        .unwrap_or_else(|_| LogRecord::new(identity, context, level, line))
}

#[must_use]
pub fn cmd_stream(
    config: &Config,
    connect: &[String],
    listen: &[String],
    level: Level,
    context: &str,
) -> ExitCode {
    let mut remote_config = config.remote_log.clone();
    match (parse_all(connect), parse_all(listen)) {
        (Ok(connect), Ok(listen)) => {
            if !connect.is_empty() || !listen.is_empty() {
                remote_config.connect = connect;
                remote_config.listen = listen;
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            internal::error("STREAM", &format!("{e}"));
            return ExitCode::FAILURE;
        }
    }
    if remote_config.connect.is_empty() && remote_config.listen.is_empty() {
        internal::error("STREAM", "Nothing to stream to; pass --connect or --listen");
        return ExitCode::FAILURE;
    }

    let runtime = match build_runtime() {
        Ok(rt) => rt,
        Err(e) => {
            internal::error("STREAM", &format!("Failed to start runtime: {e}"));
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(async move {
        let remote = match RemoteOutput::new(&remote_config) {
            Ok(remote) => remote,
            Err(e) => {
                internal::error("STREAM", &format!("{e}"));
                return ExitCode::FAILURE;
            }
        };
        if let Err(e) = remote.init_remotes(&remote_config).await {
            internal::error("STREAM", &format!("{e}"));
            return ExitCode::FAILURE;
        }

        let identity = ProcessIdentity::resolve();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut sent = 0usize;
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    internal::error("STREAM", &format!("stdin: {e}"));
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            let record = to_record(&identity, context, level, &line);
            match record.to_json_line() {
                Ok(serialized) => {
                    if remote.write(record.level, &serialized, &record).is_ok() {
                        sent += 1;
                    }
                }
                Err(e) => internal::warn("STREAM", &format!("Dropped line: {e}")),
            }
        }

        tokio::time::sleep(FLUSH_GRACE).await;
        remote.clear().await;
        internal::debug("STREAM", &format!("Sent {sent} records"));
        ExitCode::SUCCESS
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_wrapped_and_records_pass_through() {
        let identity = ProcessIdentity::new("h", "10.0.0.1", "u", "p", 1);
        let wrapped = to_record(&identity, "stream", Level::Warn, "disk almost full");
        assert_eq!(wrapped.context, "stream");
        assert_eq!(wrapped.level, Level::Warn);
        assert_eq!(wrapped.message().as_deref(), Some("disk almost full"));

        let line = r#"{"timeMs":1,"context":"db","level":"error","log":"x"}"#;
        let parsed = to_record(&identity, "stream", Level::Info, line);
        assert_eq!(parsed.context, "db");
        assert_eq!(parsed.level, Level::Error);
    }
}
