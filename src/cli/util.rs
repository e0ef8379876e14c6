//! Utility functions for the CLI.

use crate::config::Endpoint;
use crate::error::{Error, validate_host, validate_port};
use tokio::runtime::Runtime;

/// Parses `HOST:PORT`; the last colon separates the port so IPv6 hosts in
/// brackets work (`[::1]:18001`).
///
/// # Errors
/// Missing separator, empty host, or a port outside `1..=65535`.
pub fn parse_endpoint(s: &str) -> Result<Endpoint, Error> {
    let (host, port) = s
        .rsplit_once(':')
        .ok_or_else(|| Error::InvalidConfig(format!("expected HOST:PORT, got '{s}'")))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    validate_host(host)?;
    let port: u32 = port
        .parse()
        .map_err(|_| Error::InvalidConfig(format!("bad port in '{s}'")))?;
    validate_port(port)?;
    Ok(Endpoint::new(host, port))
}

/// Multi-threaded runtime for the networked subcommands.
///
/// # Errors
/// The OS refused to create the worker threads or the I/O driver.
pub fn build_runtime() -> Result<Runtime, Error> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("relaylog-worker")
        .build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_endpoints() {
        assert_eq!(parse_endpoint("127.0.0.1:18001").unwrap(), Endpoint::new("127.0.0.1", 18001));
        assert_eq!(parse_endpoint("[::1]:9").unwrap(), Endpoint::new("::1", 9));
        assert!(parse_endpoint("localhost").is_err());
        assert!(parse_endpoint("localhost:0").is_err());
        assert!(parse_endpoint(":80").is_err());
    }
}
