//! Relay consumer: connects to a relay's output side (or any remote log
//! listener) and prints every record it receives until the server hangs up.

use crate::config::ClientConfig;
use crate::error::{Error, validate_host, validate_port};
use crate::internal;
use crate::relay::{EntryFilter, LineBuffer, split_lines};
use crate::render::RecordRenderer;
use serde_json::Value;
use std::io::Write;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

/// What a client session printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientStats {
    pub printed: usize,
    pub excluded: usize,
    pub parse_errors: usize,
}

/// Renders newline-delimited blocks the way the client prints them.
#[derive(Debug, Clone)]
pub struct EntryPrinter {
    renderer: RecordRenderer,
    filter: EntryFilter,
}

impl EntryPrinter {
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            renderer: RecordRenderer::new()
                .colors(config.colors)
                .time_format(&config.time_format)
                .tags(config.tags.iter().cloned())
                .exclude_properties(config.exclude_properties.iter().cloned())
                .special_label("SPEC"),
            filter: EntryFilter::new(
                config.exclude_contexts.clone(),
                config.exclude_messages.clone(),
            ),
        }
    }

    /// Prints every entry of one released block.
    ///
    /// # Errors
    /// Writing to `out` failed.
    pub fn print_block<W: Write>(
        &self,
        text: &str,
        out: &mut W,
        stats: &mut ClientStats,
    ) -> std::io::Result<()> {
        let mut has_errors = false;
        for line in split_lines(text) {
            let Ok(entry) = serde_json::from_str::<Value>(line) else {
                has_errors = true;
                stats.parse_errors += 1;
                writeln!(out, "parseError: {line}")?;
                continue;
            };
            // Bare strings are relay notices and are never filtered.
            if !entry.is_string() && self.filter.excludes(&entry) {
                stats.excluded += 1;
                continue;
            }
            writeln!(out, "{}", self.renderer.render(&entry))?;
            stats.printed += 1;
        }
        if has_errors {
            writeln!(out, "dataParseErrors from: {text}")?;
        }
        Ok(())
    }
}

/// Streams records from `config.host:config.port` into `out` until the server
/// closes the connection.
///
/// # Errors
/// Invalid address, a failed connection, a socket error, or a failed write to `out`.
pub async fn run<W: Write>(config: &ClientConfig, out: &mut W) -> Result<ClientStats, Error> {
    validate_host(&config.host)?;
    let port = validate_port(config.port)?;
    let printer = EntryPrinter::new(config);

    let mut stream = TcpStream::connect((config.host.as_str(), port))
        .await
        .inspect_err(|e| {
            internal::error(
                "CLIENT",
                &format!("Failed to connect to log server at {}:{port}: {e}", config.host),
            );
        })?;
    internal::debug("CLIENT", &format!("Connected to {}:{port}", config.host));

    let mut stats = ClientStats::default();
    let mut buffer = LineBuffer::new();
    let mut chunk = vec![0u8; 8 * 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        if let Some(text) = buffer.push(&chunk[..n]) {
            printer.print_block(&text, out, &mut stats)?;
            out.flush()?;
        }
        let dropped = buffer.take_dropped();
        if dropped > 0 {
            internal::warn("CLIENT", &format!("Dropped {dropped} bytes of an oversized line"));
        }
    }
    Ok(stats)
}
