//! The relay process: producers write records to the input side, consumers
//! read them from the output side, and recent history is replayed to every
//! consumer that joins.

use super::history::HistoryRing;
use super::line_buffer::{LineBuffer, MAX_PENDING_BYTES, split_lines};
use super::EntryFilter;
use crate::config::RelayConfig;
use crate::error::{Error, validate_host, validate_port};
use crate::identity::ProcessIdentity;
use crate::internal;
use crate::level::Level;
use crate::record::LogRecord;
use crate::remote::{SocketHandle, run_session};
use crate::sync::lock;
use serde_json::Value;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Context of the entries the relay writes about itself.
pub const RELAY_CONTEXT: &str = "relay";

const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug)]
struct RelayState {
    history: HistoryRing,
    outputs: HashMap<u64, SocketHandle>,
    next_output: u64,
}

struct Relay {
    identity: ProcessIdentity,
    filter: EntryFilter,
    machine_names: HashMap<String, String>,
    chunk_size: usize,
    state: Mutex<RelayState>,
    cancel: CancellationToken,
}

impl Relay {
    fn machine_name(&self, ip: IpAddr) -> String {
        let ip = ip.to_canonical().to_string();
        self.machine_names.get(&ip).cloned().unwrap_or(ip)
    }

    /// Appends to history and forwards to every consumer, as one step.
    fn publish(&self, line: String) {
        let wire: Arc<str> = Arc::from(format!("{line}\n"));
        let mut state = lock(&self.state);
        state.history.push(line);
        for output in state.outputs.values() {
            output.send(&wire);
        }
    }

    fn relay_log(&self, level: Level, msg: String) {
        internal::log_at(level, "RELAY", &msg);
        let record = LogRecord::new(&self.identity, RELAY_CONTEXT, level, msg);
        match record.to_json_line() {
            Ok(line) => self.publish(line),
            Err(e) => internal::error("RELAY", &format!("Failed to serialize relay entry: {e}")),
        }
    }

    /// Handles one newline-terminated block from a producer.
    fn process_input(&self, machine: &str, text: &str) {
        let mut has_errors = false;
        for line in split_lines(text) {
            match serde_json::from_str::<Value>(line) {
                Ok(entry) => {
                    if !self.filter.excludes(&entry) {
                        self.publish(line.to_string());
                    }
                }
                Err(_) => {
                    has_errors = true;
                    self.relay_log(Level::Warn, format!("parseError: {line}"));
                }
            }
        }
        if has_errors {
            self.relay_log(
                Level::Warn,
                format!("[{machine}] Input dataParseErrors from: {text}"),
            );
        }
    }

    /// Replays history and registers the consumer under one lock, so an entry
    /// published concurrently is either in the replay or forwarded live.
    fn attach_output(&self, socket: SocketHandle) -> u64 {
        let mut state = lock(&self.state);
        for chunk in state.history.replay_chunks(self.chunk_size) {
            socket.send(&Arc::from(chunk));
        }
        state.next_output += 1;
        let id = state.next_output;
        state.outputs.insert(id, socket);
        id
    }

    fn detach_output(&self, id: u64) {
        lock(&self.state).outputs.remove(&id);
    }
}

/// Binds both sides of a relay.
pub struct RelayServer {
    config: RelayConfig,
    identity: ProcessIdentity,
}

impl RelayServer {
    #[must_use]
    pub const fn new(config: RelayConfig, identity: ProcessIdentity) -> Self {
        Self { config, identity }
    }

    /// Binds input and output listeners and starts accepting.
    ///
    /// # Errors
    /// Invalid hosts or ports, or either address cannot be bound.
    pub async fn start(self) -> Result<RelayHandle, Error> {
        let config = self.config;
        validate_host(&config.input_host)?;
        validate_host(&config.output_host)?;
        let input_port = validate_port(config.input_port)?;
        let output_port = validate_port(config.output_port)?;
        if config.chunk_size == 0 {
            return Err(Error::InvalidConfig("relay chunk_size must be positive".into()));
        }

        let input = TcpListener::bind((config.input_host.as_str(), input_port)).await?;
        let output = TcpListener::bind((config.output_host.as_str(), output_port)).await?;
        let input_addr = input.local_addr()?;
        let output_addr = output.local_addr()?;

        let relay = Arc::new(Relay {
            identity: self.identity,
            filter: EntryFilter::new(config.exclude_contexts, config.exclude_messages),
            machine_names: config.machine_names,
            chunk_size: config.chunk_size,
            state: Mutex::new(RelayState {
                history: HistoryRing::new(config.history_size),
                outputs: HashMap::new(),
                next_output: 0,
            }),
            cancel: CancellationToken::new(),
        });

        relay.relay_log(Level::Info, format!("Listening for inputs on {input_addr}"));
        relay.relay_log(Level::Info, format!("Listening for outputs on {output_addr}"));

        let tasks = vec![
            tokio::spawn(accept_inputs(Arc::clone(&relay), input)),
            tokio::spawn(accept_outputs(Arc::clone(&relay), output)),
        ];

        Ok(RelayHandle {
            input_addr,
            output_addr,
            relay,
            tasks,
        })
    }
}

/// Control handle of a running relay.
pub struct RelayHandle {
    input_addr: SocketAddr,
    output_addr: SocketAddr,
    relay: Arc<Relay>,
    tasks: Vec<JoinHandle<()>>,
}

impl RelayHandle {
    #[must_use]
    pub const fn input_addr(&self) -> SocketAddr {
        self.input_addr
    }

    #[must_use]
    pub const fn output_addr(&self) -> SocketAddr {
        self.output_addr
    }

    /// Snapshot of the history, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        lock(&self.relay.state).history.to_vec()
    }

    /// Consumers currently receiving live records.
    #[must_use]
    pub fn output_count(&self) -> usize {
        lock(&self.relay.state).outputs.len()
    }

    /// Stops both accept loops, waits for them, and closes every connection.
    pub async fn shutdown(self) {
        self.relay.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                internal::warn("RELAY", &format!("Accept loop failed: {e}"));
            }
        }
        let outputs: Vec<SocketHandle> = lock(&self.relay.state)
            .outputs
            .drain()
            .map(|(_, socket)| socket)
            .collect();
        for socket in outputs {
            socket.shutdown();
        }
    }
}

async fn accept_inputs(relay: Arc<Relay>, listener: TcpListener) {
    loop {
        let accepted = tokio::select! {
            () = relay.cancel.cancelled() => break,
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok((stream, peer)) => {
                tokio::spawn(serve_input(Arc::clone(&relay), stream, peer));
            }
            Err(e) => internal::warn("RELAY", &format!("Input accept failed: {e}")),
        }
    }
}

async fn serve_input(relay: Arc<Relay>, mut stream: TcpStream, peer: SocketAddr) {
    let machine = relay.machine_name(peer.ip());
    relay.relay_log(Level::Info, format!("[{machine}] Input client connected."));

    let mut buffer = LineBuffer::new();
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let read = tokio::select! {
            () = relay.cancel.cancelled() => break,
            read = stream.read(&mut chunk) => read,
        };
        match read {
            Ok(0) => break,
            Ok(n) => {
                if let Some(text) = buffer.push(&chunk[..n]) {
                    relay.process_input(&machine, &text);
                }
                let dropped = buffer.take_dropped();
                if dropped > 0 {
                    relay.relay_log(
                        Level::Warn,
                        format!(
                            "[{machine}] Input line over {MAX_PENDING_BYTES} bytes, \
                             dropped {dropped} bytes."
                        ),
                    );
                }
            }
            Err(e) => {
                relay.relay_log(Level::Error, format!("[{machine}] Input socket error: {e}"));
                break;
            }
        }
    }

    relay.relay_log(Level::Info, format!("[{machine}] Input connection closed."));
}

async fn accept_outputs(relay: Arc<Relay>, listener: TcpListener) {
    loop {
        let accepted = tokio::select! {
            () = relay.cancel.cancelled() => break,
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok((stream, peer)) => {
                let machine = relay.machine_name(peer.ip());
                relay.relay_log(Level::Info, format!("[{machine}] Output client connected."));

                let (socket, rx) = SocketHandle::new();
                let cancel = relay.cancel.child_token();
                let id = relay.attach_output(socket);
                let relay = Arc::clone(&relay);
                tokio::spawn(async move {
                    let result = run_session(stream, rx, cancel).await;
                    relay.detach_output(id);
                    if let Err(e) = result {
                        relay.relay_log(
                            Level::Error,
                            format!("[{machine}] Output socket error: {e}"),
                        );
                    }
                    relay.relay_log(Level::Info, format!("[{machine}] Output connection closed."));
                });
            }
            Err(e) => internal::warn("RELAY", &format!("Output accept failed: {e}")),
        }
    }
}
