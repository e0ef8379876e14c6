//! Remote TCP log stream: every record is broadcast as one JSON line to all
//! connected consumers, whether they dialed in or we dialed them.
//!
//! There is no handshake and no acknowledgement. A consumer that is down
//! misses what was written meanwhile; outbound connections are redialed.

mod connector;
mod listener;
mod socket;

pub use connector::RECONNECT_DELAY;
pub use listener::Listener;

pub(crate) use socket::{SocketHandle, run_session};

use crate::config::RemoteLogConfig;
use crate::error::{Error, validate_host, validate_port};
use crate::internal;
use crate::level::Level;
use crate::output::Output;
use crate::record::LogRecord;
use crate::sync::lock;
use socket::{Registry, SharedRegistry};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;

pub(crate) struct Shared {
    enabled: bool,
    min_level: Level,
    runtime: Handle,
    registry: SharedRegistry,
    listeners: Mutex<Vec<Listener>>,
}

/// Fan-out output over TCP. Cheap to clone; clones share sockets and listeners.
#[derive(Clone)]
pub struct RemoteOutput {
    shared: Arc<Shared>,
}

impl RemoteOutput {
    /// Creates an output with no endpoints. Must be called inside a tokio runtime,
    /// which later connection tasks are spawned on.
    ///
    /// # Errors
    /// [`Error::NoRuntime`] outside a runtime.
    pub fn new(config: &RemoteLogConfig) -> Result<Self, Error> {
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        Ok(Self {
            shared: Arc::new(Shared {
                enabled: config.enabled,
                min_level: config.level,
                runtime,
                registry: Arc::new(Mutex::new(Registry::default())),
                listeners: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Dials `host:port` and keeps redialing after unexpected closes. Replaces
    /// an existing connection to the same address.
    ///
    /// # Errors
    /// Empty host or a port outside `1..=65535`.
    pub fn connect(&self, host: &str, port: u32) -> Result<(), Error> {
        validate_host(host)?;
        let port = validate_port(port)?;
        self.spawn_connection(host, port);
        Ok(())
    }

    pub(crate) fn spawn_connection(&self, host: &str, port: u16) {
        let key = connector::connection_key(host, port);
        let (socket, rx) = SocketHandle::new();
        let replaced = lock(&self.shared.registry).insert(key, socket.clone());
        if let Some(old) = replaced {
            old.shutdown();
        }
        self.spawn_outbound(host, port, socket, rx);
    }

    /// Redials after `previous` closed. The registry check and the swap share
    /// one lock, so a `clear` or `connect` that got there first wins.
    pub(crate) fn redial(&self, host: &str, port: u16, previous: &SocketHandle) {
        let key = connector::connection_key(host, port);
        let (socket, rx) = SocketHandle::new();
        if !lock(&self.shared.registry).replace_if_current(&key, previous, socket.clone()) {
            internal::trace("REMOTE", &format!("{key} was cleared, not redialing"));
            return;
        }
        self.spawn_outbound(host, port, socket, rx);
    }

    fn spawn_outbound(
        &self,
        host: &str,
        port: u16,
        socket: SocketHandle,
        rx: tokio::sync::mpsc::UnboundedReceiver<Arc<str>>,
    ) {
        self.shared.runtime.spawn(connector::run_outbound(
            Arc::downgrade(&self.shared),
            host.to_string(),
            port,
            socket,
            rx,
        ));
    }

    /// Accepts consumers on `host:port`. Returns the bound address.
    ///
    /// # Errors
    /// Invalid host or port, or the address cannot be bound.
    pub async fn listen(&self, host: &str, port: u32) -> Result<SocketAddr, Error> {
        validate_host(host)?;
        let port = validate_port(port)?;
        let listener = Listener::bind(host, port, Arc::clone(&self.shared.registry)).await?;
        let addr = listener.local_addr();
        lock(&self.shared.listeners).push(listener);
        Ok(addr)
    }

    /// Stops every listener, then closes every socket without reconnecting.
    pub async fn clear(&self) {
        let listeners = std::mem::take(&mut *lock(&self.shared.listeners));
        for listener in listeners {
            listener.stop().await;
        }
        self.close_sockets();
    }

    /// Replaces all endpoints with the configured ones.
    ///
    /// # Errors
    /// The first endpoint that fails validation or binding. Endpoints before it stay up.
    pub async fn init_remotes(&self, config: &RemoteLogConfig) -> Result<(), Error> {
        self.clear().await;
        for endpoint in &config.listen {
            self.listen(&endpoint.host, endpoint.port).await?;
        }
        for endpoint in &config.connect {
            self.connect(&endpoint.host, endpoint.port)?;
        }
        Ok(())
    }

    /// `init_remotes` on the output's runtime, for callers that cannot await.
    pub fn spawn_init(&self, config: RemoteLogConfig) {
        let remote = self.clone();
        self.shared.runtime.spawn(async move {
            if let Err(e) = remote.init_remotes(&config).await {
                internal::error("REMOTE", &format!("Failed to start remote log: {e}"));
            }
        });
    }

    /// Sorted registry keys (`client{N}`, `connect:{host}:{port}`).
    #[must_use]
    pub fn socket_keys(&self) -> Vec<String> {
        lock(&self.shared.registry).keys()
    }

    #[must_use]
    pub fn socket_count(&self) -> usize {
        lock(&self.shared.registry).len()
    }

    /// Addresses of the running listeners.
    #[must_use]
    pub fn listen_addrs(&self) -> Vec<SocketAddr> {
        lock(&self.shared.listeners)
            .iter()
            .map(Listener::local_addr)
            .collect()
    }

    fn close_sockets(&self) {
        let sockets = lock(&self.shared.registry).drain();
        for (key, socket) in sockets {
            internal::trace("REMOTE", &format!("Closing {key}"));
            socket.shutdown();
        }
    }
}

impl Output for RemoteOutput {
    fn name(&self) -> &'static str {
        "remoteLog"
    }

    fn write(&self, level: Level, serialized: &str, _record: &LogRecord) -> Result<(), Error> {
        if serialized.is_empty() || !self.shared.enabled || !level.can_log(self.shared.min_level) {
            return Ok(());
        }
        let line: Arc<str> = Arc::from(format!("{serialized}\n"));
        lock(&self.shared.registry).broadcast(&line);
        Ok(())
    }

    fn end(&self) {
        let listeners = std::mem::take(&mut *lock(&self.shared.listeners));
        for listener in &listeners {
            listener.abort();
        }
        self.close_sockets();
    }
}
