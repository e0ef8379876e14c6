//! Inbound side of a remote log stream: consumers connect and receive every
//! record written after they joined.

use super::socket::{SharedRegistry, SocketHandle, report_socket_error, run_session};
use crate::internal;
use crate::sync::lock;
use std::collections::HashSet;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A bound accept loop. Accepted sockets live in the shared registry under
/// `client{N}` and are also tracked here so `stop` only touches its own.
#[derive(Debug)]
pub struct Listener {
    addr: SocketAddr,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    registry: SharedRegistry,
    keys: Arc<Mutex<HashSet<String>>>,
}

impl Listener {
    pub(crate) async fn bind(host: &str, port: u16, registry: SharedRegistry) -> io::Result<Self> {
        let listener = TcpListener::bind((host, port)).await?;
        let addr = listener.local_addr()?;
        internal::info("REMOTE", &format!("Listening for log consumers on {addr}"));

        let cancel = CancellationToken::new();
        let keys = Arc::new(Mutex::new(HashSet::new()));
        let task = tokio::spawn(accept_loop(
            listener,
            cancel.clone(),
            Arc::clone(&registry),
            Arc::clone(&keys),
        ));

        Ok(Self {
            addr,
            cancel,
            task: Some(task),
            registry,
            keys,
        })
    }

    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Sockets accepted by this listener that are still open.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        lock(&self.keys).len()
    }

    /// Closes the listening socket, waits for the accept loop to exit, then
    /// closes every connection this listener accepted.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            internal::warn("REMOTE", &format!("Accept loop on {} failed: {e}", self.addr));
        }
        self.close_connections();
        internal::debug("REMOTE", &format!("Stopped listening on {}", self.addr));
    }

    /// Synchronous variant of `stop` that does not wait for the accept loop.
    pub(crate) fn abort(&self) {
        self.cancel.cancel();
        self.close_connections();
    }

    /// Takes the registry lock before the key set, the same order the accept
    /// loop registers in, so a socket accepted during shutdown is never missed.
    fn close_connections(&self) {
        let mut registry = lock(&self.registry);
        let keys: Vec<String> = lock(&self.keys).drain().collect();
        for key in keys {
            if let Some(socket) = registry.remove(&key) {
                socket.shutdown();
            }
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn accept_loop(
    listener: TcpListener,
    cancel: CancellationToken,
    registry: SharedRegistry,
    keys: Arc<Mutex<HashSet<String>>>,
) {
    loop {
        let accepted = tokio::select! {
            () = cancel.cancelled() => break,
            accepted = listener.accept() => accepted,
        };
        let (stream, peer) = match accepted {
            Ok(conn) => conn,
            Err(e) => {
                report_socket_error("listener", &e);
                continue;
            }
        };

        let (socket, rx) = SocketHandle::new();
        let key = {
            let mut registry = lock(&registry);
            // Stopping cancels before it locks, so this sees it.
            if cancel.is_cancelled() {
                break;
            }
            let key = registry.next_client_key();
            registry.insert(key.clone(), socket.clone());
            lock(&keys).insert(key.clone());
            key
        };
        internal::debug("REMOTE", &format!("{key} connected from {peer}"));

        let registry = Arc::clone(&registry);
        let keys = Arc::clone(&keys);
        tokio::spawn(async move {
            if let Err(e) = run_session(stream, rx, socket.cancel_token()).await {
                report_socket_error(&key, &e);
            }
            socket.mark_closed();
            lock(&registry).remove_socket(&key, &socket);
            lock(&keys).remove(&key);
            internal::debug("REMOTE", &format!("{key} disconnected"));
        });
    }
}
