//! Per-connection writer tasks and the keyed registry they are reachable through.

use crate::internal;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

/// Sending side of one connection. Writes never block: lines queue on an
/// unbounded channel drained by the connection's own task.
#[derive(Debug, Clone)]
pub(crate) struct SocketHandle {
    tx: UnboundedSender<Arc<str>>,
    closed: Arc<AtomicBool>,
    /// Set when the owner tore the socket down on purpose; suppresses reconnects.
    ended: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl SocketHandle {
    pub(crate) fn new() -> (Self, UnboundedReceiver<Arc<str>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            tx,
            closed: Arc::new(AtomicBool::new(false)),
            ended: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
        };
        (handle, rx)
    }

    /// Queues `line` unless the socket is closed. Returns whether it was queued.
    pub(crate) fn send(&self, line: &Arc<str>) -> bool {
        if self.is_closed() {
            return false;
        }
        self.tx.send(Arc::clone(line)).is_ok()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub(crate) fn is_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }

    /// Marks the socket ended and force-closes it, cancelling any pending reconnect.
    pub(crate) fn shutdown(&self) {
        self.ended.store(true, Ordering::Release);
        self.mark_closed();
        self.cancel.cancel();
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn same_socket(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.closed, &other.closed)
    }
}

/// Live sockets by key, plus the counter behind `client{N}` keys.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    sockets: HashMap<String, SocketHandle>,
    client_counter: u64,
}

pub(crate) type SharedRegistry = Arc<Mutex<Registry>>;

impl Registry {
    /// Next inbound key; numbering starts at `client1`.
    pub(crate) fn next_client_key(&mut self) -> String {
        self.client_counter += 1;
        format!("client{}", self.client_counter)
    }

    /// Returns the handle previously stored under `key`, if any.
    pub(crate) fn insert(&mut self, key: String, handle: SocketHandle) -> Option<SocketHandle> {
        self.sockets.insert(key, handle)
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<SocketHandle> {
        self.sockets.remove(key)
    }

    /// Removes `key` only while it still refers to `handle`; a replacement stays.
    pub(crate) fn remove_socket(&mut self, key: &str, handle: &SocketHandle) -> bool {
        if self
            .sockets
            .get(key)
            .is_some_and(|current| current.same_socket(handle))
        {
            self.sockets.remove(key);
            return true;
        }
        false
    }

    /// Swaps `new` in under `key` only while `key` still holds `current` and
    /// `current` has not been ended. Returns whether the swap happened.
    pub(crate) fn replace_if_current(
        &mut self,
        key: &str,
        current: &SocketHandle,
        new: SocketHandle,
    ) -> bool {
        let still_current = self
            .sockets
            .get(key)
            .is_some_and(|s| s.same_socket(current) && !s.is_ended());
        if still_current {
            self.sockets.insert(key.to_string(), new);
        }
        still_current
    }

    /// Queues `line` on every open socket; returns how many accepted it.
    pub(crate) fn broadcast(&self, line: &Arc<str>) -> usize {
        self.sockets
            .values()
            .filter(|socket| socket.send(line))
            .count()
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.sockets.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub(crate) fn drain(&mut self) -> Vec<(String, SocketHandle)> {
        self.sockets.drain().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.sockets.len()
    }
}

/// Pumps queued lines into `stream` until the peer hangs up, the channel's
/// sender is dropped, or `cancel` fires. Anything the peer sends is discarded.
pub(crate) async fn run_session(
    stream: TcpStream,
    mut rx: UnboundedReceiver<Arc<str>>,
    cancel: CancellationToken,
) -> io::Result<()> {
    let (mut reader, mut writer) = stream.into_split();
    let mut buf = [0u8; 1024];
    let result = loop {
        tokio::select! {
            () = cancel.cancelled() => break Ok(()),
            line = rx.recv() => match line {
                Some(line) => {
                    if let Err(e) = writer.write_all(line.as_bytes()).await {
                        break Err(e);
                    }
                }
                None => break Ok(()),
            },
            read = reader.read(&mut buf) => match read {
                Ok(0) => break Ok(()),
                Ok(_) => {}
                Err(e) => break Err(e),
            },
        }
    };
    let _ = writer.shutdown().await;
    result
}

/// Refused and timed-out connections are expected while a peer is down.
pub(crate) fn report_socket_error(key: &str, err: &io::Error) {
    match err.kind() {
        io::ErrorKind::ConnectionRefused | io::ErrorKind::TimedOut => {
            internal::trace("REMOTE", &format!("{key}: {err}"));
        }
        _ => internal::warn("REMOTE", &format!("Socket error on {key}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_keys_count_from_one() {
        let mut registry = Registry::default();
        assert_eq!(registry.next_client_key(), "client1");
        assert_eq!(registry.next_client_key(), "client2");
    }

    #[test]
    fn closed_sockets_are_skipped() {
        let mut registry = Registry::default();
        let (open, mut open_rx) = SocketHandle::new();
        let (closed, mut closed_rx) = SocketHandle::new();
        closed.mark_closed();
        registry.insert("a".into(), open);
        registry.insert("b".into(), closed);

        let line: Arc<str> = Arc::from("x\n");
        assert_eq!(registry.broadcast(&line), 1);
        assert_eq!(open_rx.try_recv().unwrap().as_ref(), "x\n");
        assert!(closed_rx.try_recv().is_err());
    }

    #[test]
    fn replaced_socket_is_not_removed_by_its_predecessor() {
        let mut registry = Registry::default();
        let (old, _old_rx) = SocketHandle::new();
        let (new, _new_rx) = SocketHandle::new();
        registry.insert("connect:h:1".into(), old.clone());
        let replaced = registry.insert("connect:h:1".into(), new);
        assert!(replaced.is_some());

        assert!(!registry.remove_socket("connect:h:1", &old));
        assert_eq!(registry.keys(), vec!["connect:h:1".to_string()]);
    }

    #[test]
    fn redial_only_replaces_a_live_registration() {
        let mut registry = Registry::default();
        let (old, _old_rx) = SocketHandle::new();
        registry.insert("connect:h:1".into(), old.clone());

        let (next, _next_rx) = SocketHandle::new();
        assert!(registry.replace_if_current("connect:h:1", &old, next.clone()));

        // Drained by a clear: the key is gone, nothing comes back.
        let drained = registry.drain();
        for (_, socket) in &drained {
            socket.shutdown();
        }
        let (again, _again_rx) = SocketHandle::new();
        assert!(!registry.replace_if_current("connect:h:1", &next, again));
        assert_eq!(registry.len(), 0);

        // Ended but still registered: also refused.
        let (ended, _ended_rx) = SocketHandle::new();
        registry.insert("connect:h:1".into(), ended.clone());
        ended.shutdown();
        let (late, _late_rx) = SocketHandle::new();
        assert!(!registry.replace_if_current("connect:h:1", &ended, late.clone()));
        assert!(!registry.remove_socket("connect:h:1", &late));
    }
}
