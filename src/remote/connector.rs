//! Outbound side of a remote log stream: dial a consumer and redial it
//! forever, at a fixed delay, until the connection is replaced or cleared.

use super::socket::{SocketHandle, report_socket_error, run_session};
use super::{RemoteOutput, Shared};
use crate::internal;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;

/// Wait between an unexpected close and the next connection attempt.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

pub(crate) fn connection_key(host: &str, port: u16) -> String {
    format!("connect:{host}:{port}")
}

/// Runs one connection attempt and its session, then schedules the redial.
pub(super) async fn run_outbound(
    shared: Weak<Shared>,
    host: String,
    port: u16,
    socket: SocketHandle,
    rx: UnboundedReceiver<Arc<str>>,
) {
    let key = connection_key(&host, port);
    let cancel = socket.cancel_token();

    let connected = tokio::select! {
        () = cancel.cancelled() => return,
        connected = TcpStream::connect((host.as_str(), port)) => connected,
    };
    match connected {
        Ok(stream) => {
            internal::info("REMOTE", &format!("Connected to {host}:{port}"));
            if let Err(e) = run_session(stream, rx, cancel.clone()).await {
                report_socket_error(&key, &e);
            }
        }
        Err(e) => report_socket_error(&key, &e),
    }

    socket.mark_closed();
    if socket.is_ended() {
        return;
    }

    internal::debug(
        "REMOTE",
        &format!("{key} closed, retrying in {}s", RECONNECT_DELAY.as_secs()),
    );
    tokio::select! {
        () = cancel.cancelled() => return,
        () = tokio::time::sleep(RECONNECT_DELAY) => {}
    }
    let Some(shared) = shared.upgrade() else {
        return;
    };
    RemoteOutput { shared }.redial(&host, port, &socket);
}
