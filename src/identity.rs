//! Process identity stamped onto every record.
//!
//! Resolved once at startup and passed into loggers and the relay instead of
//! being read from process-wide state on each write.

use std::net::{IpAddr, UdpSocket};

/// Host, address, user and process of the emitting side of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessIdentity {
    pub host: String,
    pub ip: String,
    pub user: String,
    pub process: String,
    pub pid: u32,
}

impl ProcessIdentity {
    /// Resolves hostname, outward-facing IP, user and process name of the current process.
    #[must_use]
    pub fn resolve() -> Self {
        Self {
            host: resolve_hostname(),
            ip: resolve_external_ip().map_or_else(|| "127.0.0.1".to_string(), |ip| ip.to_string()),
            user: std::env::var("USER")
                .or_else(|_| std::env::var("USERNAME"))
                .unwrap_or_default(),
            process: resolve_process_name(),
            pid: std::process::id(),
        }
    }

    /// Fixed identity for tests and embedding.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        ip: impl Into<String>,
        user: impl Into<String>,
        process: impl Into<String>,
        pid: u32,
    ) -> Self {
        Self {
            host: host.into(),
            ip: ip.into(),
            user: user.into(),
            process: process.into(),
            pid,
        }
    }
}

fn resolve_hostname() -> String {
    if let Ok(host) = std::env::var("HOSTNAME")
        && !host.trim().is_empty()
    {
        return host.trim().to_string();
    }
    ["/proc/sys/kernel/hostname", "/etc/hostname"]
        .iter()
        .find_map(|path| {
            std::fs::read_to_string(path)
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_else(|| "localhost".to_string())
}

/// A connected UDP socket reports the local address the kernel would route through; no packet is sent.
fn resolve_external_ip() -> Option<IpAddr> {
    let probe = |bind: &str, target: &str| -> Option<IpAddr> {
        let socket = UdpSocket::bind(bind).ok()?;
        socket.connect(target).ok()?;
        let ip = socket.local_addr().ok()?.ip();
        (!ip.is_unspecified()).then_some(ip)
    };
    probe("0.0.0.0:0", "192.0.2.1:9").or_else(|| probe("[::]:0", "[2001:db8::1]:9"))
}

fn resolve_process_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "relaylog".to_string())
}
