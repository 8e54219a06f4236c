//! Configuration structs for the selector, per-connection socket options,
//! the packet reassembly worker, the timeout manager, and TLS security
//! policy (spec §6). Grounded in `spark-transport-tcp::channel::TcpSocketConfig`'s
//! plain-struct-with-`Default` style; loading these from a properties/TOML
//! file is out of scope (spec §1), but the structs and their defaults
//! are not.

use serde::{Deserialize, Serialize};

/// Governs how the event-loop selector itself is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// The selector runs on exactly one thread; this flag exists only to
    /// make that assumption explicit and checkable at startup rather than
    /// implicit in "we never spawned a second one".
    pub single_threaded: bool,
    /// Whether the selector drains the entire pending-changes queue before
    /// polling again (`true`), or processes at most one change per
    /// iteration (`false`), trading latency for fairness under heavy
    /// change-queue contention.
    pub process_all_changes: bool,
    /// Backlog passed to `listen()` for server-role channels.
    pub backlog: i32,
    /// Upper bound on pending changes processed per loop iteration when
    /// `process_all_changes` is `false`; ignored otherwise.
    pub max_changes: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            single_threaded: true,
            process_all_changes: true,
            backlog: 1024,
            max_changes: 256,
        }
    }
}

/// Per-connection socket options (spec §6). Applied once a channel's raw
/// socket exists: immediately after `accept()` for server-side channels,
/// and for `TCP_NODELAY` specifically, only after `finish_connect()`
/// succeeds on the client side (some platforms reject socket options on a
/// still-connecting socket).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketOptions {
    pub tcp_nodelay: bool,
    pub so_sndbuf: Option<u32>,
    pub so_rcvbuf: Option<u32>,
    pub so_keepalive: bool,
    pub so_reuseaddr: bool,
    pub ip_tos: Option<u32>,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            tcp_nodelay: true,
            so_sndbuf: None,
            so_rcvbuf: None,
            so_keepalive: true,
            so_reuseaddr: true,
            ip_tos: None,
        }
    }
}

/// Sizing for the packet reassembly worker's per-channel buffers (spec
/// §4.5/§9). `buffer_cap` is the REDESIGN FLAGS-mandated hard ceiling that
/// keeps an adversarial peer from growing a single channel's reassembly
/// buffer without bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacketWorkerConfig {
    pub buffer_size: usize,
    pub buffer_cap: usize,
}

impl Default for PacketWorkerConfig {
    fn default() -> Self {
        Self {
            buffer_size: 512,
            buffer_cap: 1024 * 1024,
        }
    }
}

/// The timeout manager's own tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Default duration, in milliseconds, armed for handshake-inactivity
    /// timeouts when a caller doesn't specify one explicitly.
    pub period_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { period_ms: 30_000 }
    }
}

/// TLS security policy (spec §6 `secure.*`). Protocol/cipher-suite names
/// are carried as strings rather than `rustls` enum values so this struct
/// stays serde-friendly and decoupled from the TLS crate; `spark-transport-tls`
/// is responsible for resolving them against what `rustls` actually
/// supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsSecurityConfig {
    pub protocols: Vec<String>,
    pub cipher_suites: Vec<String>,
    /// Require and verify a client certificate during the handshake.
    pub require_client_auth: bool,
}

impl Default for TlsSecurityConfig {
    fn default() -> Self {
        Self {
            protocols: vec!["TLSv1.3".to_string(), "TLSv1.2".to_string()],
            cipher_suites: Vec::new(),
            require_client_auth: false,
        }
    }
}
