//! Shared contracts for the spark-net reactor.
//!
//! # Why
//! `spark-reactor`, `spark-transport-tls`, `spark-framing`, and
//! `spark-timeout` all need to agree on a handful of vocabulary types
//! (errors, configuration, interest sets, the pending-changes contract)
//! without any one of them depending on another. This crate is that shared
//! floor.
//!
//! # What
//! Error type and category (`error`), configuration structs for the
//! selector/socket/packet-worker/timeout/TLS surfaces (`config`), the
//! interest/ready bitsets a channel registers and reports (`ready`), the
//! pending-changes-queue contract (`change`), and small identifier newtypes
//! (`ids`).
//!
//! # How
//! Plain data and traits only — no I/O, no threads. Concrete reactor and
//! TLS behavior live downstream; this crate only fixes the shapes they
//! share.
pub mod change;
pub mod config;
pub mod error;
pub mod ids;
pub mod ready;

pub mod prelude {
    pub use crate::change::{ChangeKind, ChangeRequest, ChangeSink};
    pub use crate::config::{
        PacketWorkerConfig, SelectorConfig, SocketOptions, TimeoutConfig, TlsSecurityConfig,
    };
    pub use crate::error::{CoreError, ErrorCategory, Result};
    pub use crate::ids::{ChannelId, TimeoutId};
    pub use crate::ready::{Interest, ReadyOps};
}
