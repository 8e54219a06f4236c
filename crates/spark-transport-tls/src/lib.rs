//! Hand-driven, non-blocking TLS: the channel state machine spec §4.3
//! describes, plus the delegated-task worker (§4.4) that runs its
//! crypto-heavy step off the selector thread.
//!
//! # Why
//! A reactor that never blocks can't call into a TLS library that expects
//! to own a blocking read/write loop. This crate drives `rustls` entirely
//! through its non-blocking `read_tls`/`write_tls`/`process_new_packets`
//! surface instead, in the same shape `linkerd-tcp` and `warpy-ai-script`
//! use it (see `DESIGN.md`).
//!
//! # What
//! [`session::TlsSession`] (the state machine, generic over any
//! `Read + Write` socket type so it doesn't depend on `mio`),
//! [`task_worker::TaskWorker`] (the delegated-task thread), [`status`]'s
//! `HandshakeStatus`/`EngineStatus` vocabulary, and [`config`]'s PEM-based
//! `rustls` config builders.
//!
//! # How
//! `TlsSession` is always shared as `Arc<TlsSession>`: the selector thread
//! owns it day to day, and in off-thread delegation mode the task worker
//! briefly takes a clone of the `Arc` to run one `process_new_packets`
//! call before handing control back via a `TaskComplete` change.
pub mod config;
pub mod error;
pub mod session;
pub mod status;
pub mod task_worker;

pub use error::TlsError;
pub use session::{Delegation, TlsSession};
pub use status::{EngineStatus, HandshakeStatus};
pub use task_worker::TaskWorker;
