//! The non-blocking TCP event loop (spec §4.1/§4.7): a single-threaded
//! `mio`-backed selector plus the `Server`/`Client`/`MultiClient` role
//! facades built on top of it.
//!
//! This crate is the integration point for the rest of the workspace:
//! [`spark_timeout`]'s manager, [`spark_transport_tls`]'s channel state
//! machine and delegated-task worker, and [`spark_framing`]'s packet
//! reassembly all plug into [`selector::Selector`] through
//! [`spark_core::change::ChangeSink`].
pub mod changes;
pub mod events;
pub mod registry;
pub mod role;
pub mod selector;
pub mod socket_opts;

pub use events::SelectorEvents;
pub use registry::{ClientSecurity, ListenerSecurity, Role, Security};
pub use role::{Client, MultiClient, Server};
pub use selector::{Selector, StopHandle};
