//! The channel registry (spec §3): the selector's exclusive map from
//! identifier to live socket + TLS/plain state. Also holds each channel's
//! own slice of the "pending-writes table" — queued outbound bytes a
//! `write()` call accepted before the socket could take them, flushed on
//! the next `WRITABLE` readiness. Keeping that queue on the `Channel`
//! itself rather than as a second map keyed by the same id is the same
//! information, addressed one hop shorter.

use mio::net::{TcpListener, TcpStream};
use mio::Token;
use rustls::{ClientConfig, ServerConfig};
use rustls_pki_types::ServerName;
use spark_core::ids::ChannelId;
use spark_core::ready::Interest;
use spark_transport_tls::TlsSession;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Which role created a channel — governs accept-vs-connect behavior and
/// the timing of `TCP_NODELAY` (spec §4.7/§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

/// A channel's TLS posture.
pub enum Security {
    Plain,
    Secure(Arc<TlsSession>),
}

impl Security {
    pub fn is_secure(&self) -> bool {
        matches!(self, Security::Secure(_))
    }

    pub fn session(&self) -> Option<&Arc<TlsSession>> {
        match self {
            Security::Secure(session) => Some(session),
            Security::Plain => None,
        }
    }
}

pub struct Channel {
    pub id: ChannelId,
    pub socket: TcpStream,
    pub role: Role,
    pub security: Security,
    pub interest: Interest,
    /// `true` from construction until a client-role socket's `connect()`
    /// resolves (success or failure); never set for server-role channels,
    /// which are already connected at accept time.
    pub connecting: bool,
    /// Outbound bytes accepted by a prior `write()` call that the socket
    /// could not yet take. Drained on the next `WRITABLE` event.
    pub pending_writes: VecDeque<u8>,
}

impl Channel {
    pub fn queue_write(&mut self, bytes: &[u8]) {
        self.pending_writes.extend(bytes.iter().copied());
    }

    pub fn has_pending_writes(&self) -> bool {
        !self.pending_writes.is_empty()
    }
}

/// A listening socket and the TLS posture every connection it accepts
/// should start with.
pub enum ListenerSecurity {
    Plain,
    Secure(Arc<ServerConfig>),
}

pub struct Listener {
    pub id: ChannelId,
    pub socket: TcpListener,
    pub security: ListenerSecurity,
}

/// The TLS posture to start an outbound, client-role connection with.
pub enum ClientSecurity {
    Plain,
    Secure {
        config: Arc<ClientConfig>,
        server_name: ServerName<'static>,
    },
}

/// Maps [`ChannelId`]s to live [`Channel`]s and [`Listener`]s, and to the
/// `mio::Token`s used to register them with the poller. A `ChannelId`'s raw
/// value doubles as its `Token`'s value — one allocator, one namespace,
/// rather than maintaining a second bidirectional map.
#[derive(Default)]
pub struct ChannelRegistry {
    channels: HashMap<ChannelId, Channel>,
    listeners: HashMap<ChannelId, Listener>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token_of(id: ChannelId) -> Token {
        Token(id.as_raw() as usize)
    }

    pub fn id_of(token: Token) -> ChannelId {
        ChannelId::from_raw(token.0 as u64)
    }

    pub fn insert_channel(&mut self, channel: Channel) {
        self.channels.insert(channel.id, channel);
    }

    pub fn insert_listener(&mut self, listener: Listener) {
        self.listeners.insert(listener.id, listener);
    }

    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.get(&id)
    }

    pub fn channel_mut(&mut self, id: ChannelId) -> Option<&mut Channel> {
        self.channels.get_mut(&id)
    }

    pub fn listener(&self, id: ChannelId) -> Option<&Listener> {
        self.listeners.get(&id)
    }

    pub fn listener_mut(&mut self, id: ChannelId) -> Option<&mut Listener> {
        self.listeners.get_mut(&id)
    }

    pub fn remove_channel(&mut self, id: ChannelId) -> Option<Channel> {
        self.channels.remove(&id)
    }

    pub fn remove_listener(&mut self, id: ChannelId) -> Option<Listener> {
        self.listeners.remove(&id)
    }

    pub fn channel_ids(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.channels.keys().copied()
    }

    pub fn is_listener(&self, id: ChannelId) -> bool {
        self.listeners.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
