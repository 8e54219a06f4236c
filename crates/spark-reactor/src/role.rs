//! Thin role-specific facades over [`Selector`] (spec §4.7): `Server`
//! listens and accepts, `Client` makes one outbound connection, and
//! `MultiClient` drives several outbound connections off the same selector
//! and tracks how many have finished their handshake.

use std::collections::HashSet;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use spark_core::config::{PacketWorkerConfig, SelectorConfig, SocketOptions, TimeoutConfig};
use spark_core::ids::ChannelId;
use spark_transport_tls::Delegation;

use crate::events::SelectorEvents;
use crate::registry::{ClientSecurity, ListenerSecurity};
use crate::selector::{Selector, StopHandle};

/// A listening endpoint accepting inbound connections on one address.
pub struct Server {
    selector: Selector,
    listener: ChannelId,
}

impl Server {
    pub fn bind(
        addr: SocketAddr,
        security: ListenerSecurity,
        selector_cfg: SelectorConfig,
        socket_opts: SocketOptions,
        packet_cfg: PacketWorkerConfig,
        timeout_cfg: TimeoutConfig,
        delegation: Delegation,
    ) -> io::Result<Self> {
        let mut selector = Selector::new(selector_cfg, socket_opts, packet_cfg, timeout_cfg, delegation)?;
        let listener = selector.add_listener(addr, security)?;
        Ok(Self { selector, listener })
    }

    pub fn listener(&self) -> ChannelId {
        self.listener
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.selector.listener_addr(self.listener)
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.selector.stop_handle()
    }

    pub fn write(&mut self, channel: ChannelId, bytes: &[u8]) -> spark_core::error::Result<()> {
        self.selector.write(channel, bytes)
    }

    pub fn close(&mut self, channel: ChannelId) -> io::Result<()> {
        self.selector.close(channel)
    }

    pub fn invalidate_session(&mut self, channel: ChannelId) {
        self.selector.invalidate_session(channel);
    }

    /// Runs the accept loop until [`Selector::stop`] is called from within
    /// an event callback.
    pub fn run(&mut self, events: &mut dyn SelectorEvents) -> spark_core::error::Result<()> {
        self.selector.run(events)
    }

    pub fn stop(&mut self) {
        self.selector.stop();
    }
}

/// A single outbound connection.
pub struct Client {
    selector: Selector,
    channel: ChannelId,
}

impl Client {
    pub fn connect(
        addr: SocketAddr,
        security: ClientSecurity,
        selector_cfg: SelectorConfig,
        socket_opts: SocketOptions,
        packet_cfg: PacketWorkerConfig,
        timeout_cfg: TimeoutConfig,
        delegation: Delegation,
    ) -> io::Result<Self> {
        let mut selector = Selector::new(selector_cfg, socket_opts, packet_cfg, timeout_cfg, delegation)?;
        let channel = selector.connect(addr, security)?;
        Ok(Self { selector, channel })
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.selector.stop_handle()
    }

    pub fn write(&mut self, bytes: &[u8]) -> spark_core::error::Result<()> {
        self.selector.write(self.channel, bytes)
    }

    pub fn invalidate_session(&mut self) {
        self.selector.invalidate_session(self.channel);
    }

    /// Closes the one socket a `Client` owns and stops its reactor — per
    /// spec §4.7, a client has nothing left to run for once its only
    /// channel is gone.
    pub fn close(&mut self) -> io::Result<()> {
        let result = self.selector.close(self.channel);
        self.selector.stop();
        result
    }

    /// Runs until the connect succeeds and the channel later closes, the
    /// connect itself fails, or [`Selector::stop`]/[`StopHandle::request_stop`]
    /// is called. A failed connect stops the reactor automatically (spec
    /// §4.1: "on failure, log and stop — client mode only has one socket"),
    /// since otherwise `Poll::poll` would block forever with no registered
    /// sockets left.
    pub fn run(&mut self, events: &mut dyn SelectorEvents) -> spark_core::error::Result<()> {
        let mut guard = ClientRunGuard {
            inner: events,
            channel: self.channel,
            ready: false,
            stop: self.selector.stop_handle(),
        };
        self.selector.run(&mut guard)
    }

    pub fn stop(&mut self) {
        self.selector.stop();
    }
}

/// Wraps a `Client`'s own `SelectorEvents` so a connect failure or an
/// early close of its single channel stops the reactor instead of leaving
/// it blocked in `Poll::poll` with nothing left registered.
struct ClientRunGuard<'a> {
    inner: &'a mut dyn SelectorEvents,
    channel: ChannelId,
    ready: bool,
    stop: StopHandle,
}

impl<'a> SelectorEvents for ClientRunGuard<'a> {
    fn on_ready(&mut self, channel: ChannelId) {
        if channel == self.channel {
            self.ready = true;
        }
        self.inner.on_ready(channel);
    }

    fn on_frame(&mut self, channel: ChannelId, frame: bytes::Bytes) {
        self.inner.on_frame(channel, frame);
    }

    fn on_closed(&mut self, channel: ChannelId, cause: Option<spark_core::error::CoreError>) {
        if channel == self.channel && !self.ready {
            self.stop.request_stop();
        }
        self.inner.on_closed(channel, cause);
    }

    fn take_outbound(&mut self) -> Vec<(ChannelId, bytes::Bytes)> {
        self.inner.take_outbound()
    }
}

/// N parallel outbound connections sharing one selector, for workloads that
/// fan a single logical operation out across several peers (spec §4.7).
pub struct MultiClient {
    selector: Selector,
    channels: Vec<ChannelId>,
    ready: Arc<Mutex<HashSet<ChannelId>>>,
}

/// Tracks which of a [`MultiClient`]'s channels have finished handshaking,
/// wrapping an application's own [`SelectorEvents`] so `MultiClient` doesn't
/// have to parse handshake status itself — it just watches `on_ready`. The
/// set lives behind an `Arc<Mutex<_>>` shared with the owning `MultiClient`
/// so its "all ready?" state can be polled from another thread while
/// `run`/`run_until_all_ready` is blocked in `Poll::poll`.
struct HandshakeTracker<'a> {
    inner: &'a mut dyn SelectorEvents,
    ready: Arc<Mutex<HashSet<ChannelId>>>,
}

impl<'a> SelectorEvents for HandshakeTracker<'a> {
    fn on_ready(&mut self, channel: ChannelId) {
        self.ready.lock().insert(channel);
        self.inner.on_ready(channel);
    }

    fn on_frame(&mut self, channel: ChannelId, frame: bytes::Bytes) {
        self.inner.on_frame(channel, frame);
    }

    fn on_closed(&mut self, channel: ChannelId, cause: Option<spark_core::error::CoreError>) {
        self.ready.lock().remove(&channel);
        self.inner.on_closed(channel, cause);
    }

    fn take_outbound(&mut self) -> Vec<(ChannelId, bytes::Bytes)> {
        self.inner.take_outbound()
    }
}

impl MultiClient {
    pub fn new(
        selector_cfg: SelectorConfig,
        socket_opts: SocketOptions,
        packet_cfg: PacketWorkerConfig,
        timeout_cfg: TimeoutConfig,
        delegation: Delegation,
    ) -> io::Result<Self> {
        let selector = Selector::new(selector_cfg, socket_opts, packet_cfg, timeout_cfg, delegation)?;
        Ok(Self {
            selector,
            channels: Vec::new(),
            ready: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    pub fn connect(&mut self, addr: SocketAddr, security: ClientSecurity) -> io::Result<ChannelId> {
        let channel = self.selector.connect(addr, security)?;
        self.channels.push(channel);
        Ok(channel)
    }

    pub fn channels(&self) -> &[ChannelId] {
        &self.channels
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.selector.stop_handle()
    }

    pub fn invalidate_session(&mut self, channel: ChannelId) {
        self.selector.invalidate_session(channel);
    }

    pub fn write(&mut self, channel: ChannelId, bytes: &[u8]) -> spark_core::error::Result<()> {
        self.selector.write(channel, bytes)
    }

    /// The channels that have completed their handshake so far. Safe to
    /// call from another thread while `run`/`run_until_all_ready` is
    /// blocked on this selector's own thread.
    pub fn ready_channels(&self) -> HashSet<ChannelId> {
        self.ready.lock().clone()
    }

    /// True once every channel passed to [`Self::connect`] has completed
    /// its handshake — the "all handshakes done?" query spec §4.7 asks for,
    /// pollable mid-run rather than only after the caller has already
    /// decided to stop.
    pub fn all_ready(&self) -> bool {
        self.ready.lock().len() >= self.channels.len()
    }

    /// Runs the shared selector, stopping once every connected channel has
    /// either finished its handshake or been closed, or `events` itself
    /// calls [`Selector::stop`] first via some other condition.
    pub fn run_until_all_ready(&mut self, events: &mut dyn SelectorEvents) -> spark_core::error::Result<HashSet<ChannelId>> {
        let mut tracker = HandshakeTracker {
            inner: events,
            ready: Arc::clone(&self.ready),
        };
        // `Selector::run` only returns on `stop()`/`StopHandle::request_stop`;
        // a caller that wants to stop the instant every channel is ready
        // should poll `Self::all_ready`/`Self::ready_channels` from another
        // thread (or from its own `on_ready` override) and call
        // `Self::stop_handle().request_stop()` once it reports true.
        self.selector.run(&mut tracker)?;
        Ok(self.ready.lock().clone())
    }

    pub fn run(&mut self, events: &mut dyn SelectorEvents) -> spark_core::error::Result<()> {
        self.selector.run(events)
    }

    pub fn stop(&mut self) {
        self.selector.stop();
    }
}
