//! The event-loop selector (spec §4.1): a single-threaded, non-blocking
//! readiness loop built on `mio`. Owns the channel registry, the
//! pending-writes slice of each channel, and the pending-changes queue
//! exclusively — no other thread ever touches them directly; they only
//! reach the selector through [`ChangeRequest`]s or through `mio`'s own
//! thread-safe `Registry`/`Waker`.
//!
//! Grounded in `spark-transport-tcp`'s bind/accept/connect module shape
//! (no teacher crate drives a raw reactor itself — see `DESIGN.md`).

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mio::{Events, Interest as MioInterest, Poll, Token, Waker};

use spark_core::change::{ChangeKind, ChangeRequest, ChangeSink};
use spark_core::config::{PacketWorkerConfig, SelectorConfig, SocketOptions, TimeoutConfig};
use spark_core::error::CoreError;
use spark_core::ids::{ChannelId, ChannelIdAllocator};
use spark_core::ready::Interest;
use spark_framing::{FramingStrategy, PacketWorker, SimpleFraming};
use spark_timeout::TimeoutManager;
use spark_transport_tls::{Delegation, HandshakeStatus, TaskWorker, TlsSession};

use crate::changes::PendingChanges;
use crate::events::{EventsFrameSink, SelectorEvents};
use crate::registry::{Channel, ChannelRegistry, ClientSecurity, Listener, ListenerSecurity, Role, Security};
use crate::socket_opts;

const WAKER_TOKEN: Token = Token(usize::MAX);
const READ_SCRATCH_LEN: usize = 8 * 1024;

fn to_mio_interest(interest: Interest) -> Option<MioInterest> {
    let readable = interest.contains(Interest::READABLE) || interest.contains(Interest::ACCEPTABLE);
    let writable = interest.contains(Interest::WRITABLE) || interest.contains(Interest::CONNECTABLE);
    match (readable, writable) {
        (true, true) => Some(MioInterest::READABLE | MioInterest::WRITABLE),
        (true, false) => Some(MioInterest::READABLE),
        (false, true) => Some(MioInterest::WRITABLE),
        (false, false) => None,
    }
}

/// A cloneable, `Send + Sync` handle that lets another thread ask a running
/// [`Selector`] to stop. `Selector::run` only ever checks its own state from
/// the selector thread, so stopping it from the outside needs the same
/// waker trick [`PendingChanges`] uses to interrupt a blocked `poll()`.
#[derive(Clone)]
pub struct StopHandle {
    shutdown: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl StopHandle {
    pub fn request_stop(&self) {
        self.shutdown.store(true, Ordering::Release);
        if let Err(err) = self.waker.wake() {
            tracing::warn!(error = %err, "failed to wake selector to deliver stop request");
        }
    }
}

/// The single-threaded event-loop selector.
pub struct Selector {
    poll: Poll,
    events_buf: Events,
    registry: ChannelRegistry,
    id_alloc: ChannelIdAllocator,
    pending_changes: Arc<PendingChanges>,
    packet_worker: PacketWorker,
    task_worker: Arc<TaskWorker>,
    timeouts: Arc<TimeoutManager>,
    socket_opts: SocketOptions,
    selector_cfg: SelectorConfig,
    delegation: Delegation,
    inactivity_timeout: Duration,
    framing_factory: Box<dyn Fn() -> Box<dyn FramingStrategy> + Send>,
    running: bool,
    shutdown: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl Selector {
    pub fn new(
        selector_cfg: SelectorConfig,
        socket_opts: SocketOptions,
        packet_cfg: PacketWorkerConfig,
        timeout_cfg: TimeoutConfig,
        delegation: Delegation,
    ) -> io::Result<Self> {
        let poll = Poll::new()?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER_TOKEN)?);
        let pending_changes = PendingChanges::new(Arc::clone(&waker));
        let timeouts = Arc::new(TimeoutManager::new(
            Arc::clone(&pending_changes) as Arc<dyn ChangeSink>
        ));

        Ok(Self {
            poll,
            events_buf: Events::with_capacity(1024),
            registry: ChannelRegistry::new(),
            id_alloc: ChannelIdAllocator::new(),
            pending_changes,
            packet_worker: PacketWorker::new(packet_cfg.buffer_size, packet_cfg.buffer_cap),
            task_worker: Arc::new(TaskWorker::new()),
            timeouts,
            socket_opts,
            selector_cfg,
            delegation,
            inactivity_timeout: Duration::from_millis(timeout_cfg.period_ms),
            framing_factory: Box::new(|| Box::new(SimpleFraming)),
            running: false,
            shutdown: Arc::new(AtomicBool::new(false)),
            waker,
        })
    }

    /// A handle another thread can use to stop this selector's [`Self::run`]
    /// loop. Needed because `run` blocks this selector's own thread — there
    /// is no other way to reach into it from the outside.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shutdown: Arc::clone(&self.shutdown),
            waker: Arc::clone(&self.waker),
        }
    }

    /// Overrides the framing strategy new channels are registered with.
    /// Defaults to [`SimpleFraming`].
    pub fn with_framing<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn FramingStrategy> + Send + 'static,
    {
        self.framing_factory = Box::new(factory);
        self
    }

    pub fn change_sink(&self) -> Arc<dyn ChangeSink> {
        Arc::clone(&self.pending_changes) as Arc<dyn ChangeSink>
    }

    /// A handle other threads can post changes through without holding a
    /// reference to the selector itself. Identical to [`Self::change_sink`]
    /// — kept as a separate name because "send a change" reads more
    /// naturally at call sites that aren't themselves `ChangeSink`s.
    pub fn sender(&self) -> Arc<dyn ChangeSink> {
        self.change_sink()
    }

    pub fn add_listener(&mut self, addr: SocketAddr, security: ListenerSecurity) -> io::Result<ChannelId> {
        let mut socket = mio::net::TcpListener::bind(addr)?;
        let id = self.id_alloc.next();
        let token = ChannelRegistry::token_of(id);
        self.poll
            .registry()
            .register(&mut socket, token, MioInterest::READABLE)?;
        self.registry.insert_listener(Listener { id, socket, security });
        Ok(id)
    }

    /// The local address a listener bound to — useful when `add_listener`
    /// was called with port `0` and the caller needs to discover the
    /// kernel-assigned port.
    pub fn listener_addr(&self, id: ChannelId) -> io::Result<SocketAddr> {
        self.registry
            .listener(id)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such listener"))?
            .socket
            .local_addr()
    }

    pub fn remove_listener(&mut self, id: ChannelId) -> io::Result<()> {
        if let Some(mut listener) = self.registry.remove_listener(id) {
            self.poll.registry().deregister(&mut listener.socket)?;
        }
        Ok(())
    }

    /// Begins a non-blocking outbound connection. `finish_connect` (and, for
    /// secure channels, the handshake) completes asynchronously once the
    /// socket reports `WRITABLE`.
    pub fn connect(&mut self, addr: SocketAddr, security: ClientSecurity) -> io::Result<ChannelId> {
        let mut socket = mio::net::TcpStream::connect(addr)?;
        socket_opts::apply_base_options(&socket, &self.socket_opts)?;

        let id = self.id_alloc.next();
        let token = ChannelRegistry::token_of(id);
        self.poll
            .registry()
            .register(&mut socket, token, MioInterest::WRITABLE)?;

        let security = match security {
            ClientSecurity::Plain => Security::Plain,
            ClientSecurity::Secure { config, server_name } => {
                let session = TlsSession::new_client(
                    id,
                    config,
                    server_name,
                    self.delegation,
                    self.change_sink(),
                    Arc::clone(&self.timeouts),
                    self.inactivity_timeout,
                )
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
                Security::Secure(session)
            }
        };

        self.packet_worker.register(id, (self.framing_factory)());
        self.registry.insert_channel(Channel {
            id,
            socket,
            role: Role::Client,
            security,
            interest: Interest::CONNECTABLE,
            connecting: true,
            pending_writes: VecDeque::new(),
        });
        Ok(id)
    }

    /// Queues `bytes` for `channel`, writing as much as the socket accepts
    /// immediately and buffering the rest.
    pub fn write(&mut self, channel: ChannelId, bytes: &[u8]) -> Result<(), CoreError> {
        let secure_session = self
            .registry
            .channel(channel)
            .and_then(|c| c.security.session())
            .cloned();

        let Some(chan) = self.registry.channel_mut(channel) else {
            return Ok(());
        };
        if chan.has_pending_writes() {
            chan.queue_write(bytes);
            return Ok(());
        }

        let written = if let Some(session) = &secure_session {
            session.write(&mut chan.socket, bytes).map_err(CoreError::from)?.0
        } else {
            match chan.socket.write(bytes) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => 0,
                Err(e) => return Err(CoreError::io("reactor.write", e)),
            }
        };

        if written < bytes.len() {
            chan.queue_write(&bytes[written..]);
            chan.interest.insert(Interest::WRITABLE);
            self.rearm(channel)?;
        } else if let Some(session) = &secure_session {
            // `session.write` always consumes all of `bytes` into rustls's
            // own plaintext-send buffer even when the socket itself is
            // full (`write_tls` hit `WouldBlock`) — the ciphertext stays
            // queued inside the session rather than in this channel's
            // pending-writes queue. Arm `WRITABLE` so `flush_pending_writes`
            // drains it on the next writable event; otherwise a large
            // one-shot send would stall forever with nothing armed.
            if session.wants_write() {
                if let Some(chan) = self.registry.channel_mut(channel) {
                    chan.interest.insert(Interest::WRITABLE);
                }
                self.rearm(channel)?;
            }
        }
        Ok(())
    }

    pub fn close(&mut self, channel: ChannelId) -> io::Result<()> {
        if let Some(mut chan) = self.registry.remove_channel(channel) {
            if let Security::Secure(session) = &chan.security {
                session.close(&mut chan.socket);
            }
            self.poll.registry().deregister(&mut chan.socket)?;
            self.packet_worker.unregister(channel);
        }
        Ok(())
    }

    /// Rotates `channel`'s TLS session: re-handshakes on the same socket
    /// rather than closing it (spec §4.1). A no-op for plain channels and
    /// for unknown channel ids.
    pub fn invalidate_session(&mut self, channel: ChannelId) {
        self.pending_changes
            .post(ChangeRequest::new(channel, ChangeKind::SessionInvalidated));
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    fn rearm(&mut self, channel: ChannelId) -> io::Result<()> {
        let Some(chan) = self.registry.channel_mut(channel) else {
            return Ok(());
        };
        if let Some(mio_interest) = to_mio_interest(chan.interest) {
            self.poll
                .registry()
                .reregister(&mut chan.socket, ChannelRegistry::token_of(channel), mio_interest)?;
        }
        Ok(())
    }

    /// Runs until [`Self::stop`] is called (from within a callback) or a
    /// multiplexer-fatal error occurs.
    pub fn run(&mut self, events: &mut dyn SelectorEvents) -> Result<(), CoreError> {
        self.running = true;
        while self.running && !self.shutdown.load(Ordering::Acquire) {
            self.drain_pending_changes(events)?;
            // §6: `process_all_changes=true` blocks indefinitely (the
            // pending-changes queue was just fully drained above, so there
            // is nothing more to do until a socket or waker event arrives);
            // otherwise `socket.max_changes` doubles as a bounded select
            // timeout in milliseconds, so a selector that only processes a
            // capped slice of changes per iteration still revisits the
            // queue promptly instead of blocking on readiness forever.
            let select_timeout = if self.selector_cfg.process_all_changes {
                None
            } else {
                Some(Duration::from_millis(self.selector_cfg.max_changes as u64))
            };
            self.poll
                .poll(&mut self.events_buf, select_timeout)
                .map_err(|e| CoreError::io("reactor.poll", e))?;

            let tokens: Vec<(Token, bool, bool)> = self
                .events_buf
                .iter()
                .map(|e| (e.token(), e.is_readable(), e.is_writable()))
                .collect();

            for (token, readable, writable) in tokens {
                if token == WAKER_TOKEN {
                    continue;
                }
                let id = ChannelRegistry::id_of(token);
                if self.registry.is_listener(id) {
                    if readable {
                        self.accept_all(id, events)?;
                        self.flush_outbound(events)?;
                    }
                    continue;
                }
                if writable {
                    self.on_writable(id, events)?;
                }
                if readable {
                    self.on_readable(id, events)?;
                }
                self.flush_outbound(events)?;
            }
        }
        Ok(())
    }

    fn flush_outbound(&mut self, events: &mut dyn SelectorEvents) -> Result<(), CoreError> {
        for (channel, bytes) in events.take_outbound() {
            self.write(channel, &bytes)?;
        }
        Ok(())
    }

    fn drain_pending_changes(&mut self, events: &mut dyn SelectorEvents) -> Result<(), CoreError> {
        let changes = if self.selector_cfg.process_all_changes {
            self.pending_changes.drain()
        } else {
            self.pending_changes.drain_up_to(self.selector_cfg.max_changes)
        };
        for change in changes {
            self.apply_change(change, events)?;
            self.flush_outbound(events)?;
        }
        Ok(())
    }

    fn apply_change(&mut self, change: ChangeRequest, events: &mut dyn SelectorEvents) -> Result<(), CoreError> {
        // A change can legitimately arrive for a channel that has since
        // been closed (e.g. a timeout firing just after the peer's own
        // close_notify already tore the channel down) — skip it rather
        // than treating it as an error (spec §9).
        if self.registry.channel(change.channel).is_none() {
            tracing::debug!(channel = %change.channel, change = %change.kind, "dropping stale change for unknown channel");
            return Ok(());
        }

        match change.kind {
            ChangeKind::InterestOps(interest) => {
                if let Some(chan) = self.registry.channel_mut(change.channel) {
                    chan.interest = interest;
                }
                self.rearm(change.channel).map_err(|e| CoreError::io("reactor.rearm", e))?;
            }
            ChangeKind::TaskComplete => {
                self.resume_handshake(change.channel, events)?;
            }
            ChangeKind::TimeoutExpired => {
                tracing::warn!(channel = %change.channel, "closing channel after timeout");
                self.close(change.channel).map_err(|e| CoreError::io("reactor.close", e))?;
                events.on_closed(
                    change.channel,
                    Some(CoreError::timeout("reactor.handshake_timeout", "handshake did not complete in time")),
                );
            }
            ChangeKind::SessionInvalidated => {
                // Rotation, not teardown (spec §4.1): re-run the handshake
                // on the same channel rather than closing it.
                if let Some(chan) = self.registry.channel(change.channel) {
                    if let Security::Secure(session) = &chan.security {
                        session.invalidate_session();
                        session.init_handshake();
                    }
                }
                self.resume_handshake(change.channel, events)?;
            }
        }
        Ok(())
    }

    fn accept_all(&mut self, listener_id: ChannelId, events: &mut dyn SelectorEvents) -> Result<(), CoreError> {
        loop {
            let accepted = {
                let Some(listener) = self.registry.listener_mut(listener_id) else {
                    return Ok(());
                };
                match listener.socket.accept() {
                    Ok(pair) => pair,
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                        return Ok(());
                    }
                }
            };
            let (mut socket, _peer) = accepted;
            socket_opts::apply_base_options(&socket, &self.socket_opts)
                .and_then(|_| socket_opts::apply_tcp_nodelay(&socket, &self.socket_opts))
                .map_err(|e| CoreError::io("reactor.accept_socket_opts", e))?;

            let id = self.id_alloc.next();
            let token = ChannelRegistry::token_of(id);
            self.poll
                .registry()
                .register(&mut socket, token, MioInterest::READABLE)
                .map_err(|e| CoreError::io("reactor.register_accepted", e))?;

            let (security, is_secure) = {
                let Some(listener) = self.registry.listener(listener_id) else {
                    continue;
                };
                match &listener.security {
                    ListenerSecurity::Plain => (Security::Plain, false),
                    ListenerSecurity::Secure(config) => {
                        let session = TlsSession::new_server(
                            id,
                            Arc::clone(config),
                            self.delegation,
                            self.change_sink(),
                            Arc::clone(&self.timeouts),
                            self.inactivity_timeout,
                        )
                        .map_err(CoreError::from)?;
                        (Security::Secure(session), true)
                    }
                }
            };

            self.packet_worker.register(id, (self.framing_factory)());
            self.registry.insert_channel(Channel {
                id,
                socket,
                role: Role::Server,
                security,
                interest: Interest::READABLE,
                connecting: false,
                pending_writes: VecDeque::new(),
            });
            // A TLS accept does not begin a handshake in the SSLEngine
            // sense (spec §4.1) — but an edge-triggered poller will never
            // report `READABLE` for a peer that accepts and then sends
            // nothing, so nothing would ever drive `process_handshake` far
            // enough to arm the inactivity timeout. Run one handshake step
            // right away: it only reaches a `WouldBlock` on `read_tls` (no
            // bytes have arrived yet) and arms the timeout, without
            // otherwise progressing the handshake or sending anything.
            if is_secure {
                self.resume_handshake(id, events)?;
            }
        }
    }

    fn on_writable(&mut self, id: ChannelId, events: &mut dyn SelectorEvents) -> Result<(), CoreError> {
        let finishing_connect = self
            .registry
            .channel(id)
            .map(|c| c.connecting)
            .unwrap_or(false);

        if finishing_connect {
            return self.finish_connect(id, events);
        }

        let handshake_pending = self
            .registry
            .channel(id)
            .and_then(|c| c.security.session())
            .map(|s| s.handshake_pending())
            .unwrap_or(false);

        if handshake_pending {
            return self.resume_handshake(id, events);
        }

        self.flush_pending_writes(id)
    }

    fn finish_connect(&mut self, id: ChannelId, events: &mut dyn SelectorEvents) -> Result<(), CoreError> {
        let Some(chan) = self.registry.channel_mut(id) else {
            return Ok(());
        };
        match chan.socket.take_error() {
            Ok(None) => {}
            Ok(Some(e)) | Err(e) => {
                tracing::warn!(channel = %id, error = %e, "connect failed");
                self.close(id).map_err(|e| CoreError::io("reactor.close", e))?;
                events.on_closed(id, Some(CoreError::io("reactor.connect_failed", e)));
                return Ok(());
            }
        }
        chan.connecting = false;
        socket_opts::apply_tcp_nodelay(&chan.socket, &self.socket_opts)
            .map_err(|e| CoreError::io("reactor.post_connect_nodelay", e))?;

        let is_secure = chan.security.is_secure();
        if is_secure {
            if let Security::Secure(session) = &chan.security {
                session.init_handshake();
            }
            self.resume_handshake(id, events)
        } else {
            if let Some(chan) = self.registry.channel_mut(id) {
                chan.interest = Interest::READABLE;
            }
            self.rearm(id).map_err(|e| CoreError::io("reactor.rearm", e))?;
            events.on_ready(id);
            Ok(())
        }
    }

    /// Drives the handshake for `id` one step further — called right
    /// after accept/connect, on every subsequent readable/writable event
    /// while a handshake is pending, and after a `TaskComplete` change.
    fn resume_handshake(&mut self, id: ChannelId, events: &mut dyn SelectorEvents) -> Result<(), CoreError> {
        let Some(chan) = self.registry.channel_mut(id) else {
            return Ok(());
        };
        let Security::Secure(session) = &chan.security else {
            return Ok(());
        };
        let session = Arc::clone(session);

        let status = session
            .process_handshake(&mut chan.socket, &self.task_worker)
            .map_err(CoreError::from)?;

        match status {
            HandshakeStatus::NeedWrap => {
                if let Some(chan) = self.registry.channel_mut(id) {
                    chan.interest = Interest::WRITABLE;
                }
                self.rearm(id).map_err(|e| CoreError::io("reactor.rearm", e))?;
            }
            HandshakeStatus::NeedUnwrap => {
                if let Some(chan) = self.registry.channel_mut(id) {
                    chan.interest = Interest::READABLE;
                }
                self.rearm(id).map_err(|e| CoreError::io("reactor.rearm", e))?;
            }
            HandshakeStatus::NeedTask => {
                // Concurrency contract: don't touch this channel again
                // until `TaskComplete` arrives, so drop all interest.
                if let Some(chan) = self.registry.channel_mut(id) {
                    chan.interest = Interest::NONE;
                }
                self.deregister_interest(id)?;
            }
            HandshakeStatus::Finished | HandshakeStatus::NotHandshaking => {
                if let Some(chan) = self.registry.channel_mut(id) {
                    chan.interest = Interest::READABLE;
                }
                self.rearm(id).map_err(|e| CoreError::io("reactor.rearm", e))?;
                events.on_ready(id);
            }
        }
        Ok(())
    }

    fn deregister_interest(&mut self, id: ChannelId) -> Result<(), CoreError> {
        let Some(chan) = self.registry.channel_mut(id) else {
            return Ok(());
        };
        // `mio` requires a non-empty interest set; parking the channel
        // on `READABLE` while a task runs is harmless since the selector
        // won't act on readiness for a channel whose handshake is
        // `NeedTask` anyway (callers check `handshake_pending`/process
        // results, not raw readiness, before touching a TLS channel).
        self.poll
            .registry()
            .reregister(&mut chan.socket, ChannelRegistry::token_of(id), MioInterest::READABLE)
            .map_err(|e| CoreError::io("reactor.rearm", e))
    }

    fn on_readable(&mut self, id: ChannelId, events: &mut dyn SelectorEvents) -> Result<(), CoreError> {
        let handshake_pending = self
            .registry
            .channel(id)
            .and_then(|c| c.security.session())
            .map(|s| s.handshake_pending())
            .unwrap_or(false);

        if handshake_pending {
            return self.resume_handshake(id, events);
        }

        let mut scratch = [0u8; READ_SCRATCH_LEN];
        loop {
            let Some(chan) = self.registry.channel_mut(id) else {
                return Ok(());
            };
            let outcome = if let Security::Secure(session) = &chan.security {
                let session = Arc::clone(session);
                session.read(&mut chan.socket, &mut scratch).map_err(CoreError::from)
            } else {
                match chan.socket.read(&mut scratch) {
                    Ok(0) => Ok((0, spark_transport_tls::EngineStatus::Closed)),
                    Ok(n) => Ok((n, spark_transport_tls::EngineStatus::Ok)),
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                        Ok((0, spark_transport_tls::EngineStatus::BufferUnderflow))
                    }
                    Err(e) => Err(CoreError::io("reactor.read", e)),
                }
            }?;

            let (n, status) = outcome;
            if status == spark_transport_tls::EngineStatus::Closed {
                self.close(id).map_err(|e| CoreError::io("reactor.close", e))?;
                events.on_closed(id, None);
                return Ok(());
            }
            if n == 0 {
                // No more data available right now (`WouldBlock`/
                // `BufferUnderflow`) — not a close, just the end of this
                // readiness burst.
                break;
            }

            self.packet_worker
                .add_data(id, &scratch[..n])
                .map_err(CoreError::from)?;

            if n < READ_SCRATCH_LEN {
                break;
            }
        }

        let mut sink = EventsFrameSink { events };
        self.packet_worker.process_ready(&mut sink);
        Ok(())
    }

    fn flush_pending_writes(&mut self, id: ChannelId) -> Result<(), CoreError> {
        let Some(chan) = self.registry.channel_mut(id) else {
            return Ok(());
        };
        if chan.pending_writes.is_empty() {
            // A TLS channel can still have ciphertext rustls itself is
            // holding onto from an earlier `write_tls` that hit
            // `WouldBlock` — nothing in the app-level pending-writes queue
            // reflects that backlog, so it has to be drained here too.
            if let Some(session) = chan.security.session().cloned() {
                session.flush(&mut chan.socket).map_err(CoreError::from)?;
                if session.wants_write() {
                    return Ok(());
                }
            }
            let Some(chan) = self.registry.channel_mut(id) else {
                return Ok(());
            };
            chan.interest.remove(Interest::WRITABLE);
            return self.rearm(id).map_err(|e| CoreError::io("reactor.rearm", e));
        }

        let pending: Vec<u8> = chan.pending_writes.iter().copied().collect();
        let secure_session = chan.security.session().cloned();

        let written = if let Some(session) = &secure_session {
            session.write(&mut chan.socket, &pending).map_err(CoreError::from)?.0
        } else {
            match chan.socket.write(&pending) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => 0,
                Err(e) => return Err(CoreError::io("reactor.flush", e)),
            }
        };

        let Some(chan) = self.registry.channel_mut(id) else {
            return Ok(());
        };
        for _ in 0..written {
            chan.pending_writes.pop_front();
        }
        if chan.pending_writes.is_empty() {
            chan.interest.remove(Interest::WRITABLE);
        }
        self.rearm(id).map_err(|e| CoreError::io("reactor.rearm", e))
    }
}
