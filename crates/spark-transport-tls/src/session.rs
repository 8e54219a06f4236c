//! The TLS channel state machine (spec §4.3) plus its delegated-task
//! hookup (§4.4), hand-driven against `rustls` the way
//! `other_examples/...linkerd-tcp__src-connection-secure.rs.rs` and
//! `examples/warpy-ai-script/src/runtime/async/tls.rs` both drive it: feed
//! ciphertext in with `read_tls`, let `process_new_packets` do the crypto
//! work, drain plaintext with `reader()`, and flush queued ciphertext with
//! `write_tls`.
//!
//! Of the four buffers spec §3 names on a TLS channel, two
//! (`encrypted_in`/`encrypted_out`) are `rustls::Connection`'s own internal
//! deframer/ciphertext-writer buffers — `read_tls`/`write_tls` already read
//! and write straight against the raw socket, so reimplementing them here
//! would just be a second, redundant copy. The other two collapse to one
//! field on [`Inner`]: `pending_plaintext`, the "decrypted_in" staging area
//! for plaintext `process_new_packets` produced that a caller's `read`
//! buffer was too small to take in one call. There is no separate
//! "decrypted_out": `conn.writer()` already queues outbound plaintext for
//! encryption internally.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use parking_lot::Mutex;
use rustls::{ClientConfig, ServerConfig};
use rustls_pki_types::ServerName;
use spark_core::change::{ChangeKind, ChangeRequest, ChangeSink};
use spark_core::ids::{ChannelId, TimeoutId};
use spark_timeout::TimeoutManager;

use crate::error::TlsError;
use crate::status::{EngineStatus, HandshakeStatus};
use crate::task_worker::TaskWorker;

/// Whether the crypto-heavy step of a handshake (`process_new_packets`)
/// runs inline on the calling thread or is hemmed off to the delegated-task
/// worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delegation {
    InThread,
    OffThread,
}

struct Inner {
    conn: rustls::Connection,
    pending_plaintext: BytesMut,
    status: HandshakeStatus,
    armed_timeout: Option<TimeoutId>,
}

/// A single TLS-secured channel's state. Shared as `Arc<TlsSession>`: the
/// selector thread drives it via `process_handshake`/`read`/`write`, and
/// (in [`Delegation::OffThread`] mode) the task worker thread drives it via
/// `run_delegated_task` — never both at once, per the concurrency contract
/// in spec §4.3, which the `Mutex` around [`Inner`] enforces as a backstop
/// even though the two callers are already supposed to take turns.
pub struct TlsSession {
    channel: ChannelId,
    inner: Mutex<Inner>,
    handshake_pending: AtomicBool,
    task_pending: AtomicBool,
    delegation: Delegation,
    change_sink: Arc<dyn ChangeSink>,
    timeouts: Arc<TimeoutManager>,
    inactivity: Duration,
}

impl TlsSession {
    pub fn new_server(
        channel: ChannelId,
        config: Arc<ServerConfig>,
        delegation: Delegation,
        change_sink: Arc<dyn ChangeSink>,
        timeouts: Arc<TimeoutManager>,
        inactivity: Duration,
    ) -> Result<Arc<Self>, TlsError> {
        let conn = rustls::ServerConnection::new(config)?;
        Ok(Self::from_connection(
            channel,
            rustls::Connection::Server(conn),
            delegation,
            change_sink,
            timeouts,
            inactivity,
        ))
    }

    pub fn new_client(
        channel: ChannelId,
        config: Arc<ClientConfig>,
        server_name: ServerName<'static>,
        delegation: Delegation,
        change_sink: Arc<dyn ChangeSink>,
        timeouts: Arc<TimeoutManager>,
        inactivity: Duration,
    ) -> Result<Arc<Self>, TlsError> {
        let conn = rustls::ClientConnection::new(config, server_name)?;
        Ok(Self::from_connection(
            channel,
            rustls::Connection::Client(conn),
            delegation,
            change_sink,
            timeouts,
            inactivity,
        ))
    }

    fn from_connection(
        channel: ChannelId,
        conn: rustls::Connection,
        delegation: Delegation,
        change_sink: Arc<dyn ChangeSink>,
        timeouts: Arc<TimeoutManager>,
        inactivity: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            channel,
            inner: Mutex::new(Inner {
                conn,
                pending_plaintext: BytesMut::new(),
                status: HandshakeStatus::NeedUnwrap,
                armed_timeout: None,
            }),
            handshake_pending: AtomicBool::new(true),
            task_pending: AtomicBool::new(false),
            delegation,
            change_sink,
            timeouts,
            inactivity,
        })
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Marks the handshake as not-yet-started. A fresh `rustls::Connection`
    /// already wants to write its first flight, so this only exists to make
    /// "a handshake is owed on this channel" an explicit, checkable fact
    /// rather than an implicit consequence of construction order.
    pub fn init_handshake(&self) {
        self.handshake_pending.store(true, Ordering::Release);
    }

    pub fn handshake_pending(&self) -> bool {
        self.handshake_pending.load(Ordering::Acquire)
    }

    pub fn task_pending(&self) -> bool {
        self.task_pending.load(Ordering::Acquire)
    }

    pub fn status(&self) -> HandshakeStatus {
        self.inner.lock().status
    }

    fn arm_inactivity_timeout(&self, inner: &mut Inner) {
        if inner.armed_timeout.is_none() {
            inner.armed_timeout = Some(self.timeouts.insert(self.channel, self.inactivity));
        }
    }

    fn cancel_inactivity_timeout(&self, inner: &mut Inner) {
        if let Some(id) = inner.armed_timeout.take() {
            self.timeouts.cancel(id);
        }
    }

    /// Drives the handshake as far as it can go without blocking.
    /// `Delegation::OffThread` channels hand the crypto-heavy step to
    /// `tasks` and return `NeedTask` immediately; the caller must not touch
    /// this session again until a `TaskComplete` change arrives.
    pub fn process_handshake<S: Read + Write>(
        self: &Arc<Self>,
        io: &mut S,
        tasks: &TaskWorker,
    ) -> Result<HandshakeStatus, TlsError> {
        let mut inner = self.inner.lock();

        if !inner.conn.is_handshaking() {
            inner.status = HandshakeStatus::NotHandshaking;
            self.handshake_pending.store(false, Ordering::Release);
            self.cancel_inactivity_timeout(&mut inner);
            return Ok(HandshakeStatus::NotHandshaking);
        }

        loop {
            if inner.conn.wants_write() {
                match inner.conn.write_tls(io) {
                    Ok(0) => break,
                    Ok(_) => continue,
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                        inner.status = HandshakeStatus::NeedWrap;
                        break;
                    }
                    Err(e) => return Err(TlsError::Io(e)),
                }
            }

            if inner.conn.wants_read() {
                match inner.conn.read_tls(io) {
                    Ok(0) => return Err(TlsError::PeerClosedDuringHandshake),
                    Ok(_) => {
                        if self.delegation == Delegation::OffThread {
                            inner.status = HandshakeStatus::NeedTask;
                            self.task_pending.store(true, Ordering::Release);
                            let session = Arc::clone(self);
                            drop(inner);
                            tasks.enqueue(move || session.run_delegated_task());
                            return Ok(HandshakeStatus::NeedTask);
                        }
                        inner.conn.process_new_packets().map_err(TlsError::Rustls)?;
                        self.cancel_inactivity_timeout(&mut inner);
                        continue;
                    }
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                        inner.status = HandshakeStatus::NeedUnwrap;
                        self.arm_inactivity_timeout(&mut inner);
                        break;
                    }
                    Err(e) => return Err(TlsError::Io(e)),
                }
            } else {
                break;
            }
        }

        if !inner.conn.is_handshaking() {
            inner.status = HandshakeStatus::Finished;
            self.handshake_pending.store(false, Ordering::Release);
            self.cancel_inactivity_timeout(&mut inner);
        } else {
            self.handshake_pending.store(true, Ordering::Release);
        }
        Ok(inner.status)
    }

    /// Runs on the task-worker thread: the "NEED_TASK" step is exactly the
    /// crypto-heavy `process_new_packets()` call spec §4.4 describes as
    /// running off the selector thread.
    fn run_delegated_task(self: Arc<Self>) {
        let mut inner = self.inner.lock();
        let result = inner.conn.process_new_packets();
        self.cancel_inactivity_timeout(&mut inner);
        drop(inner);
        self.task_pending.store(false, Ordering::Release);
        match result {
            Ok(_) => {
                self.change_sink
                    .post(ChangeRequest::new(self.channel, ChangeKind::TaskComplete));
            }
            Err(err) => {
                tracing::warn!(channel = %self.channel, error = %err, "delegated handshake task failed");
                self.change_sink
                    .post(ChangeRequest::new(self.channel, ChangeKind::SessionInvalidated));
            }
        }
    }

    /// Reads decrypted application data into `dst`, touching the socket at
    /// most once. Returns `(0, BufferUnderflow)` rather than blocking when
    /// no full record has arrived yet.
    pub fn read<S: Read + Write>(
        &self,
        io: &mut S,
        dst: &mut [u8],
    ) -> Result<(usize, EngineStatus), TlsError> {
        let mut inner = self.inner.lock();

        if !inner.pending_plaintext.is_empty() {
            let n = dst.len().min(inner.pending_plaintext.len());
            dst[..n].copy_from_slice(&inner.pending_plaintext[..n]);
            let _ = inner.pending_plaintext.split_to(n);
            return Ok((n, EngineStatus::Ok));
        }

        match inner.conn.read_tls(io) {
            Ok(0) => return Ok((0, EngineStatus::Closed)),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                return Ok((0, EngineStatus::BufferUnderflow));
            }
            Err(e) => return Err(TlsError::Io(e)),
        }

        let io_state = inner.conn.process_new_packets().map_err(TlsError::Rustls)?;
        let available = io_state.plaintext_bytes_to_read();
        if available == 0 {
            return Ok((0, EngineStatus::BufferUnderflow));
        }

        let mut scratch = vec![0u8; available];
        let read = inner.conn.reader().read(&mut scratch)?;
        scratch.truncate(read);

        let n = dst.len().min(scratch.len());
        dst[..n].copy_from_slice(&scratch[..n]);
        let status = if n < scratch.len() {
            inner.pending_plaintext.extend_from_slice(&scratch[n..]);
            EngineStatus::BufferOverflow
        } else {
            EngineStatus::Ok
        };
        Ok((n, status))
    }

    /// Queues `src` for encryption and makes a best-effort attempt to flush
    /// it to the socket immediately. Any remainder stays buffered inside
    /// `rustls` and is retried the next time the selector reports
    /// `WRITABLE`.
    pub fn write<S: Read + Write>(
        &self,
        io: &mut S,
        src: &[u8],
    ) -> Result<(usize, EngineStatus), TlsError> {
        let mut inner = self.inner.lock();
        let n = inner.conn.writer().write(src)?;

        loop {
            if !inner.conn.wants_write() {
                break;
            }
            match inner.conn.write_tls(io) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(TlsError::Io(e)),
            }
        }

        let status = if n == 0 && !src.is_empty() {
            EngineStatus::BufferOverflow
        } else {
            EngineStatus::Ok
        };
        Ok((n, status))
    }

    /// Whether rustls is still holding queued ciphertext that a prior
    /// [`Self::write`]/[`Self::flush`] couldn't get past a full socket.
    /// The selector arms `WRITABLE` while this is true and calls
    /// [`Self::flush`] on the next writable event.
    pub fn wants_write(&self) -> bool {
        self.inner.lock().conn.wants_write()
    }

    /// Drains ciphertext rustls already has queued, without encrypting any
    /// new plaintext. Used by the selector to resume a backlogged TLS send
    /// once the socket reports `WRITABLE` again after an earlier
    /// [`Self::write`] hit `WouldBlock`.
    pub fn flush<S: Write>(&self, io: &mut S) -> Result<(), TlsError> {
        let mut inner = self.inner.lock();
        loop {
            if !inner.conn.wants_write() {
                break;
            }
            match inner.conn.write_tls(io) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(TlsError::Io(e)),
            }
        }
        Ok(())
    }

    /// Marks the session for a fresh handshake without touching the socket
    /// or closing the channel — rotation, not teardown. Per §4.3, a
    /// `SessionInvalidated` change re-enters the handshake driver rather
    /// than closing: `handshake_pending` goes back to `true` and any
    /// outstanding `task_pending` is cleared so the next `process_handshake`
    /// call starts a fresh `NeedUnwrap`/`NeedWrap` cycle instead of waiting
    /// on a task that will never complete.
    pub fn invalidate_session(&self) {
        let mut inner = self.inner.lock();
        inner.status = HandshakeStatus::NotHandshaking;
        self.handshake_pending.store(true, Ordering::Release);
        self.task_pending.store(false, Ordering::Release);
        self.cancel_inactivity_timeout(&mut inner);
    }

    /// Sends `close_notify` and makes one non-blocking attempt to flush it.
    /// Per spec §4.3, a failure here is swallowed rather than propagated:
    /// the channel is going away either way, and waiting for the peer's own
    /// `close_notify` would hang the caller.
    pub fn close<S: Write>(&self, io: &mut S) {
        let mut inner = self.inner.lock();
        inner.conn.send_close_notify();
        let _ = inner.conn.write_tls(io);
        self.cancel_inactivity_timeout(&mut inner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{build_client_config, build_server_config, load_pem_chain, load_pem_key};
    use spark_core::config::TlsSecurityConfig;
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    struct NullSink;
    impl ChangeSink for NullSink {
        fn post(&self, _change: ChangeRequest) {}
    }

    #[test]
    fn handshake_completes_and_exchanges_app_data_over_loopback() {
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let chain = load_pem_chain(cert.pem().as_bytes()).unwrap();
        let key = load_pem_key(key_pair.serialize_pem().as_bytes()).unwrap();
        let server_config =
            build_server_config(chain.clone(), key, &TlsSecurityConfig::default(), None).unwrap();

        let mut roots = rustls::RootCertStore::empty();
        roots.add(chain[0].clone()).unwrap();
        let client_config = build_client_config(roots, &TlsSecurityConfig::default(), None).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server_thread = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let tasks = TaskWorker::new();
            let timeouts = Arc::new(TimeoutManager::new(Arc::new(NullSink)));
            let session = TlsSession::new_server(
                ChannelId::from_raw(1),
                server_config,
                Delegation::InThread,
                Arc::new(NullSink),
                timeouts,
                Duration::from_secs(5),
            )
            .unwrap();

            loop {
                let status = session.process_handshake(&mut sock, &tasks).unwrap();
                if matches!(status, HandshakeStatus::Finished | HandshakeStatus::NotHandshaking) {
                    break;
                }
            }

            let mut buf = [0u8; 64];
            let n = loop {
                let (n, _status) = session.read(&mut sock, &mut buf).unwrap();
                if n > 0 {
                    break n;
                }
            };
            session.write(&mut sock, &buf[..n]).unwrap();
        });

        let mut client_sock = TcpStream::connect(addr).unwrap();
        let tasks = TaskWorker::new();
        let timeouts = Arc::new(TimeoutManager::new(Arc::new(NullSink)));
        let server_name = ServerName::try_from("localhost").unwrap().to_owned();
        let session = TlsSession::new_client(
            ChannelId::from_raw(2),
            client_config,
            server_name,
            Delegation::InThread,
            Arc::new(NullSink),
            timeouts,
            Duration::from_secs(5),
        )
        .unwrap();

        loop {
            let status = session.process_handshake(&mut client_sock, &tasks).unwrap();
            if matches!(status, HandshakeStatus::Finished | HandshakeStatus::NotHandshaking) {
                break;
            }
        }

        session.write(&mut client_sock, b"ping").unwrap();
        let mut buf = [0u8; 64];
        let n = loop {
            let (n, _status) = session.read(&mut client_sock, &mut buf).unwrap();
            if n > 0 {
                break n;
            }
        };
        assert_eq!(&buf[..n], b"ping");

        server_thread.join().unwrap();
    }
}
