//! The two small state vocabularies spec §4.3 borrows from `SSLEngine`:
//! `HandshakeStatus` (what the handshake driver should do next) and
//! `EngineStatus` (the outcome of one read/write attempt against the
//! engine). Neither corresponds to a literal rustls type — rustls expresses
//! the same information through `wants_read()`/`wants_write()`/
//! `is_handshaking()` and `io::ErrorKind::WouldBlock` — these enums are the
//! vocabulary this crate normalizes that information into.

/// What [`crate::session::TlsSession::process_handshake`] needs before it
/// can make further progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStatus {
    /// No handshake is in progress; the channel is ready for application
    /// data (or hasn't started handshaking yet).
    NotHandshaking,
    /// More ciphertext must arrive from the peer before progress can
    /// continue; the selector should keep `READABLE` interest armed.
    NeedUnwrap,
    /// Outbound ciphertext is queued and must be flushed to the socket; the
    /// selector should arm `WRITABLE` interest.
    NeedWrap,
    /// A crypto-heavy step (certificate verification, key exchange) is
    /// ready to run; either run it inline or hand it to the delegated-task
    /// worker, depending on the session's configured delegation mode.
    NeedTask,
    /// The handshake just completed on this call.
    Finished,
}

/// The outcome of one non-blocking read or write attempt against the TLS
/// engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// The operation made progress and can be retried or is complete.
    Ok,
    /// Not enough ciphertext has arrived yet to decrypt a full record.
    BufferUnderflow,
    /// The caller's destination buffer was too small to hold the decrypted
    /// data available; call again with a larger buffer.
    BufferOverflow,
    /// The session has been closed (locally or by the peer) and no further
    /// I/O is possible.
    Closed,
}
