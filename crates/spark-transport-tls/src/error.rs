//! Errors specific to driving a TLS connection by hand.

use spark_core::error::CoreError;
use std::io;

#[derive(thiserror::Error, Debug)]
pub enum TlsError {
    #[error("tls i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("tls protocol error: {0}")]
    Rustls(#[from] rustls::Error),

    #[error("peer closed the connection mid-handshake")]
    PeerClosedDuringHandshake,

    #[error("invalid certificate or key material: {0}")]
    InvalidCertMaterial(String),

    #[error("no private key found in supplied PEM material")]
    MissingPrivateKey,

    #[error("security.require_client_auth is set but no client-auth trust roots were supplied")]
    MissingClientAuthRoots,
}

impl From<TlsError> for CoreError {
    fn from(err: TlsError) -> Self {
        match &err {
            TlsError::Io(io_err) => CoreError::io("tls.io", io::Error::new(io_err.kind(), err.to_string())),
            TlsError::Rustls(_) => CoreError::protocol("tls.protocol", err.to_string()),
            TlsError::PeerClosedDuringHandshake => {
                CoreError::protocol("tls.handshake_eof", err.to_string())
            }
            TlsError::InvalidCertMaterial(_) => CoreError::config("tls.bad_cert", err.to_string()),
            TlsError::MissingPrivateKey => CoreError::config("tls.missing_key", err.to_string()),
            TlsError::MissingClientAuthRoots => CoreError::config("tls.missing_client_auth_roots", err.to_string()),
        }
    }
}
