//! Shared fixtures for the end-to-end selector tests (spec §8).

use std::sync::mpsc;
use std::sync::Arc;

use bytes::Bytes;
use rustls::{ClientConfig, RootCertStore, ServerConfig};
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use spark_core::config::TlsSecurityConfig;
use spark_core::error::CoreError;
use spark_core::ids::ChannelId;
use spark_reactor::SelectorEvents;
use spark_transport_tls::config::{build_client_config, build_server_config, load_pem_chain, load_pem_key};

/// Echoes every reassembled frame straight back to its own channel, wrapped
/// in `SimpleFraming`'s one-byte length prefix.
#[derive(Default)]
pub struct EchoEvents {
    outbound: Vec<(ChannelId, Bytes)>,
}

impl SelectorEvents for EchoEvents {
    fn on_frame(&mut self, channel: ChannelId, frame: Bytes) {
        let mut wire = Vec::with_capacity(1 + frame.len());
        wire.push(frame.len() as u8);
        wire.extend_from_slice(&frame);
        self.outbound.push((channel, Bytes::from(wire)));
    }

    fn take_outbound(&mut self) -> Vec<(ChannelId, Bytes)> {
        std::mem::take(&mut self.outbound)
    }
}

#[derive(Debug)]
pub enum RecordedEvent {
    Ready(ChannelId),
    Frame(ChannelId, Bytes),
    Closed(ChannelId, Option<String>),
}

/// Records every callback to an `mpsc` channel so the test's main thread can
/// observe them, and optionally fires one `SimpleFraming`-encoded payload as
/// soon as its channel becomes ready.
pub struct RecordingEvents {
    tx: mpsc::Sender<RecordedEvent>,
    outbound: Vec<(ChannelId, Bytes)>,
    send_on_ready: Option<Vec<u8>>,
}

impl RecordingEvents {
    pub fn new(tx: mpsc::Sender<RecordedEvent>, send_on_ready: Option<Vec<u8>>) -> Self {
        Self {
            tx,
            outbound: Vec::new(),
            send_on_ready,
        }
    }
}

impl SelectorEvents for RecordingEvents {
    fn on_ready(&mut self, channel: ChannelId) {
        let _ = self.tx.send(RecordedEvent::Ready(channel));
        if let Some(payload) = self.send_on_ready.take() {
            let mut wire = Vec::with_capacity(1 + payload.len());
            wire.push(payload.len() as u8);
            wire.extend_from_slice(&payload);
            self.outbound.push((channel, Bytes::from(wire)));
        }
    }

    fn on_frame(&mut self, channel: ChannelId, frame: Bytes) {
        let _ = self.tx.send(RecordedEvent::Frame(channel, frame));
    }

    fn on_closed(&mut self, channel: ChannelId, cause: Option<CoreError>) {
        let _ = self
            .tx
            .send(RecordedEvent::Closed(channel, cause.map(|e| e.to_string())));
    }

    fn take_outbound(&mut self) -> Vec<(ChannelId, Bytes)> {
        std::mem::take(&mut self.outbound)
    }
}

/// A self-signed cert trusted by the paired client config, for loopback TLS
/// tests.
pub fn self_signed_configs() -> (Arc<ServerConfig>, Arc<ClientConfig>) {
    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let chain = load_pem_chain(cert.pem().as_bytes()).unwrap();
    let key = load_pem_key(key_pair.serialize_pem().as_bytes()).unwrap();
    let server_config = build_server_config(chain.clone(), key, &TlsSecurityConfig::default(), None).unwrap();

    let mut roots = RootCertStore::empty();
    roots.add(chain[0].clone()).unwrap();
    let client_config = build_client_config(roots, &TlsSecurityConfig::default(), None).unwrap();
    (server_config, client_config)
}

/// A self-signed CA and the leaf certificate/key it issues for a given
/// subject, for building client certificates in mutual-TLS tests.
fn issue(subject: &str) -> (CertificateDer<'static>, Vec<CertificateDer<'static>>, PrivateKeyDer<'static>) {
    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec![subject.to_string()]).unwrap();
    let der = cert.der().clone();
    let chain = load_pem_chain(cert.pem().as_bytes()).unwrap();
    let key = load_pem_key(key_pair.serialize_pem().as_bytes()).unwrap();
    (der, chain, key)
}

/// A server that requires a client certificate signed by `client_ca`, paired
/// with a client config carrying `client_cert` (or none, to exercise a peer
/// that refuses to present one).
pub fn mutual_tls_configs(
    present_client_cert: bool,
) -> (Arc<ServerConfig>, Arc<ClientConfig>) {
    let (server_der, server_chain, server_key) = issue("localhost");
    let (client_der, client_chain, client_key) = issue("spark-net-client");

    let mut client_auth_roots = RootCertStore::empty();
    client_auth_roots.add(client_der).unwrap();
    let security = TlsSecurityConfig {
        require_client_auth: true,
        ..TlsSecurityConfig::default()
    };
    let server_config =
        build_server_config(server_chain, server_key, &security, Some(client_auth_roots)).unwrap();

    let mut server_trust_roots = RootCertStore::empty();
    server_trust_roots.add(server_der).unwrap();
    let client_cert = present_client_cert.then_some((client_chain, client_key));
    let client_config =
        build_client_config(server_trust_roots, &TlsSecurityConfig::default(), client_cert).unwrap();

    (server_config, client_config)
}
