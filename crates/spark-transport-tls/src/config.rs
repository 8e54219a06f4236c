//! PEM-based certificate/key loading and `rustls` config construction.
//!
//! Keystore/truststore *file format* handling (PKCS#12, JKS-equivalents,
//! passphrase-protected stores) is explicitly out of scope; this module
//! exists so tests and examples can build a working `rustls::ServerConfig`/
//! `ClientConfig` from plain PEM bytes, the same minimal loader pattern the
//! wider pack uses (`examples/warpy-ai-script`'s `TlsServerConfig::from_pem_files`).

use crate::error::TlsError;
use rustls::server::WebPkiClientVerifier;
use rustls::{ClientConfig, RootCertStore, ServerConfig};
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use spark_core::config::TlsSecurityConfig;
use std::sync::Arc;

pub fn load_pem_chain(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut reader = pem;
    rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TlsError::InvalidCertMaterial(e.to_string()))
}

pub fn load_pem_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>, TlsError> {
    let mut reader = pem;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| TlsError::InvalidCertMaterial(e.to_string()))?
        .ok_or(TlsError::MissingPrivateKey)
}

fn resolve_versions(
    security: &TlsSecurityConfig,
) -> Vec<&'static rustls::SupportedProtocolVersion> {
    let mut versions = Vec::new();
    for name in &security.protocols {
        match name.as_str() {
            "TLSv1.3" => versions.push(&rustls::version::TLS13),
            "TLSv1.2" => versions.push(&rustls::version::TLS12),
            other => tracing::warn!(protocol = other, "ignoring unrecognized TLS protocol name"),
        }
    }
    if versions.is_empty() {
        versions = vec![&rustls::version::TLS13, &rustls::version::TLS12];
    }
    versions
}

/// Builds a server-side config from a certificate chain and its private
/// key. `security.cipher_suites` is not applied here: selecting suites in
/// current `rustls` means swapping the `CryptoProvider`, not filtering a
/// list on the builder, and the default `ring` provider's suite set is a
/// reasonable default this workspace doesn't second-guess.
///
/// When `security.require_client_auth` is set, `client_auth_roots` must hold
/// the CA(s) a presented client certificate is verified against; the
/// handshake then fails unless the peer presents one. Leaving it `false`
/// (the default) ignores `client_auth_roots` entirely.
pub fn build_server_config(
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
    security: &TlsSecurityConfig,
    client_auth_roots: Option<RootCertStore>,
) -> Result<Arc<ServerConfig>, TlsError> {
    let versions = resolve_versions(security);
    let builder = ServerConfig::builder_with_protocol_versions(&versions);
    let config = if security.require_client_auth {
        let roots = client_auth_roots.ok_or(TlsError::MissingClientAuthRoots)?;
        let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
            .build()
            .map_err(|e| TlsError::InvalidCertMaterial(e.to_string()))?;
        builder
            .with_client_cert_verifier(verifier)
            .with_single_cert(chain, key)
            .map_err(TlsError::Rustls)?
    } else {
        builder
            .with_no_client_auth()
            .with_single_cert(chain, key)
            .map_err(TlsError::Rustls)?
    };
    Ok(Arc::new(config))
}

/// Builds a client-side config trusting `roots`. `client_cert` supplies this
/// side's own chain and key when the peer's server config requires client
/// auth; omit it for a server that doesn't.
pub fn build_client_config(
    roots: RootCertStore,
    security: &TlsSecurityConfig,
    client_cert: Option<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>)>,
) -> Result<Arc<ClientConfig>, TlsError> {
    let versions = resolve_versions(security);
    let builder = ClientConfig::builder_with_protocol_versions(&versions).with_root_certificates(roots);
    let config = match client_cert {
        Some((chain, key)) => builder.with_client_auth_cert(chain, key).map_err(TlsError::Rustls)?,
        None => builder.with_no_client_auth(),
    };
    Ok(Arc::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn self_signed() -> (Vec<CertificateDer<'static>>, PrivateKeyDer<'static>) {
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let chain = load_pem_chain(cert.pem().as_bytes()).unwrap();
        let key = load_pem_key(key_pair.serialize_pem().as_bytes()).unwrap();
        (chain, key)
    }

    #[test]
    fn loads_self_signed_chain_and_key() {
        let (chain, _key) = self_signed();
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn builds_server_config_from_pem() {
        let (chain, key) = self_signed();
        let security = TlsSecurityConfig::default();
        let config = build_server_config(chain, key, &security, None);
        assert!(config.is_ok());
    }

    #[test]
    fn requiring_client_auth_without_roots_is_an_error() {
        let (chain, key) = self_signed();
        let security = TlsSecurityConfig {
            require_client_auth: true,
            ..TlsSecurityConfig::default()
        };
        let config = build_server_config(chain, key, &security, None);
        assert!(matches!(config, Err(TlsError::MissingClientAuthRoots)));
    }

    #[test]
    fn requiring_client_auth_with_roots_builds_a_verifier() {
        let (chain, key) = self_signed();
        let mut roots = RootCertStore::empty();
        roots.add(chain[0].clone()).unwrap();
        let security = TlsSecurityConfig {
            require_client_auth: true,
            ..TlsSecurityConfig::default()
        };
        let config = build_server_config(chain, key, &security, Some(roots));
        assert!(config.is_ok());
    }

    #[test]
    fn unknown_protocol_name_falls_back_to_defaults() {
        let security = TlsSecurityConfig {
            protocols: vec!["SSLv3".to_string()],
            ..TlsSecurityConfig::default()
        };
        let versions = resolve_versions(&security);
        assert_eq!(versions.len(), 2);
    }
}
