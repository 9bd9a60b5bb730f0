//! Server TLS configuration, grounded in
//! `armature-core/src/tls.rs::TlsConfig`: load a certificate chain and
//! private key from PEM, build a `rustls::ServerConfig` with no client
//! auth, and hand back an `Arc` ready for `tokio_rustls::TlsAcceptor`.

use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls_pki_types::{CertificateDer, PrivateKeyDer};

use crate::alpn::AlpnProtocol;
use crate::error::TlsError;

/// Wraps the negotiated `rustls::ServerConfig` the acceptor loop hands to
/// `tokio_rustls::TlsAcceptor::from`.
#[derive(Clone)]
pub struct TlsConfig {
    inner: Arc<rustls::ServerConfig>,
}

impl TlsConfig {
    /// Loads the certificate chain and private key from the given PEM
    /// files and installs `alpn_priority` (defaulting to `{h2, http/1.1}`
    /// when empty) as the server's ALPN list.
    pub fn from_pem_files(
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
        alpn_priority: &[AlpnProtocol],
    ) -> Result<Self, TlsError> {
        let cert_bytes = std::fs::read(cert_path)?;
        let key_bytes = std::fs::read(key_path)?;
        Self::from_pem_bytes(&cert_bytes, &key_bytes, alpn_priority)
    }

    /// As [`Self::from_pem_files`], but reading PEM-encoded bytes already
    /// held in memory (used by tests and by embedders that keep
    /// certificate material outside the filesystem).
    pub fn from_pem_bytes(
        cert_bytes: &[u8],
        key_bytes: &[u8],
        alpn_priority: &[AlpnProtocol],
    ) -> Result<Self, TlsError> {
        let certs = load_certs(cert_bytes)?;
        let key = load_private_key(key_bytes)?;
        Self::from_pem_parts(certs, key, alpn_priority)
    }

    /// As the above, but taking already-parsed certificate/key DER —
    /// the common entry point once an embedder has its own PEM loader.
    pub fn from_pem_parts(
        certs: Vec<CertificateDer<'static>>,
        key: PrivateKeyDer<'static>,
        alpn_priority: &[AlpnProtocol],
    ) -> Result<Self, TlsError> {
        let mut config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)?;

        let priority: &[AlpnProtocol] = if alpn_priority.is_empty() {
            &[AlpnProtocol::Http2, AlpnProtocol::Http11]
        } else {
            alpn_priority
        };
        crate::alpn::configure_server_alpn(&mut config, priority);

        Ok(Self {
            inner: Arc::new(config),
        })
    }

    pub fn rustls_config(&self) -> Arc<rustls::ServerConfig> {
        self.inner.clone()
    }

    pub fn acceptor(&self) -> tokio_rustls::TlsAcceptor {
        tokio_rustls::TlsAcceptor::from(self.inner.clone())
    }
}

fn load_certs(bytes: &[u8]) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let certs: Vec<_> = rustls_pemfile::certs(&mut BufReader::new(bytes))
        .collect::<Result<_, _>>()?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates);
    }
    Ok(certs)
}

fn load_private_key(bytes: &[u8]) -> Result<PrivateKeyDer<'static>, TlsError> {
    rustls_pemfile::private_key(&mut BufReader::new(bytes))?.ok_or(TlsError::NoPrivateKey)
}
