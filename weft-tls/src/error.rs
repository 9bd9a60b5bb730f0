//! TLS-specific error variants, kept separate from [`weft_types::WeftError`]
//! since certificate/key loading failures happen at startup, outside any
//! connection's lifecycle.

#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("failed to read certificate/key material: {0}")]
    Io(#[from] std::io::Error),

    #[error("no certificates found in the supplied PEM input")]
    NoCertificates,

    #[error("no private key found in the supplied PEM input")]
    NoPrivateKey,

    #[error("rustls rejected the certificate/key pair: {0}")]
    Rustls(#[from] rustls::Error),
}
