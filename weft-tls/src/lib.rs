//! TLS server setup and ALPN protocol negotiation: load a certificate/key
//! pair into a `rustls::ServerConfig`, advertise the configured ALPN
//! priority list, and read back the protocol the handshake settled on so
//! the connection loop (in the `weft` facade crate) knows whether to speak
//! h2 or http/1.1 over the resulting stream.
//!
//! Grounded in `armature-core/src/tls.rs::TlsConfig`, generalized from its
//! fixed `{h2, http/1.1}` pair to an arbitrary configurable priority list.

pub mod alpn;
pub mod config;
pub mod error;

pub use alpn::{configure_server_alpn, get_alpn, AlpnProtocol};
pub use config::TlsConfig;
pub use error::TlsError;
