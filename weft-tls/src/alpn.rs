//! ALPN protocol list configuration and post-handshake selection readout
//! (spec §4.8, §6's TLS collaborator contract), grounded in
//! `armature-core/src/tls.rs::TlsConfig::from_pem_parts` (which sets
//! `config.alpn_protocols = vec![b"h2", b"http/1.1"]` the same way) and
//! `galay-http/protoc/alpn/AlpnProtocol.h`'s protocol identifier set.

use tokio_rustls::server::TlsStream;

/// The wire identifiers ALPN negotiates between, per spec §1/§4.8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlpnProtocol {
    Http2,
    Http11,
    Http10,
}

impl AlpnProtocol {
    pub fn wire_name(self) -> &'static [u8] {
        match self {
            Self::Http2 => b"h2",
            Self::Http11 => b"http/1.1",
            Self::Http10 => b"http/1.0",
        }
    }

    fn from_wire_name(name: &[u8]) -> Option<Self> {
        match name {
            b"h2" => Some(Self::Http2),
            b"http/1.1" => Some(Self::Http11),
            b"http/1.0" => Some(Self::Http10),
            _ => None,
        }
    }
}

/// Installs `priority`, in order, as the server's ALPN protocol list.
///
/// rustls negotiates ALPN by picking the first entry of `alpn_protocols`
/// that the client also offered (server-preferred order) — the
/// "first server-preferred that the client offered" rule — and, per
/// RFC 7301, aborts the handshake with `no_application_protocol` if the
/// client sent the extension but none of its entries overlap. A more
/// permissive "use top preference on no match" fallback isn't expressible
/// through rustls's public `ServerConfig` without forking the handshake
/// state machine, so this
/// workspace takes the Design Notes' alternative ("a stricter
/// implementation should abort the TLS handshake") rather than hand-roll
/// an ALPN callback — see `DESIGN.md`.
pub fn configure_server_alpn(config: &mut rustls::ServerConfig, priority: &[AlpnProtocol]) {
    config.alpn_protocols = priority.iter().map(|p| p.wire_name().to_vec()).collect();
}

/// Reads the protocol ALPN selected for `stream` after the handshake
/// completes. `None` means the client didn't offer the extension at all
/// (not a mismatch) — the connection falls back to sniffing HTTP/1.1 vs.
/// the `"PRI "` preface on the plaintext stream, per spec §4.8.
pub fn get_alpn<IO>(stream: &TlsStream<IO>) -> Option<AlpnProtocol> {
    let (_, session) = stream.get_ref();
    session
        .alpn_protocol()
        .and_then(AlpnProtocol::from_wire_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for proto in [AlpnProtocol::Http2, AlpnProtocol::Http11, AlpnProtocol::Http10] {
            assert_eq!(AlpnProtocol::from_wire_name(proto.wire_name()), Some(proto));
        }
    }

    #[test]
    fn configure_preserves_priority_order() {
        let mut config = rustls::ServerConfig::builder_with_protocol_versions(&[&rustls::version::TLS13])
            .with_no_client_auth()
            .with_cert_resolver(std::sync::Arc::new(NoCerts));
        configure_server_alpn(&mut config, &[AlpnProtocol::Http2, AlpnProtocol::Http11]);
        assert_eq!(config.alpn_protocols, vec![b"h2".to_vec(), b"http/1.1".to_vec()]);
    }

    #[derive(Debug)]
    struct NoCerts;
    impl rustls::server::ResolvesServerCert for NoCerts {
        fn resolve(&self, _: rustls::server::ClientHello<'_>) -> Option<std::sync::Arc<rustls::sign::CertifiedKey>> {
            None
        }
    }
}
