//! The handler seam the connection loop calls into once a request has been
//! fully framed (spec §6: "Capability consumed by the core from the
//! router/handler").

use crate::context::Extensions;
use async_trait::async_trait;
use weft_types::{Request, Response, WeftError};

/// A connection, as visible to a handler: the bits it's allowed to act on
/// without reaching into the protocol engine's internals.
pub struct Connection {
    pub id: crate::context::ConnectionId,
    pub peer_addr: Option<std::net::SocketAddr>,
    pub extensions: Extensions,
}

impl Connection {
    pub fn new(id: crate::context::ConnectionId, peer_addr: Option<std::net::SocketAddr>) -> Self {
        Self {
            id,
            peer_addr,
            extensions: Extensions::new(),
        }
    }
}

/// Routes a fully-framed request to application code, producing the
/// response to write back.
///
/// The request arrives fully buffered (body included) regardless of which
/// protocol framed it — HTTP/1.1 Content-Length/chunked or HTTP/2 DATA
/// frames are both collected by the connection loop before `route` is
/// invoked, since spec §4.9's matcher and static-file primitive are the
/// only dispatch this crate specifies in full; a richer, streaming-body
/// router is application code per spec §1. Returning `Err` short-circuits
/// to the error's mapped status response per spec §7, mirroring
/// `rama-core::Service::serve`'s `Result<Response, Error>` shape rather
/// than spec.md's literal `(&mut Request) -> Result<(), _>` signature,
/// which would leave the handler no way to produce a response value at
/// all — see `DESIGN.md`.
#[async_trait]
pub trait Route: Send + Sync {
    async fn route(&self, request: Request, conn: &Connection) -> Result<Response, WeftError>;
}

#[async_trait]
impl<F, Fut> Route for F
where
    F: Fn(Request, &Connection) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Response, WeftError>> + Send,
{
    async fn route(&self, request: Request, conn: &Connection) -> Result<Response, WeftError> {
        (self)(request, conn).await
    }
}
