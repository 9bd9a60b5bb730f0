//! Minimal end-to-end wiring: a TCP listener, a handful of routes matched
//! through `weft_router::Router`, a static-file branch, and an echo
//! WebSocket handler, all driven by `weft::connection::serve_connection`.
//!
//! Run with `cargo run -p weft --example demo_server`, then:
//!   curl http://127.0.0.1:8080/
//!   curl http://127.0.0.1:8080/echo/world
//!   curl http://127.0.0.1:8080/static/demo.txt

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpListener;

use weft::{Connection, ConnectionId, ProtocolSettings, Request, Response, WeftError, WsMessage, WsHandler, WsSender};
use weft_core::io::{AsyncIo, Transport};
use weft_core::service::Route;
use weft_router::{serve as serve_static, Router, StaticFileConfig};
use weft_types::{Method, Message, ResponseHeader, StatusCode, Version};

#[derive(Clone, Copy)]
enum Handler {
    Hello,
    Echo,
    Static,
}

struct App {
    router: Router<Handler>,
    static_config: StaticFileConfig,
}

impl App {
    fn new() -> Self {
        let mut router = Router::new();
        router.register(Method::Get, "/", Handler::Hello);
        router.register(Method::Get, "/echo/{name}", Handler::Echo);
        router.register(Method::Get, "/static/*", Handler::Static);

        Self {
            router,
            static_config: StaticFileConfig::new("./demos/static"),
        }
    }
}

#[async_trait]
impl Route for App {
    async fn route(&self, request: Request, _conn: &Connection) -> Result<Response, WeftError> {
        let Some((handler, params)) = self.router.route(request.header.method.clone(), &request.header.path) else {
            return Ok(text_response(StatusCode::NOT_FOUND, "not found"));
        };

        match handler {
            Handler::Hello => Ok(text_response(StatusCode::OK, "hello from weft")),
            Handler::Echo => {
                let name = params.get("name").unwrap_or("world");
                Ok(text_response(StatusCode::OK, &format!("hello, {name}")))
            }
            Handler::Static => {
                let tail = params.get("*").unwrap_or("");
                match serve_static(&self.static_config, tail, &request).await? {
                    weft_router::Outcome::File { path, .. } => {
                        let body = tokio::fs::read(&path)
                            .await
                            .map_err(|e| WeftError::InternalServerError(e.to_string()))?;
                        Ok(text_response(StatusCode::OK, &String::from_utf8_lossy(&body)))
                    }
                    weft_router::Outcome::NotFound | weft_router::Outcome::Forbidden => {
                        Ok(text_response(StatusCode::NOT_FOUND, "not found"))
                    }
                    _ => Ok(text_response(StatusCode::NOT_FOUND, "not found")),
                }
            }
        }
    }
}

fn text_response(status: StatusCode, body: &str) -> Response {
    let mut header = ResponseHeader::new(Version::Http11, status);
    header.fields.add("Content-Type", "text/plain; charset=utf-8");
    Message::new(header, body.as_bytes().to_vec())
}

struct EchoWs;

#[async_trait]
impl<IO: AsyncIo> WsHandler<IO> for EchoWs {
    async fn on_message(&self, message: WsMessage, sender: &WsSender<IO>) -> Result<(), WeftError> {
        match message {
            WsMessage::Text(text) => sender.send_text(text).await,
            WsMessage::Binary(data) => sender.send_binary(data).await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let addr: SocketAddr = std::env::var("WEFT_DEMO_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
        .parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "weft demo server listening");

    let route = Arc::new(App::new());
    let ws_handler = Arc::new(EchoWs);
    let mut next_id = 0u64;

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let conn_id = ConnectionId(next_id);
        next_id += 1;

        let route = route.clone();
        let ws_handler = ws_handler.clone();
        tokio::spawn(async move {
            let io = Transport::new(stream);
            let conn = Connection::new(conn_id, Some(peer_addr));
            if let Err(e) = weft::serve_connection(io, conn, ProtocolSettings::default(), route, ws_handler).await {
                tracing::debug!(%conn_id, error = %e, "connection ended with an error");
            }
        });
    }
}
