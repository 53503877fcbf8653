//! Local hyper server that echoes each request back as JSON.
//!
//! Paths with special behavior:
//! - `/set-cookie` answers with `Set-Cookie: sid=xyz; Path=/`
//! - `/redirect` answers `302` to `/landing`
//! - `/slow` waits 500ms before answering

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use boring::ssl::SslAcceptor;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::{http1, http2};
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use serde_json::{json, Map, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;

use super::connection_tracker::ConnectionTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerProtocol {
    Http1,
    /// HTTP/2 with prior knowledge (no upgrade).
    Http2,
}

pub struct MockHttpServer {
    listener: TcpListener,
    addr: SocketAddr,
    protocol: ServerProtocol,
    tracker: ConnectionTracker,
}

impl MockHttpServer {
    pub async fn new(protocol: ServerProtocol) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        Ok(Self {
            listener,
            addr,
            protocol,
            tracker: ConnectionTracker::new(),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url_tls(&self) -> String {
        format!("https://127.0.0.1:{}", self.addr.port())
    }

    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Serve cleartext connections.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Ok((stream, peer)) = self.listener.accept().await {
                self.tracker.record_connection(peer);
                tokio::spawn(serve(stream, self.protocol, self.tracker.clone()));
            }
        })
    }

    /// Serve TLS connections terminated with `acceptor`.
    pub fn start_tls(self, acceptor: SslAcceptor) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Ok((stream, peer)) = self.listener.accept().await {
                self.tracker.record_connection(peer);
                let acceptor = acceptor.clone();
                let protocol = self.protocol;
                let tracker = self.tracker.clone();
                tokio::spawn(async move {
                    match tokio_boring::accept(&acceptor, stream).await {
                        Ok(tls) => serve(tls, protocol, tracker).await,
                        Err(e) => {
                            tracing::debug!("TLS accept failed: {}", e);
                            tracker.record_close();
                        }
                    }
                });
            }
        })
    }
}

async fn serve<I>(io: I, protocol: ServerProtocol, tracker: ConnectionTracker)
where
    I: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let closes = tracker.clone();
    let service = service_fn(move |req| {
        tracker.record_request();
        echo(req)
    });
    let result = match protocol {
        ServerProtocol::Http1 => {
            http1::Builder::new()
                .serve_connection(TokioIo::new(io), service)
                .await
        }
        ServerProtocol::Http2 => {
            http2::Builder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(io), service)
                .await
        }
    };
    if let Err(e) = result {
        tracing::debug!("mock connection ended: {}", e);
    }
    closes.record_close();
}

async fn echo(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = body
        .collect()
        .await
        .map(|b| b.to_bytes())
        .unwrap_or_default();

    let mut headers = Map::new();
    for name in parts.headers.keys() {
        let joined = parts
            .headers
            .get_all(name)
            .iter()
            .map(|v| v.to_str().unwrap_or_default())
            .collect::<Vec<_>>()
            .join("; ");
        headers.insert(name.to_string(), Value::String(joined));
    }
    let echoed = json!({
        "method": parts.method.as_str(),
        "path": parts.uri.path(),
        "version": format!("{:?}", parts.version),
        "headers": headers,
        "body": String::from_utf8_lossy(&body),
    });

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "application/json");
    match parts.uri.path() {
        "/set-cookie" => response = response.header("set-cookie", "sid=xyz; Path=/"),
        "/redirect" => {
            response = response
                .status(StatusCode::FOUND)
                .header("location", "/landing")
        }
        "/slow" => tokio::time::sleep(Duration::from_millis(500)).await,
        _ => {}
    }
    Ok(response
        .body(Full::new(Bytes::from(echoed.to_string())))
        .unwrap())
}
