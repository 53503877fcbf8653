//! Raw network dialers.
//!
//! A `Dialer` opens the transport-layer connection the TLS handshake runs
//! over. `DirectDialer` connects straight to the destination; proxies live
//! in `transport::proxy`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use socket2::{Domain, Socket, Type};
use tokio::net::{lookup_host, TcpStream};

use crate::error::{Error, Result};
use crate::timeouts::with_timeout;
use crate::transport::conn::{BoxedIo, Connection};
use crate::transport::tcp::{configure_tcp_socket, TcpFingerprint};
use crate::transport::DialHook;

/// Context-aware connection factory: `dial(network, address) -> stream`.
///
/// Cancellation follows the future: dropping it aborts the dial.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, network: &str, addr: &str) -> Result<BoxedIo>;
}

/// Connects directly to the destination over TCP.
#[derive(Debug, Clone, Default)]
pub struct DirectDialer {
    tcp_fingerprint: Option<TcpFingerprint>,
}

impl DirectDialer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply TCP socket options before connecting.
    pub fn with_tcp_fingerprint(mut self, fp: TcpFingerprint) -> Self {
        self.tcp_fingerprint = Some(fp);
        self
    }

    /// Open a TCP stream to `addr`.
    pub async fn connect_tcp(&self, addr: &str) -> Result<TcpStream> {
        let Some(fp) = self.tcp_fingerprint.clone() else {
            let stream = TcpStream::connect(addr)
                .await
                .map_err(|e| Error::dial(addr, e))?;
            let _ = stream.set_nodelay(true);
            return Ok(stream);
        };

        let socket_addr: SocketAddr = lookup_host(addr)
            .await
            .map_err(|e| Error::dial(addr, e))?
            .next()
            .ok_or_else(|| {
                Error::dial(
                    addr,
                    std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses found"),
                )
            })?;

        let domain = match socket_addr {
            SocketAddr::V4(_) => Domain::IPV4,
            SocketAddr::V6(_) => Domain::IPV6,
        };

        // socket2 connects synchronously; keep it off the runtime threads.
        let std_stream = tokio::task::spawn_blocking(move || -> std::io::Result<std::net::TcpStream> {
            let socket = Socket::new(domain, Type::STREAM, Some(socket2::Protocol::TCP))?;
            configure_tcp_socket(&socket, &fp, socket_addr.is_ipv4())?;
            socket.connect(&socket_addr.into())?;
            socket.set_nonblocking(true)?;
            Ok(socket.into())
        })
        .await
        .map_err(|e| Error::dial(addr, std::io::Error::other(e)))?
        .map_err(|e| Error::dial(addr, e))?;

        TcpStream::from_std(std_stream).map_err(|e| Error::dial(addr, e))
    }
}

#[async_trait]
impl Dialer for DirectDialer {
    async fn dial(&self, network: &str, addr: &str) -> Result<BoxedIo> {
        ensure_tcp(network, addr)?;
        tracing::trace!("direct dial {}", addr);
        Ok(Box::new(self.connect_tcp(addr).await?))
    }
}

/// Dial hook for plain `http`: the raw stream, no TLS.
pub struct PlainHook {
    dialer: Arc<dyn Dialer>,
    connect_timeout: Option<Duration>,
}

impl PlainHook {
    pub fn new(dialer: Arc<dyn Dialer>, connect_timeout: Option<Duration>) -> Self {
        Self {
            dialer,
            connect_timeout,
        }
    }
}

#[async_trait]
impl DialHook for PlainHook {
    async fn connect(&self, addr: &str) -> Result<Connection> {
        with_timeout(self.connect_timeout, Error::ConnectTimeout, async {
            Ok(Connection::plain(self.dialer.dial("tcp", addr).await?))
        })
        .await
    }
}

/// Only stream networks are dialable.
pub(crate) fn ensure_tcp(network: &str, addr: &str) -> Result<()> {
    match network {
        "tcp" | "tcp4" | "tcp6" => Ok(()),
        other => Err(Error::dial(
            addr,
            std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                format!("unsupported network '{}'", other),
            ),
        )),
    }
}
