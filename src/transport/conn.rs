//! Connection types shared by dialers, handshakers, and transports.

use std::fmt;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::version::AlpnProtocol;

/// Byte stream a transport can speak HTTP over.
pub trait Io: AsyncRead + AsyncWrite + fmt::Debug + Send + Unpin + 'static {}

impl<T> Io for T where T: AsyncRead + AsyncWrite + fmt::Debug + Send + Unpin + 'static {}

/// Type-erased stream (TCP, proxied TCP, TLS, or a test double).
pub type BoxedIo = Box<dyn Io>;

/// An established connection and the protocol its handshake settled on.
pub struct Connection {
    io: BoxedIo,
    protocol: AlpnProtocol,
}

impl Connection {
    pub fn new(io: BoxedIo, protocol: AlpnProtocol) -> Self {
        Self { io, protocol }
    }

    /// Plain connection with no TLS and therefore no ALPN.
    pub fn plain(io: BoxedIo) -> Self {
        Self::new(io, AlpnProtocol::None)
    }

    pub fn protocol(&self) -> AlpnProtocol {
        self.protocol
    }

    pub fn into_io(self) -> BoxedIo {
        self.io
    }

    /// Shut the write side down and drop the stream.
    pub async fn close(mut self) {
        if let Err(e) = self.io.shutdown().await {
            tracing::trace!("shutdown on close failed: {}", e);
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("protocol", &self.protocol)
            .finish_non_exhaustive()
    }
}
