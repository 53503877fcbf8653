//! Dialing, spoofed TLS, per-destination caching and protocol transports.
//!
//! - `dialer` / `proxy`: raw TCP, direct or tunnelled
//! - `handshake`: BoringSSL ClientHello shaped by a `ClientHelloSpec`
//! - `tls_dialer`: negotiation and the connection/transport caches
//! - `h1` / `h2`: hyper client connections fed by a dial hook
//! - `round_tripper`: the request entry point

pub mod addr;
pub mod cache;
pub mod conn;
pub mod dialer;
pub mod h1;
pub mod h2;
pub mod handshake;
pub mod proxy;
pub mod round_tripper;
pub mod tcp;
pub mod tls_dialer;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use hyper::body::Incoming;

use crate::error::Result;
use crate::version::HttpVersion;

pub use conn::{BoxedIo, Connection};
pub use dialer::{Dialer, DirectDialer};
pub use handshake::{BoringHandshaker, Handshaker};
pub use proxy::ProxyDialer;
pub use round_tripper::{RoundTripper, RoundTripperBuilder};
pub use tls_dialer::{DialOutcome, TlsDialer};

/// Protocol transport bound to one destination.
///
/// Implementations manage their own connections; callers may share one
/// transport across tasks.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn round_trip(&self, request: Request<Full<Bytes>>) -> Result<Response<Incoming>>;

    /// Wire protocol this transport speaks.
    fn version(&self) -> HttpVersion;
}

/// Source of new connections for a transport.
///
/// The TLS hook re-enters the spoofing dial path, so every physical
/// connection a transport opens carries the same fingerprint.
#[async_trait]
pub trait DialHook: Send + Sync {
    async fn connect(&self, addr: &str) -> Result<Connection>;
}
