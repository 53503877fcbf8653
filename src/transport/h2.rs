//! HTTP/2 transport via hyper.
//!
//! One multiplexed connection per destination, established lazily through
//! the dial hook (the first one is the connection stashed during
//! negotiation) and re-established after it closes. SETTINGS values and
//! regular-header order follow the impersonated browser family.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Request, Response};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::client::conn::http2;
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::fingerprint::http2::Http2Settings;
use crate::timeouts::with_timeout;
use crate::transport::{DialHook, Transport};
use crate::version::HttpVersion;

type Sender = http2::SendRequest<Full<Bytes>>;

/// Connection-specific headers HTTP/2 forbids.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "host",
];

/// HTTP/2 transport for one destination.
pub struct Http2Transport {
    addr: String,
    hook: Arc<dyn DialHook>,
    settings: Http2Settings,
    header_order: &'static [&'static str],
    ttfb: Option<Duration>,
    sender: Mutex<Option<Sender>>,
}

impl Http2Transport {
    pub fn new(
        addr: &str,
        hook: Arc<dyn DialHook>,
        settings: Http2Settings,
        header_order: &'static [&'static str],
        ttfb: Option<Duration>,
    ) -> Self {
        Self {
            addr: addr.to_string(),
            hook,
            settings,
            header_order,
            ttfb,
            sender: Mutex::new(None),
        }
    }

    /// Shared sender, connecting if there is no live connection.
    async fn sender(&self) -> Result<Sender> {
        let mut slot = self.sender.lock().await;
        if let Some(sender) = slot.as_ref() {
            if !sender.is_closed() {
                return Ok(sender.clone());
            }
            tracing::debug!("HTTP/2 connection to {} closed, reconnecting", self.addr);
        }

        let conn = self.hook.connect(&self.addr).await?;
        if !conn.protocol().is_h2() {
            return Err(Error::http_protocol(format!(
                "{} did not negotiate h2 (got {:?})",
                self.addr,
                conn.protocol()
            )));
        }

        let mut builder = http2::Builder::new(TokioExecutor::new());
        builder
            .initial_stream_window_size(self.settings.initial_window_size)
            .initial_connection_window_size(self.settings.initial_connection_window_size)
            .max_frame_size(self.settings.max_frame_size)
            .max_header_list_size(self.settings.max_header_list_size);

        let handshake = builder.handshake(TokioIo::new(conn.into_io()));
        let result = match self.settings.handshake_timeout {
            Some(limit) => tokio::time::timeout(limit, handshake).await.map_err(|_| {
                Error::connection(format!("HTTP/2 handshake with {} timed out", self.addr))
            })?,
            None => handshake.await,
        };
        let (sender, connection) = result
            .map_err(|e| Error::http_protocol(format!("HTTP/2 handshake failed: {}", e)))?;

        let addr = self.addr.clone();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!("HTTP/2 connection to {} closed with error: {}", addr, e);
            }
        });

        *slot = Some(sender.clone());
        Ok(sender)
    }
}

#[async_trait]
impl Transport for Http2Transport {
    async fn round_trip(&self, mut request: Request<Full<Bytes>>) -> Result<Response<Incoming>> {
        if request.uri().scheme().is_none() || request.uri().authority().is_none() {
            return Err(Error::http_protocol(format!(
                "HTTP/2 request needs an absolute URI, got {}",
                request.uri()
            )));
        }
        for name in HOP_BY_HOP {
            request.headers_mut().remove(*name);
        }
        order_headers(request.headers_mut(), self.header_order);

        let mut sender = self.sender().await?;
        with_timeout(self.ttfb, Error::TtfbTimeout, async {
            sender
                .send_request(request)
                .await
                .map_err(|e| Error::http_protocol(format!("HTTP/2 request failed: {}", e)))
        })
        .await
    }

    fn version(&self) -> HttpVersion {
        HttpVersion::Http2
    }
}

/// Reorder `headers`: names in `order` first, in that order, then the rest
/// in their original order. Multiple values keep their relative order.
pub(crate) fn order_headers(headers: &mut HeaderMap, order: &[&str]) {
    let original = std::mem::take(headers);
    let mut ranked: Vec<Vec<(HeaderName, HeaderValue)>> = vec![Vec::new(); order.len()];
    let mut rest = Vec::new();

    for (name, value) in original.iter() {
        let entry = (name.clone(), value.clone());
        match order.iter().position(|o| name.as_str() == *o) {
            Some(rank) => ranked[rank].push(entry),
            None => rest.push(entry),
        }
    }
    for (name, value) in ranked.into_iter().flatten().chain(rest) {
        headers.append(name, value);
    }
}
