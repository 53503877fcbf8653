//! HTTP/1.1 transport via hyper.
//!
//! Every physical connection comes from the dial hook, so with the TLS hook
//! each one carries the spoofed ClientHello. With keep-alive disabled
//! (default) each request gets its own connection and `Connection: close`;
//! enabled, one idle connection is kept for reuse.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderValue, CONNECTION, HOST};
use http::{Request, Response, Uri};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;

use crate::error::{Error, Result};
use crate::timeouts::with_timeout;
use crate::transport::{DialHook, Transport};
use crate::version::HttpVersion;

type Sender = http1::SendRequest<Full<Bytes>>;

/// HTTP/1.1 transport for one destination.
pub struct Http1Transport {
    addr: String,
    hook: Arc<dyn DialHook>,
    keep_alive: bool,
    ttfb: Option<Duration>,
    idle: Mutex<Option<Sender>>,
}

impl Http1Transport {
    pub fn new(addr: &str, hook: Arc<dyn DialHook>, keep_alive: bool, ttfb: Option<Duration>) -> Self {
        Self {
            addr: addr.to_string(),
            hook,
            keep_alive,
            ttfb,
            idle: Mutex::new(None),
        }
    }

    /// Take the idle sender if it can accept a request now.
    fn checkout(&self) -> Option<Sender> {
        let mut idle = self.idle.lock().ok()?;
        match idle.take() {
            Some(sender) if sender.is_ready() => Some(sender),
            Some(sender) if !sender.is_closed() => {
                // Still streaming a previous body; leave it for later.
                *idle = Some(sender);
                None
            }
            _ => None,
        }
    }

    fn checkin(&self, sender: Sender) {
        if let Ok(mut idle) = self.idle.lock() {
            if idle.as_ref().map_or(true, |s| s.is_closed()) {
                *idle = Some(sender);
            }
        }
    }

    async fn connect(&self) -> Result<Sender> {
        let conn = self.hook.connect(&self.addr).await?;
        let io = TokioIo::new(conn.into_io());
        let (sender, connection) = http1::handshake(io)
            .await
            .map_err(|e| Error::http_protocol(format!("HTTP/1.1 handshake failed: {}", e)))?;

        let addr = self.addr.clone();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!("HTTP/1.1 connection to {} closed with error: {}", addr, e);
            }
        });
        Ok(sender)
    }
}

#[async_trait]
impl Transport for Http1Transport {
    async fn round_trip(&self, mut request: Request<Full<Bytes>>) -> Result<Response<Incoming>> {
        to_origin_form(&mut request)?;
        if !self.keep_alive {
            request
                .headers_mut()
                .insert(CONNECTION, HeaderValue::from_static("close"));
        }

        let mut sender = match self.keep_alive.then(|| self.checkout()).flatten() {
            Some(sender) => {
                tracing::trace!("reusing idle HTTP/1.1 connection to {}", self.addr);
                sender
            }
            None => self.connect().await?,
        };

        let response = with_timeout(self.ttfb, Error::TtfbTimeout, async {
            sender
                .send_request(request)
                .await
                .map_err(|e| Error::http_protocol(format!("HTTP/1.1 request failed: {}", e)))
        })
        .await?;

        if self.keep_alive {
            self.checkin(sender);
        }
        Ok(response)
    }

    fn version(&self) -> HttpVersion {
        HttpVersion::Http1_1
    }
}

/// Rewrite an absolute URI to origin-form, moving the authority into Host.
fn to_origin_form(request: &mut Request<Full<Bytes>>) -> Result<()> {
    let uri = request.uri().clone();
    if let Some(authority) = uri.authority() {
        if !request.headers().contains_key(HOST) {
            let host = HeaderValue::from_str(authority.as_str())
                .map_err(|e| Error::http_protocol(format!("Invalid Host: {}", e)))?;
            request.headers_mut().insert(HOST, host);
        }
    }
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    *request.uri_mut() = path
        .parse::<Uri>()
        .map_err(|e| Error::http_protocol(format!("Invalid request target: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .uri(uri)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[test]
    fn test_origin_form() {
        let mut req = request("https://example.com:8443/a/b?q=1");
        to_origin_form(&mut req).unwrap();
        assert_eq!(req.uri().to_string(), "/a/b?q=1");
        assert_eq!(req.headers()[HOST], "example.com:8443");
    }

    #[test]
    fn test_origin_form_keeps_explicit_host() {
        let mut req = request("http://example.com");
        req.headers_mut()
            .insert(HOST, HeaderValue::from_static("other.test"));
        to_origin_form(&mut req).unwrap();
        assert_eq!(req.uri().to_string(), "/");
        assert_eq!(req.headers()[HOST], "other.test");
    }
}
