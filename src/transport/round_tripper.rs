//! Round tripper: the request entry point.
//!
//! ```rust,ignore
//! let rt = RoundTripper::builder()
//!     .fingerprint("chrome_131")
//!     .cookies(vec![Cookie::new("session", "abc", "example.com")])
//!     .build()?;
//! let response = rt.round_trip(request).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use http::header::{HeaderValue, USER_AGENT};
use http::{Request, Response};
use http_body_util::Full;
use hyper::body::Incoming;

use crate::cookie::{append_cookie_header, cookie_header, Cookie};
use crate::error::{Error, Result};
use crate::fingerprint::{ClientHelloSpec, FingerprintProfile};
use crate::timeouts::Timeouts;
use crate::transport::addr::destination_addr;
use crate::transport::cache::TransportCache;
use crate::transport::dialer::{Dialer, DirectDialer, PlainHook};
use crate::transport::h1::Http1Transport;
use crate::transport::handshake::{BoringHandshaker, Handshaker};
use crate::transport::proxy::ProxyDialer;
use crate::transport::tcp::TcpFingerprint;
use crate::transport::tls_dialer::{DialOptions, DialOutcome, TlsDialer};
use crate::transport::Transport;

/// Dispatches requests over per-destination transports, negotiating each
/// destination's protocol once.
pub struct RoundTripper {
    tls: Arc<TlsDialer>,
    raw_dialer: Arc<dyn Dialer>,
    plain_transports: TransportCache,
    cookies: Vec<Cookie>,
    user_agent: HeaderValue,
    keep_alive: bool,
    timeouts: Timeouts,
}

impl RoundTripper {
    pub fn builder() -> RoundTripperBuilder {
        RoundTripperBuilder::new()
    }

    /// Send `request` and return the response head with a streaming body.
    ///
    /// Configured cookies covering the target are appended to the `Cookie`
    /// header and `User-Agent` is overwritten. Schemes other than `https`
    /// and `http` fail before any network activity.
    pub async fn round_trip(&self, mut request: Request<Full<Bytes>>) -> Result<Response<Incoming>> {
        let secure = match request.uri().scheme_str() {
            Some(s) if s.eq_ignore_ascii_case("https") => true,
            Some(s) if s.eq_ignore_ascii_case("http") => false,
            other => return Err(Error::UnsupportedScheme(other.unwrap_or_default().to_string())),
        };
        let addr = destination_addr(request.uri())?;

        self.attach_cookies(&mut request, secure)?;
        request
            .headers_mut()
            .insert(USER_AGENT, self.user_agent.clone());

        let transport = if secure {
            self.tls.negotiate(&addr).await?
        } else {
            self.plain_transport(&addr)
        };
        tracing::trace!(
            "{} {} via {}",
            request.method(),
            request.uri(),
            transport.version().as_str()
        );
        transport.round_trip(request).await
    }

    fn attach_cookies(&self, request: &mut Request<Full<Bytes>>, secure: bool) -> Result<()> {
        if self.cookies.is_empty() {
            return Ok(());
        }
        let host = request.uri().host().unwrap_or_default().to_string();
        let path = request.uri().path().to_string();
        if let Some(pairs) = cookie_header(&self.cookies, &host, &path, secure, Utc::now()) {
            append_cookie_header(request.headers_mut(), &pairs)?;
        }
        Ok(())
    }

    fn plain_transport(&self, addr: &str) -> Arc<dyn Transport> {
        if let Some(transport) = self.plain_transports.get(addr) {
            return transport;
        }
        let hook = Arc::new(PlainHook::new(self.raw_dialer.clone(), self.timeouts.connect));
        let transport: Arc<dyn Transport> =
            Arc::new(Http1Transport::new(addr, hook, self.keep_alive, self.timeouts.ttfb));
        self.plain_transports.get_or_insert(addr, transport)
    }

    /// Locked dial for `addr` (see `TlsDialer::dial`).
    pub async fn dial(&self, addr: &str) -> Result<DialOutcome> {
        self.tls.dial(addr).await
    }

    /// Close and evict every cached connection. Cached transports are kept.
    pub async fn close_idle_connections(&self) {
        self.tls.close_idle_connections().await;
    }

    pub fn cached_transport(&self, addr: &str) -> Option<Arc<dyn Transport>> {
        self.tls.cached_transport(addr)
    }

    pub fn cached_transport_count(&self) -> usize {
        self.tls.cached_transport_count()
    }

    pub fn cached_connection_count(&self) -> usize {
        self.tls.cached_connection_count()
    }

    pub fn tls_dialer(&self) -> &Arc<TlsDialer> {
        &self.tls
    }

    pub fn spec(&self) -> &ClientHelloSpec {
        self.tls.spec()
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent.to_str().unwrap_or_default()
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }
}

/// Builder for [`RoundTripper`].
pub struct RoundTripperBuilder {
    fingerprint: String,
    user_agent: Option<String>,
    cookies: Vec<Cookie>,
    insecure: bool,
    force_http1: bool,
    keep_alive: bool,
    timeouts: Timeouts,
    proxy: Option<String>,
    tcp_fingerprint: Option<TcpFingerprint>,
    root_certs: Vec<Vec<u8>>,
    dialer: Option<Arc<dyn Dialer>>,
    handshaker: Option<Arc<dyn Handshaker>>,
}

impl RoundTripperBuilder {
    pub fn new() -> Self {
        Self {
            fingerprint: FingerprintProfile::default().name().to_string(),
            user_agent: None,
            cookies: Vec::new(),
            insecure: false,
            force_http1: false,
            keep_alive: false,
            timeouts: Timeouts::default(),
            proxy: None,
            tcp_fingerprint: None,
            root_certs: Vec::new(),
            dialer: None,
            handshaker: None,
        }
    }

    /// Named profile (`chrome_131`, `firefox_133`, ...) or a raw JA3 string.
    pub fn fingerprint(mut self, id: impl Into<String>) -> Self {
        self.fingerprint = id.into();
        self
    }

    /// Defaults to the named profile's user agent, or Chrome's for raw JA3.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    pub fn cookies(mut self, cookies: Vec<Cookie>) -> Self {
        self.cookies = cookies;
        self
    }

    /// Skip certificate verification.
    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Never offer h2 in ALPN.
    pub fn force_http1(mut self, force: bool) -> Self {
        self.force_http1 = force;
        self
    }

    /// Reuse HTTP/1.1 connections. Off by default.
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connect = Some(timeout);
        self
    }

    pub fn ttfb_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.ttfb = Some(timeout);
        self
    }

    /// `http://` (CONNECT) or `socks5://` proxy URL.
    pub fn proxy(mut self, url: impl Into<String>) -> Self {
        self.proxy = Some(url.into());
        self
    }

    pub fn tcp_fingerprint(mut self, fp: TcpFingerprint) -> Self {
        self.tcp_fingerprint = Some(fp);
        self
    }

    /// Extra trusted roots (DER or PEM) for the default handshaker.
    pub fn root_certificates(mut self, certs: Vec<Vec<u8>>) -> Self {
        self.root_certs = certs;
        self
    }

    /// Replace the raw dialer; takes precedence over `proxy`.
    pub fn dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dialer = Some(dialer);
        self
    }

    pub fn handshaker(mut self, handshaker: Arc<dyn Handshaker>) -> Self {
        self.handshaker = Some(handshaker);
        self
    }

    /// Resolve the fingerprint and wire the dialer stack.
    ///
    /// Fails with `UnknownFingerprint` before any connection is made.
    pub fn build(self) -> Result<RoundTripper> {
        let user_agent = match self.user_agent {
            Some(ua) => ua,
            None => FingerprintProfile::from_name(&self.fingerprint)
                .unwrap_or_default()
                .user_agent()
                .to_string(),
        };
        let spec = ClientHelloSpec::build(&self.fingerprint, &user_agent, self.force_http1)?;
        let user_agent = HeaderValue::from_str(&user_agent)
            .map_err(|e| Error::http_protocol(format!("Invalid User-Agent: {}", e)))?;

        let direct = match self.tcp_fingerprint {
            Some(fp) => DirectDialer::new().with_tcp_fingerprint(fp),
            None => DirectDialer::new(),
        };
        let raw_dialer: Arc<dyn Dialer> = match (self.dialer, self.proxy) {
            (Some(dialer), _) => dialer,
            (None, Some(proxy)) => Arc::new(ProxyDialer::from_url(&proxy)?.with_direct_dialer(direct)),
            (None, None) => Arc::new(direct),
        };
        let handshaker = self.handshaker.unwrap_or_else(|| {
            Arc::new(BoringHandshaker::new().with_root_certificates(self.root_certs))
        });

        tracing::debug!(
            "round tripper: fingerprint {} (JA3 {}), ALPN {:?}",
            self.fingerprint,
            spec.ja3().hash(),
            spec.alpn
        );

        let options = DialOptions {
            insecure: self.insecure,
            keep_alive: self.keep_alive,
            timeouts: self.timeouts.clone(),
        };
        Ok(RoundTripper {
            tls: TlsDialer::new(raw_dialer.clone(), handshaker, spec, options),
            raw_dialer,
            plain_transports: TransportCache::new(),
            cookies: self.cookies,
            user_agent,
            keep_alive: self.keep_alive,
            timeouts: self.timeouts,
        })
    }
}

impl Default for RoundTripperBuilder {
    fn default() -> Self {
        Self::new()
    }
}
