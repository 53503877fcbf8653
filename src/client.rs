//! High-level client over the round tripper.
//!
//! Builds requests from method/URL/headers/cookies/body, keeps a cookie
//! jar, runs an optional pre-request hook, and buffers responses. It never
//! follows redirects: a 3xx is returned as-is.
//!
//! ```rust,ignore
//! let client = Client::builder().fingerprint("firefox_133").build()?;
//! let resp = client
//!     .get("https://example.com/")
//!     .header("accept", "text/html")
//!     .send()
//!     .await?;
//! println!("{}", resp.text()?);
//! ```

use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{Method, Request};
use http_body_util::Full;

use crate::config::BrowserConfig;
use crate::cookie::{append_cookie_header, Cookie, CookieJar};
use crate::dump::{dump_request, dump_response};
use crate::error::{Error, Result};
use crate::response::Response;
use crate::timeouts::{with_timeout, Timeouts};
use crate::transport::tcp::TcpFingerprint;
use crate::transport::{Dialer, Handshaker, RoundTripper, RoundTripperBuilder};

/// Called with each request just before it is sent. An error aborts the
/// request.
pub type RequestHook = Arc<dyn Fn(&mut Request<Bytes>) -> Result<()> + Send + Sync>;

/// Settings the round tripper is (re)built from.
#[derive(Clone)]
struct TransportSettings {
    config: BrowserConfig,
    tcp_fingerprint: Option<TcpFingerprint>,
    root_certs: Vec<Vec<u8>>,
    dialer: Option<Arc<dyn Dialer>>,
    handshaker: Option<Arc<dyn Handshaker>>,
}

impl TransportSettings {
    fn round_tripper(&self) -> Result<RoundTripper> {
        let mut builder: RoundTripperBuilder = self
            .config
            .round_tripper_builder()
            .root_certificates(self.root_certs.clone());
        if let Some(fp) = &self.tcp_fingerprint {
            builder = builder.tcp_fingerprint(fp.clone());
        }
        if let Some(dialer) = &self.dialer {
            builder = builder.dialer(dialer.clone());
        }
        if let Some(handshaker) = &self.handshaker {
            builder = builder.handshaker(handshaker.clone());
        }
        builder.build()
    }
}

/// HTTP client with a browser's TLS and HTTP/2 fingerprint.
pub struct Client {
    settings: Mutex<TransportSettings>,
    round_tripper: RwLock<Arc<RoundTripper>>,
    jar: Mutex<CookieJar>,
    store_cookies: bool,
    before_request: Option<RequestHook>,
    dump: bool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn get(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::POST, url)
    }

    pub fn request(&self, method: Method, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder {
            client: self,
            url: url.into(),
            method,
            headers: Vec::new(),
            cookies: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Current round tripper. `set_proxy` swaps it; in-flight requests keep
    /// the one they started with.
    pub fn round_tripper(&self) -> Arc<RoundTripper> {
        match self.round_tripper.read() {
            Ok(rt) => rt.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Route all further requests through `proxy_url`.
    ///
    /// Rebuilds the round tripper, so cached transports start over. A
    /// custom dialer given to the builder is replaced by the proxy dialer.
    pub fn set_proxy(&self, proxy_url: &str) -> Result<()> {
        let mut settings = lock(&self.settings).clone();
        settings.config.proxy = Some(proxy_url.to_string());
        settings.dialer = None;
        let rebuilt = Arc::new(settings.round_tripper()?);

        *lock(&self.settings) = settings;
        match self.round_tripper.write() {
            Ok(mut rt) => *rt = rebuilt,
            Err(poisoned) => *poisoned.into_inner() = rebuilt,
        }
        tracing::debug!("proxy set to {}", proxy_url);
        Ok(())
    }

    /// Store cookies in the jar for `url`.
    pub fn set_cookies(&self, url: &str, cookies: Vec<Cookie>) -> Result<()> {
        lock(&self.jar).set_cookies(url, cookies)
    }

    /// Jar cookies that would be sent to `url`.
    pub fn cookies(&self, url: &str) -> Vec<Cookie> {
        lock(&self.jar)
            .cookies_for_url(url)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn clear_cookies(&self) {
        lock(&self.jar).clear();
    }

    pub async fn close_idle_connections(&self) {
        self.round_tripper().close_idle_connections().await;
    }

    async fn execute(&self, mut request: Request<Bytes>) -> Result<Response> {
        let url = request.uri().to_string();

        if let Some(jar_header) = lock(&self.jar).build_cookie_header(&url) {
            append_cookie_header(request.headers_mut(), &jar_header)?;
        }
        if let Some(hook) = &self.before_request {
            hook(&mut request)?;
        }
        if self.dump {
            tracing::debug!(target: "guise::dump", "request:\n{}", dump_request(&request));
        }

        let total = lock(&self.settings).config.timeouts.total;
        let round_tripper = self.round_tripper();
        let response = with_timeout(total, Error::TotalTimeout, async move {
            let (parts, body) = request.into_parts();
            let raw = round_tripper
                .round_trip(Request::from_parts(parts, Full::new(body)))
                .await?;
            Response::from_http(raw).await
        })
        .await?
        .with_url(url.clone());

        if self.dump {
            tracing::debug!(target: "guise::dump", "response:\n{}", dump_response(&response));
        }
        if self.store_cookies {
            lock(&self.jar).store_from_headers(response.headers(), &url);
        }
        Ok(response)
    }
}

/// Builder for [`Client`].
pub struct ClientBuilder {
    settings: TransportSettings,
    store_cookies: bool,
    before_request: Option<RequestHook>,
    dump: bool,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::from_config(BrowserConfig::default())
    }

    pub fn from_config(config: BrowserConfig) -> Self {
        Self {
            settings: TransportSettings {
                config,
                tcp_fingerprint: None,
                root_certs: Vec::new(),
                dialer: None,
                handshaker: None,
            },
            store_cookies: true,
            before_request: None,
            dump: false,
        }
    }

    pub fn fingerprint(mut self, id: impl Into<String>) -> Self {
        self.settings.config.fingerprint = id.into();
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.settings.config.user_agent = Some(ua.into());
        self
    }

    /// Cookies the round tripper adds to every covered request.
    pub fn cookies(mut self, cookies: Vec<Cookie>) -> Self {
        self.settings.config.cookies = cookies;
        self
    }

    pub fn insecure(mut self, insecure: bool) -> Self {
        self.settings.config.insecure = insecure;
        self
    }

    pub fn force_http1(mut self, force: bool) -> Self {
        self.settings.config.force_http1 = force;
        self
    }

    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.settings.config.keep_alive = keep_alive;
        self
    }

    pub fn proxy(mut self, url: impl Into<String>) -> Self {
        self.settings.config.proxy = Some(url.into());
        self
    }

    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.settings.config.timeouts = timeouts;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.settings.config.timeouts.connect = Some(timeout);
        self
    }

    pub fn ttfb_timeout(mut self, timeout: Duration) -> Self {
        self.settings.config.timeouts.ttfb = Some(timeout);
        self
    }

    /// Deadline for the whole request including the body.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.settings.config.timeouts.total = Some(timeout);
        self
    }

    pub fn tcp_fingerprint(mut self, fp: TcpFingerprint) -> Self {
        self.settings.tcp_fingerprint = Some(fp);
        self
    }

    pub fn root_certificates(mut self, certs: Vec<Vec<u8>>) -> Self {
        self.settings.root_certs = certs;
        self
    }

    pub fn dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.settings.dialer = Some(dialer);
        self
    }

    pub fn handshaker(mut self, handshaker: Arc<dyn Handshaker>) -> Self {
        self.settings.handshaker = Some(handshaker);
        self
    }

    /// Keep `Set-Cookie` values from responses in the jar. On by default.
    pub fn store_cookies(mut self, store: bool) -> Self {
        self.store_cookies = store;
        self
    }

    pub fn before_request<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Request<Bytes>) -> Result<()> + Send + Sync + 'static,
    {
        self.before_request = Some(Arc::new(hook));
        self
    }

    /// Log request/response dumps at debug level under `guise::dump`.
    pub fn dump(mut self, dump: bool) -> Self {
        self.dump = dump;
        self
    }

    pub fn build(self) -> Result<Client> {
        let round_tripper = Arc::new(self.settings.round_tripper()?);
        Ok(Client {
            settings: Mutex::new(self.settings),
            round_tripper: RwLock::new(round_tripper),
            jar: Mutex::new(CookieJar::new()),
            store_cookies: self.store_cookies,
            before_request: self.before_request,
            dump: self.dump,
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A request being assembled.
pub struct RequestBuilder<'a> {
    client: &'a Client,
    url: String,
    method: Method,
    headers: Vec<(String, String)>,
    cookies: Vec<Cookie>,
    body: Bytes,
}

impl<'a> RequestBuilder<'a> {
    /// Set a header, replacing earlier values of the same name.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&key));
        self.headers.push((key, value.into()));
        self
    }

    pub fn headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in headers {
            self = self.header(k, v);
        }
        self
    }

    /// Add a cookie to this request only.
    pub fn cookie(mut self, cookie: Cookie) -> Self {
        self.cookies.push(cookie);
        self
    }

    pub fn cookies(mut self, cookies: Vec<Cookie>) -> Self {
        self.cookies.extend(cookies);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// JSON body; sets `content-type` unless already set.
    pub fn json<T: serde::Serialize>(mut self, value: &T) -> Result<Self> {
        self.body = Bytes::from(serde_json::to_vec(value)?);
        if !self
            .headers
            .iter()
            .any(|(k, _)| k.eq_ignore_ascii_case(CONTENT_TYPE.as_str()))
        {
            self.headers
                .push((CONTENT_TYPE.to_string(), "application/json".to_string()));
        }
        Ok(self)
    }

    fn build(self) -> Result<(&'a Client, Request<Bytes>)> {
        let url = url::Url::parse(&self.url)?;
        let mut builder = Request::builder().method(self.method).uri(url.as_str());
        let headers = builder
            .headers_mut()
            .ok_or_else(|| Error::http_protocol(format!("Invalid request for {}", self.url)))?;

        for (key, value) in &self.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| Error::http_protocol(format!("Invalid header name '{}': {}", key, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::http_protocol(format!("Invalid header value for '{}': {}", key, e)))?;
            headers.insert(name, value);
        }

        let pairs: Vec<String> = self
            .cookies
            .iter()
            .filter(|c| !c.name.is_empty())
            .map(Cookie::pair)
            .collect();
        if !pairs.is_empty() {
            append_cookie_header(headers, &pairs.join("; "))?;
        }

        let request = builder
            .body(self.body)
            .map_err(|e| Error::http_protocol(format!("Failed to build request: {}", e)))?;
        Ok((self.client, request))
    }

    pub async fn send(self) -> Result<Response> {
        let (client, request) = self.build()?;
        client.execute(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::COOKIE;

    #[test]
    fn test_request_builder_headers_and_cookies() {
        let client = Client::builder().build().unwrap();
        let (_, req) = client
            .post("https://example.com/api")
            .header("X-Token", "a")
            .header("x-token", "b")
            .cookie(Cookie::new("a", "1", ""))
            .cookie(Cookie::new("b", "x y", ""))
            .json(&serde_json::json!({"k": 1}))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.headers().get_all("x-token").iter().count(), 1);
        assert_eq!(req.headers()["x-token"], "b");
        assert_eq!(req.headers()[COOKIE], "a=1; b=\"x y\"");
        assert_eq!(req.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(req.body().as_ref(), br#"{"k":1}"#);
    }

    #[test]
    fn test_invalid_url() {
        let client = Client::builder().build().unwrap();
        assert!(matches!(
            client.get("not a url").build().err().unwrap(),
            Error::UrlParse(_)
        ));
    }

    #[test]
    fn test_set_and_get_cookies() {
        let client = Client::builder().build().unwrap();
        client
            .set_cookies("https://example.com/", vec![Cookie::new("a", "1", "")])
            .unwrap();
        assert!(client.cookies("https://other.test/").is_empty());
        let cookies = client.cookies("https://example.com/page");
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].domain, "example.com");
    }

    #[test]
    fn test_set_proxy_rebuilds_round_tripper() {
        let client = Client::builder().build().unwrap();
        let before = client.round_tripper();
        client.set_proxy("socks5://127.0.0.1:1080").unwrap();
        assert!(!Arc::ptr_eq(&before, &client.round_tripper()));
        assert!(client.set_proxy("ftp://nope").is_err());
    }
}
