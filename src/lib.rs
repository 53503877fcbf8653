//! # Guise
//!
//! HTTP client that impersonates a browser's TLS ClientHello (JA3) and
//! HTTP/2 settings.
//!
//! Each destination is negotiated once: the first TLS handshake's ALPN
//! result picks an HTTP/1.1 or HTTP/2 transport, which is cached and reused
//! for every later request to that `host:port`. The connection opened for
//! negotiation is handed to the new transport rather than thrown away.
//!
//! ```rust,ignore
//! use guise::Client;
//!
//! let client = Client::builder().fingerprint("chrome_131").build()?;
//! let resp = client.get("https://example.com/").send().await?;
//! println!("{} {:?}", resp.status(), resp.version());
//! ```

pub mod client;
pub mod config;
pub mod cookie;
pub mod dump;
pub mod error;
pub mod fingerprint;
pub mod response;
pub mod timeouts;
pub mod transport;
pub mod version;

pub use client::{Client, ClientBuilder, RequestBuilder};
pub use config::BrowserConfig;
pub use cookie::{Cookie, CookieJar};
pub use error::{Error, Result};
pub use fingerprint::{ClientHelloSpec, FingerprintProfile, Ja3};
pub use response::Response;
pub use timeouts::Timeouts;
pub use transport::{RoundTripper, RoundTripperBuilder};
pub use version::HttpVersion;
