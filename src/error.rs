//! Error types for guise crate.

use std::io;
use std::time::Duration;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error used as the attached cause of dial and handshake failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// BoringSSL reason codes raised when the peer and the ClientHello disagree
/// on key-share curves. Retrying usually succeeds.
const CURVE_MISMATCH_MARKERS: &[&str] = &["UNSUPPORTED_ELLIPTIC_CURVE", "WRONG_CURVE"];

/// Errors that can occur while dialing, negotiating, or dispatching requests.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Fingerprint identifier is neither a named template nor a valid JA3 string.
    #[error("Unknown fingerprint '{id}': {reason}")]
    UnknownFingerprint { id: String, reason: String },

    /// Request URL scheme is not served by any transport.
    #[error("Unsupported URL scheme: [{0}]")]
    UnsupportedScheme(String),

    /// Underlying network connect failed.
    #[error("Dial {addr} failed: {source}")]
    DialFailed {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// TLS handshake did not complete.
    #[error("{}", handshake_message(.retryable, .message))]
    HandshakeFailed {
        message: String,
        retryable: bool,
        #[source]
        source: Option<BoxError>,
    },

    /// Proxy refused or mangled the tunnel request.
    #[error("Proxy error: {0}")]
    Proxy(String),

    /// TLS configuration error (before any bytes hit the wire).
    #[error("TLS error: {0}")]
    Tls(String),

    /// HTTP protocol error.
    #[error("HTTP protocol error: {0}")]
    HttpProtocol(String),

    /// Connection error after the handshake.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Cookie parsing error.
    #[error("Cookie parse error: {0}")]
    CookieParse(String),

    /// Decompression error.
    #[error("Decompression error: {0}")]
    Decompression(String),

    /// URL parsing error.
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Connect timeout (dial + TLS handshake).
    #[error("Connect timeout after {0:?}")]
    ConnectTimeout(Duration),

    /// TTFB (time-to-first-byte) timeout.
    #[error("TTFB timeout after {0:?} - server did not respond with headers")]
    TtfbTimeout(Duration),

    /// Total request deadline exceeded.
    #[error("Total request deadline exceeded after {0:?}")]
    TotalTimeout(Duration),
}

fn handshake_message(retryable: &bool, message: &str) -> String {
    if *retryable {
        format!("TLS handshake failed (please retry request): {}", message)
    } else {
        format!("TLS handshake failed: {}", message)
    }
}

impl Error {
    /// Create an unknown fingerprint error.
    pub fn unknown_fingerprint(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnknownFingerprint {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Create a dial error for `addr`.
    pub fn dial(addr: impl Into<String>, source: io::Error) -> Self {
        Self::DialFailed {
            addr: addr.into(),
            source,
        }
    }

    /// Create a handshake error from its underlying cause.
    ///
    /// Curve negotiation mismatches are flagged retryable.
    pub fn handshake<E>(cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let message = cause.to_string();
        let retryable = is_curve_mismatch(&message);
        Self::HandshakeFailed {
            message,
            retryable,
            source: Some(Box::new(cause)),
        }
    }

    /// Create a handshake error from a message only.
    pub fn handshake_msg(message: impl Into<String>) -> Self {
        let message = message.into();
        let retryable = is_curve_mismatch(&message);
        Self::HandshakeFailed {
            message,
            retryable,
            source: None,
        }
    }

    /// Create a proxy error.
    pub fn proxy(message: impl Into<String>) -> Self {
        Self::Proxy(message.into())
    }

    /// Create a TLS configuration error.
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls(message.into())
    }

    /// Create an HTTP protocol error.
    pub fn http_protocol(message: impl Into<String>) -> Self {
        Self::HttpProtocol(message.into())
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Whether the caller may reasonably retry the same request.
    ///
    /// Nothing is retried internally.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::HandshakeFailed { retryable, .. } => *retryable,
            Self::DialFailed { .. } | Self::ConnectTimeout(_) | Self::TtfbTimeout(_) => true,
            _ => false,
        }
    }
}

fn is_curve_mismatch(message: &str) -> bool {
    CURVE_MISMATCH_MARKERS.iter().any(|m| message.contains(m))
}
