//! HTTP version and ALPN protocol tokens.

/// ALPN token for HTTP/2.
pub const H2_ALPN: &str = "h2";
/// ALPN token for HTTP/1.1.
pub const HTTP1_ALPN: &str = "http/1.1";

/// Wire protocol a cached transport speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpVersion {
    /// HTTP/1.1 (also used when ALPN negotiated nothing).
    Http1_1,
    /// HTTP/2 over TLS.
    Http2,
}

impl HttpVersion {
    /// Get human-readable version string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http1_1 => "HTTP/1.1",
            Self::Http2 => "HTTP/2",
        }
    }

    /// Check if this version supports multiplexing.
    pub fn supports_multiplexing(&self) -> bool {
        matches!(self, Self::Http2)
    }
}

/// Negotiated ALPN protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlpnProtocol {
    /// HTTP/2 ("h2")
    H2,
    /// HTTP/1.1 ("http/1.1")
    Http1,
    /// No ALPN negotiated or unknown protocol
    None,
}

impl AlpnProtocol {
    /// Map the raw protocol selected by the server.
    pub fn from_selected(selected: Option<&[u8]>) -> Self {
        match selected {
            Some(p) if p == H2_ALPN.as_bytes() => Self::H2,
            Some(p) if p == HTTP1_ALPN.as_bytes() => Self::Http1,
            _ => Self::None,
        }
    }

    /// Check if HTTP/2 was negotiated.
    pub fn is_h2(&self) -> bool {
        matches!(self, Self::H2)
    }

    /// Transport flavor for this ALPN result. Anything but `h2` is HTTP/1.x.
    pub fn http_version(&self) -> HttpVersion {
        if self.is_h2() {
            HttpVersion::Http2
        } else {
            HttpVersion::Http1_1
        }
    }
}
