//! Destination address normalization.
//!
//! Every cache lookup for a destination goes through `destination_addr`, so
//! the connection and transport caches agree on one `host:port` key.

use http::Uri;

use crate::error::{Error, Result};

/// Join host and port, bracketing IPv6 literals.
pub fn join_host_port(host: &str, port: u16) -> String {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Split `host:port`; falls back to the whole string as host.
pub fn split_host(addr: &str) -> &str {
    if let Some(rest) = addr.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            return &rest[..end];
        }
    }
    match addr.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && port.parse::<u16>().is_ok() => host,
        _ => addr,
    }
}

/// Default port for a scheme. Unknown schemes dial 443.
pub fn default_port(scheme: Option<&str>) -> u16 {
    match scheme {
        Some(s) if s.eq_ignore_ascii_case("http") => 80,
        _ => 443,
    }
}

/// Canonical `host:port` for the request target.
pub fn destination_addr(uri: &Uri) -> Result<String> {
    let host = uri
        .host()
        .ok_or_else(|| Error::http_protocol(format!("Missing host in URL: {}", uri)))?;
    let port = uri
        .port_u16()
        .unwrap_or_else(|| default_port(uri.scheme_str()));
    Ok(join_host_port(&host.to_ascii_lowercase(), port))
}
