//! HTTP/1.1-style text dumps of requests and responses, for debugging.

use std::fmt::Write;

use http::{HeaderMap, Request, Version};

use crate::response::Response;

/// Bodies longer than this are truncated in dumps.
const MAX_DUMP_BODY: usize = 16 * 1024;

/// Render a request as it would appear on an HTTP/1.1 wire.
pub fn dump_request<B: AsRef<[u8]>>(request: &Request<B>) -> String {
    let uri = request.uri();
    let target = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let mut out = format!("{} {} {}\r\n", request.method(), target, version_str(request.version()));
    if !request.headers().contains_key(http::header::HOST) {
        if let Some(authority) = uri.authority() {
            let _ = write!(out, "Host: {}\r\n", authority);
        }
    }
    write_headers(&mut out, request.headers());
    out.push_str("\r\n");
    write_body(&mut out, request.body().as_ref());
    out
}

/// Render a buffered response.
pub fn dump_response(response: &Response) -> String {
    let status = response.status();
    let mut out = format!(
        "{} {} {}\r\n",
        version_str(response.version()),
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    );
    write_headers(&mut out, response.headers());
    out.push_str("\r\n");
    write_body(&mut out, response.body());
    out
}

fn version_str(version: Version) -> &'static str {
    match version {
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2.0",
        _ => "HTTP/1.1",
    }
}

fn write_headers(out: &mut String, headers: &HeaderMap) {
    for (name, value) in headers {
        let _ = write!(out, "{}: {}\r\n", name, String::from_utf8_lossy(value.as_bytes()));
    }
}

fn write_body(out: &mut String, body: &[u8]) {
    if body.len() > MAX_DUMP_BODY {
        out.push_str(&String::from_utf8_lossy(&body[..MAX_DUMP_BODY]));
        let _ = write!(out, "\n[... {} more bytes]", body.len() - MAX_DUMP_BODY);
    } else {
        out.push_str(&String::from_utf8_lossy(body));
    }
}
