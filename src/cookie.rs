//! Cookies: pre-configured request cookies and a manual jar.
//!
//! Expiry is explicit. `parse_cookie_date` either returns an instant or a
//! `CookieParse` error; a cookie is expired when `expires <= now` or
//! `max_age < 0`.

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use http::header::{HeaderMap, HeaderValue, COOKIE, SET_COOKIE};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;

use crate::error::{Error, Result};

/// A cookie record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// Host or parent domain, lowercase, no leading dot. Empty matches any host.
    #[serde(default, deserialize_with = "deserialize_domain")]
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_expires",
        deserialize_with = "deserialize_expires"
    )]
    pub expires: Option<DateTime<Utc>>,
    /// Negative means delete now. Positive values are ignored for
    /// pre-configured cookies, which have no creation time to count from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<i64>,
}

fn default_path() -> String {
    "/".to_string()
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: normalize_domain(&domain.into()),
            path: default_path(),
            secure: false,
            http_only: false,
            same_site: None,
            expires: None,
            max_age: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn expires(mut self, at: DateTime<Utc>) -> Self {
        self.expires = Some(at);
        self
    }

    /// Parse a `Set-Cookie` value received from `request_url`.
    ///
    /// An `Expires` attribute in an unrecognized format is an error.
    pub fn from_set_cookie_header(header: &str, request_url: &str) -> Result<Self> {
        let parsed_url = Url::parse(request_url).map_err(|e| Error::CookieParse(e.to_string()))?;
        let request_domain = parsed_url
            .host_str()
            .ok_or_else(|| Error::CookieParse("No host in URL".to_string()))?;

        let mut parts = header.split(';').map(str::trim);
        let (name, value) = match parts.next().and_then(|p| p.split_once('=')) {
            Some((n, v)) => (n.trim().to_string(), v.trim().to_string()),
            None => return Err(Error::CookieParse(format!("No = in cookie: {}", header))),
        };
        if name.is_empty() {
            return Err(Error::CookieParse("Empty cookie name".to_string()));
        }

        let mut cookie = Cookie::new(name, value, request_domain);
        for attr in parts {
            if attr.eq_ignore_ascii_case("secure") {
                cookie.secure = true;
            } else if attr.eq_ignore_ascii_case("httponly") {
                cookie.http_only = true;
            } else if let Some((key, val)) = attr.split_once('=') {
                let val = val.trim();
                match key.trim().to_ascii_lowercase().as_str() {
                    "domain" => cookie.domain = normalize_domain(val),
                    "path" if val.starts_with('/') => cookie.path = val.to_string(),
                    "expires" => cookie.expires = Some(parse_cookie_date(val)?),
                    "max-age" => {
                        cookie.max_age = Some(val.parse().map_err(|_| {
                            Error::CookieParse(format!("Invalid Max-Age '{}'", val))
                        })?)
                    }
                    "samesite" => cookie.same_site = Some(val.to_string()),
                    _ => {}
                }
            }
        }
        Ok(cookie)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.max_age.is_some_and(|age| age < 0) || self.expires.is_some_and(|at| at <= now)
    }

    /// RFC 6265 domain-match. IP addresses only match exactly.
    pub fn domain_matches(&self, host: &str) -> bool {
        if self.domain.is_empty() {
            return true;
        }
        let host = host.trim_start_matches('[').trim_end_matches(']').to_ascii_lowercase();
        if host == self.domain {
            return true;
        }
        host.parse::<IpAddr>().is_err()
            && host.len() > self.domain.len()
            && host.ends_with(&self.domain)
            && host.as_bytes()[host.len() - self.domain.len() - 1] == b'.'
    }

    /// RFC 6265 path-match.
    pub fn path_matches(&self, request_path: &str) -> bool {
        let cookie_path = if self.path.is_empty() { "/" } else { self.path.as_str() };
        let request_path = if request_path.is_empty() { "/" } else { request_path };
        if request_path == cookie_path {
            return true;
        }
        request_path.starts_with(cookie_path)
            && (cookie_path.ends_with('/') || request_path.as_bytes()[cookie_path.len()] == b'/')
    }

    /// Whether this cookie belongs on a request to `host`/`path`.
    pub fn covers(&self, host: &str, path: &str, secure: bool, now: DateTime<Utc>) -> bool {
        !self.is_expired_at(now)
            && (secure || !self.secure)
            && self.domain_matches(host)
            && self.path_matches(path)
    }

    /// Value safe for a `Cookie` header: invalid octets dropped, quoted if
    /// it contains a space or comma.
    pub fn sanitized_value(&self) -> String {
        let cleaned: String = self
            .value
            .chars()
            .filter(|c| matches!(c, ' '..='~') && !matches!(c, '"' | ';' | '\\'))
            .collect();
        if cleaned.contains(' ') || cleaned.contains(',') {
            format!("\"{}\"", cleaned)
        } else {
            cleaned
        }
    }

    /// `name=value` pair as sent in a `Cookie` header.
    pub fn pair(&self) -> String {
        format!("{}={}", self.name, self.sanitized_value())
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// `Cookie` header value for the cookies covering a request, or `None`.
pub fn cookie_header(
    cookies: &[Cookie],
    host: &str,
    path: &str,
    secure: bool,
    now: DateTime<Utc>,
) -> Option<String> {
    let pairs: Vec<String> = cookies
        .iter()
        .filter(|c| !c.name.is_empty() && c.covers(host, path, secure, now))
        .map(Cookie::pair)
        .collect();
    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

/// Append `pairs` to the request's `Cookie` header, joining with `"; "`.
pub fn append_cookie_header(headers: &mut HeaderMap, pairs: &str) -> Result<()> {
    let combined = match headers.get(COOKIE).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.is_empty() => format!("{}; {}", existing, pairs),
        _ => pairs.to_string(),
    };
    let value = HeaderValue::from_str(&combined)
        .map_err(|e| Error::CookieParse(format!("Invalid Cookie header: {}", e)))?;
    headers.insert(COOKIE, value);
    Ok(())
}

/// Parse a cookie date.
///
/// Accepted: RFC 1123 (`Sun, 06 Nov 1994 08:49:37 GMT`), RFC 850
/// (`Sunday, 06-Nov-94 08:49:37 GMT`; years 70-99 are 19xx, 00-69 are
/// 20xx), Netscape (`Sun, 06-Nov-1994 08:49:37 GMT`), asctime
/// (`Sun Nov  6 08:49:37 1994`), RFC 3339, and integer Unix seconds. The
/// weekday is not checked against the date.
pub fn parse_cookie_date(value: &str) -> Result<DateTime<Utc>> {
    let unrecognized = || Error::CookieParse(format!("Unrecognized cookie date '{}'", value));
    let trimmed = value.trim();

    if let Ok(secs) = trimmed.parse::<i64>() {
        return Utc.timestamp_opt(secs, 0).single().ok_or_else(unrecognized);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    let mut tokens: Vec<String> = trimmed.split_whitespace().map(str::to_string).collect();
    if tokens.first().is_some_and(|t| is_weekday(t)) {
        tokens.remove(0);
    }
    if tokens
        .last()
        .is_some_and(|t| t.eq_ignore_ascii_case("GMT") || t.eq_ignore_ascii_case("UTC"))
    {
        tokens.pop();
    }
    expand_two_digit_year(&mut tokens);
    let normalized = tokens.join(" ");

    for fmt in ["%d %b %Y %H:%M:%S", "%d-%b-%Y %H:%M:%S", "%b %d %H:%M:%S %Y"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&normalized, fmt) {
            return Ok(dt.and_utc());
        }
    }
    Err(unrecognized())
}

fn is_weekday(token: &str) -> bool {
    let word = token.trim_end_matches(',').to_ascii_lowercase();
    word.len() >= 3
        && ["monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday"]
            .iter()
            .any(|day| day.starts_with(&word))
}

/// Rewrite a two-digit year in `06-Nov-94` or `06 Nov 94` form to four digits.
fn expand_two_digit_year(tokens: &mut [String]) {
    fn widen(yy: &str) -> Option<String> {
        if yy.len() != 2 {
            return None;
        }
        let n: u32 = yy.parse().ok()?;
        Some(if n >= 70 { 1900 + n } else { 2000 + n }.to_string())
    }

    let Some(first) = tokens.first_mut() else {
        return;
    };
    let dashed: Vec<&str> = first.split('-').collect();
    if dashed.len() == 3 {
        if let Some(year) = widen(dashed[2]) {
            *first = format!("{}-{}-{}", dashed[0], dashed[1], year);
        }
        return;
    }
    if tokens.len() >= 3 && tokens[0].chars().all(|c| c.is_ascii_digit()) {
        if let Some(year) = widen(&tokens[2]) {
            tokens[2] = year;
        }
    }
}

fn deserialize_domain<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    Ok(normalize_domain(&String::deserialize(d)?))
}

fn serialize_expires<S: Serializer>(value: &Option<DateTime<Utc>>, s: S) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(dt) => s.serialize_str(&dt.to_rfc3339()),
        None => s.serialize_none(),
    }
}

fn deserialize_expires<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Unix(i64),
    }

    match Option::<Raw>::deserialize(d)? {
        None => Ok(None),
        Some(Raw::Text(s)) => parse_cookie_date(&s).map(Some).map_err(serde::de::Error::custom),
        Some(Raw::Unix(secs)) => Utc
            .timestamp_opt(secs, 0)
            .single()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {}", secs))),
    }
}

/// Cookie jar for the client layer. Nothing is stored automatically unless
/// the client is told to.
#[derive(Debug, Default, Clone)]
pub struct CookieJar {
    // domain -> (path, name) -> cookie
    cookies: HashMap<String, HashMap<(String, String), Cookie>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `cookie`, replacing one with the same domain, path and name.
    /// An already-expired cookie deletes its stored counterpart instead.
    pub fn store(&mut self, cookie: Cookie) {
        let key = (cookie.path.clone(), cookie.name.clone());
        if cookie.is_expired() {
            if let Some(by_key) = self.cookies.get_mut(&cookie.domain) {
                by_key.remove(&key);
            }
            return;
        }
        self.cookies
            .entry(cookie.domain.clone())
            .or_default()
            .insert(key, cookie);
    }

    /// Store cookies set for `url`; an empty domain becomes the URL host.
    pub fn set_cookies(&mut self, url: &str, cookies: impl IntoIterator<Item = Cookie>) -> Result<()> {
        let parsed = Url::parse(url)?;
        let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
        for mut cookie in cookies {
            if cookie.domain.is_empty() {
                cookie.domain = host.clone();
            }
            self.store(cookie);
        }
        Ok(())
    }

    /// Live cookies covering `url`, longest path first.
    pub fn cookies_for_url(&self, url: &str) -> Vec<&Cookie> {
        let Ok(parsed) = Url::parse(url) else {
            return Vec::new();
        };
        let Some(host) = parsed.host_str() else {
            return Vec::new();
        };
        let secure = parsed.scheme() == "https";
        let now = Utc::now();
        let mut found: Vec<&Cookie> = self
            .cookies
            .values()
            .flat_map(|m| m.values())
            .filter(|c| c.covers(host, parsed.path(), secure, now))
            .collect();
        found.sort_by(|a, b| b.path.len().cmp(&a.path.len()).then_with(|| a.name.cmp(&b.name)));
        found
    }

    pub fn build_cookie_header(&self, url: &str) -> Option<String> {
        let cookies = self.cookies_for_url(url);
        if cookies.is_empty() {
            return None;
        }
        Some(cookies.iter().map(|c| c.pair()).collect::<Vec<_>>().join("; "))
    }

    /// Ingest every `Set-Cookie` header of a response to `request_url`.
    /// Unparseable headers are logged and skipped.
    pub fn store_from_headers(&mut self, headers: &HeaderMap, request_url: &str) {
        for value in headers.get_all(SET_COOKIE) {
            let Ok(raw) = value.to_str() else {
                continue;
            };
            match Cookie::from_set_cookie_header(raw, request_url) {
                Ok(cookie) => self.store(cookie),
                Err(e) => tracing::warn!("ignoring Set-Cookie from {}: {}", request_url, e),
            }
        }
    }

    pub fn get(&self, domain: &str, name: &str) -> Option<&Cookie> {
        self.cookies
            .get(&normalize_domain(domain))?
            .values()
            .find(|c| c.name == name)
    }

    pub fn cookies(&self) -> Vec<&Cookie> {
        self.cookies.values().flat_map(|m| m.values()).collect()
    }

    pub fn clear(&mut self) {
        self.cookies.clear();
    }

    pub fn len(&self) -> usize {
        self.cookies.values().map(|m| m.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn normalize_domain(domain: &str) -> String {
    domain.strip_prefix('.').unwrap_or(domain).to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_parse_cookie_date_formats() {
        let expected = at("1994-11-06T08:49:37Z");
        for s in [
            "Sun, 06 Nov 1994 08:49:37 GMT",
            "Sunday, 06-Nov-94 08:49:37 GMT",
            "Sun, 06-Nov-1994 08:49:37 GMT",
            "Sun Nov  6 08:49:37 1994",
            "1994-11-06T08:49:37Z",
            "784111777",
        ] {
            assert_eq!(parse_cookie_date(s).unwrap(), expected, "format: {}", s);
        }
    }

    #[test]
    fn test_two_digit_year_pivot() {
        assert_eq!(
            parse_cookie_date("Thu, 01-Jan-70 00:00:00 GMT").unwrap(),
            at("1970-01-01T00:00:00Z")
        );
        assert_eq!(
            parse_cookie_date("Wed, 09-Jun-21 10:18:14 GMT").unwrap(),
            at("2021-06-09T10:18:14Z")
        );
        assert_eq!(
            parse_cookie_date("Fri, 31 Dec 69 23:59:59 GMT").unwrap(),
            at("2069-12-31T23:59:59Z")
        );
    }

    #[test]
    fn test_parse_cookie_date_rejects_garbage() {
        for s in ["", "tomorrow", "Sun, 32 Nov 1994 08:49:37 GMT", "06/11/1994"] {
            assert!(matches!(parse_cookie_date(s), Err(Error::CookieParse(_))), "{}", s);
        }
    }

    #[test]
    fn test_expiry() {
        let now = at("2024-01-01T00:00:00Z");
        let c = Cookie::new("a", "1", "example.com");
        assert!(!c.is_expired_at(now));
        assert!(c.clone().expires(now).is_expired_at(now));
        assert!(!c.clone().expires(now + Duration::seconds(1)).is_expired_at(now));

        let mut deleted = c.clone();
        deleted.max_age = Some(-1);
        assert!(deleted.is_expired_at(now));

        let mut positive = c;
        positive.max_age = Some(0);
        assert!(!positive.is_expired_at(now));
    }

    #[test]
    fn test_domain_and_path_match() {
        let c = Cookie::new("a", "1", ".Example.com").with_path("/docs");
        assert_eq!(c.domain, "example.com");
        assert!(c.domain_matches("example.com"));
        assert!(c.domain_matches("www.example.com"));
        assert!(!c.domain_matches("badexample.com"));
        assert!(c.path_matches("/docs"));
        assert!(c.path_matches("/docs/web"));
        assert!(!c.path_matches("/docsearch"));
        assert!(!c.path_matches("/"));

        let ip = Cookie::new("a", "1", "1.2.3.4");
        assert!(ip.domain_matches("1.2.3.4"));
        assert!(!ip.domain_matches("5.1.2.3.4"));

        assert!(Cookie::new("a", "1", "").domain_matches("anything.test"));
    }

    #[test]
    fn test_secure_cookie_not_sent_over_http() {
        let now = Utc::now();
        let c = Cookie::new("s", "1", "example.com").secure(true);
        assert!(c.covers("example.com", "/", true, now));
        assert!(!c.covers("example.com", "/", false, now));
    }

    #[test]
    fn test_cookie_header_and_sanitize() {
        let now = Utc::now();
        let cookies = vec![
            Cookie::new("a", "1", ""),
            Cookie::new("b", "x y", "example.com"),
            Cookie::new("c", "bad\"val;ue", "example.com"),
            Cookie::new("d", "other", "other.test"),
        ];
        assert_eq!(
            cookie_header(&cookies, "example.com", "/", true, now).unwrap(),
            "a=1; b=\"x y\"; c=badvalue"
        );
        assert!(cookie_header(&cookies[3..], "example.com", "/", true, now).is_none());
    }

    #[test]
    fn test_append_cookie_header() {
        let mut headers = HeaderMap::new();
        append_cookie_header(&mut headers, "a=1").unwrap();
        assert_eq!(headers[COOKIE], "a=1");
        append_cookie_header(&mut headers, "b=2; c=3").unwrap();
        assert_eq!(headers[COOKIE], "a=1; b=2; c=3");
    }

    #[test]
    fn test_set_cookie_parsing() {
        let c = Cookie::from_set_cookie_header(
            "sid=abc; Domain=.example.com; Path=/app; Secure; HttpOnly; SameSite=Lax; Expires=Wed, 09 Jun 2100 10:18:14 GMT",
            "https://www.example.com/login",
        )
        .unwrap();
        assert_eq!(c.name, "sid");
        assert_eq!(c.domain, "example.com");
        assert_eq!(c.path, "/app");
        assert!(c.secure && c.http_only);
        assert_eq!(c.same_site.as_deref(), Some("Lax"));
        assert_eq!(c.expires, Some(at("2100-06-09T10:18:14Z")));

        assert!(Cookie::from_set_cookie_header("sid=abc; Expires=soon", "https://a.test/").is_err());
        assert!(Cookie::from_set_cookie_header("novalue", "https://a.test/").is_err());
    }

    #[test]
    fn test_serde_accepts_cookie_dates() {
        let c: Cookie = serde_json::from_str(
            r#"{"name":"a","value":"1","domain":"example.com","expires":"Sun, 06 Nov 1994 08:49:37 GMT"}"#,
        )
        .unwrap();
        assert_eq!(c.path, "/");
        assert_eq!(c.expires, Some(at("1994-11-06T08:49:37Z")));

        let unix: Cookie = serde_json::from_str(r#"{"name":"a","value":"1","expires":784111777}"#).unwrap();
        assert_eq!(unix.expires, c.expires);

        assert!(serde_json::from_str::<Cookie>(r#"{"name":"a","value":"1","expires":"later"}"#).is_err());
    }

    #[test]
    fn test_jar_roundtrip() {
        let mut jar = CookieJar::new();
        jar.set_cookies(
            "https://example.com/",
            vec![Cookie::new("a", "1", ""), Cookie::new("b", "2", "").with_path("/api")],
        )
        .unwrap();
        assert_eq!(jar.len(), 2);
        assert_eq!(jar.build_cookie_header("https://example.com/api/x").unwrap(), "b=2; a=1");
        assert_eq!(jar.build_cookie_header("https://example.com/").unwrap(), "a=1");
        assert!(jar.build_cookie_header("https://other.test/").is_none());

        let mut gone = Cookie::new("a", "", "example.com");
        gone.max_age = Some(-1);
        jar.store(gone);
        assert_eq!(jar.len(), 1);
        assert!(jar.get("example.com", "a").is_none());
    }

    #[test]
    fn test_jar_store_from_headers() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("a=1; Path=/"));
        headers.append(SET_COOKIE, HeaderValue::from_static("b=2; Expires=garbage"));
        let mut jar = CookieJar::new();
        jar.store_from_headers(&headers, "https://example.com/");
        assert_eq!(jar.len(), 1);
        assert_eq!(jar.get("example.com", "a").unwrap().value, "1");
    }
}
