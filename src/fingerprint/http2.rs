//! HTTP/2 fingerprint configuration (SETTINGS frame, window sizes, header order).

use std::time::Duration;

use super::user_agent::BrowserFamily;

/// HTTP/2 SETTINGS for fingerprinting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Http2Settings {
    pub initial_window_size: u32,
    /// Connection-level window (65535 + first WINDOW_UPDATE increment).
    pub initial_connection_window_size: u32,
    pub max_frame_size: u32,
    pub max_header_list_size: u32,
    /// Handshake timeout for waiting on the server preface.
    pub handshake_timeout: Option<Duration>,
}

impl Default for Http2Settings {
    fn default() -> Self {
        Self::chrome()
    }
}

impl Http2Settings {
    /// Chrome: `4:6291456;6:262144`, WINDOW_UPDATE 15663105.
    pub fn chrome() -> Self {
        Self {
            initial_window_size: 6291456,
            initial_connection_window_size: 15728640,
            max_frame_size: 16384,
            max_header_list_size: 262144,
            handshake_timeout: Some(Duration::from_secs(10)),
        }
    }

    /// Firefox: `4:131072;5:16384`, WINDOW_UPDATE 12517377.
    pub fn firefox() -> Self {
        Self {
            initial_window_size: 131072,
            initial_connection_window_size: 12582912,
            max_frame_size: 16384,
            max_header_list_size: 65536,
            handshake_timeout: Some(Duration::from_secs(10)),
        }
    }

    /// Safari: `4:4194304`, WINDOW_UPDATE 10485760.
    pub fn safari() -> Self {
        Self {
            initial_window_size: 4194304,
            initial_connection_window_size: 10551295,
            max_frame_size: 16384,
            max_header_list_size: 65536,
            handshake_timeout: Some(Duration::from_secs(10)),
        }
    }

    pub fn for_family(family: BrowserFamily) -> Self {
        match family {
            BrowserFamily::Firefox => Self::firefox(),
            BrowserFamily::Safari => Self::safari(),
            BrowserFamily::Chrome | BrowserFamily::Other => Self::chrome(),
        }
    }
}

const CHROME_HEADER_ORDER: &[&str] = &[
    "cache-control",
    "sec-ch-ua",
    "sec-ch-ua-mobile",
    "sec-ch-ua-platform",
    "upgrade-insecure-requests",
    "user-agent",
    "content-type",
    "accept",
    "origin",
    "sec-fetch-site",
    "sec-fetch-mode",
    "sec-fetch-user",
    "sec-fetch-dest",
    "referer",
    "accept-encoding",
    "accept-language",
    "cookie",
    "priority",
];

const FIREFOX_HEADER_ORDER: &[&str] = &[
    "user-agent",
    "accept",
    "accept-language",
    "accept-encoding",
    "content-type",
    "origin",
    "referer",
    "cookie",
    "upgrade-insecure-requests",
    "sec-fetch-dest",
    "sec-fetch-mode",
    "sec-fetch-site",
    "sec-fetch-user",
    "priority",
    "te",
];

const SAFARI_HEADER_ORDER: &[&str] = &[
    "content-type",
    "accept",
    "sec-fetch-site",
    "cookie",
    "sec-fetch-dest",
    "accept-language",
    "sec-fetch-mode",
    "user-agent",
    "referer",
    "accept-encoding",
    "origin",
];

/// Regular-header order the browser family emits on HTTP/2.
/// Headers not listed keep their relative order after the listed ones.
pub fn header_order(family: BrowserFamily) -> &'static [&'static str] {
    match family {
        BrowserFamily::Firefox => FIREFOX_HEADER_ORDER,
        BrowserFamily::Safari => SAFARI_HEADER_ORDER,
        BrowserFamily::Chrome | BrowserFamily::Other => CHROME_HEADER_ORDER,
    }
}
