//! Serializable browser configuration.
//!
//! ```json
//! {
//!   "fingerprint": "firefox_133",
//!   "cookies": [{ "name": "sid", "value": "abc", "domain": "example.com" }],
//!   "proxy": "socks5://127.0.0.1:1080",
//!   "timeouts": { "connect": 10, "ttfb": 30 }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::client::ClientBuilder;
use crate::cookie::Cookie;
use crate::error::Result;
use crate::fingerprint::FingerprintProfile;
use crate::timeouts::Timeouts;
use crate::transport::RoundTripperBuilder;

/// Everything needed to impersonate one browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Named profile or raw JA3 string.
    pub fingerprint: String,
    /// Overrides the profile's user agent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub cookies: Vec<Cookie>,
    pub insecure: bool,
    pub force_http1: bool,
    pub keep_alive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    pub timeouts: Timeouts,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            fingerprint: FingerprintProfile::default().name().to_string(),
            user_agent: None,
            cookies: Vec::new(),
            insecure: false,
            force_http1: false,
            keep_alive: false,
            proxy: None,
            timeouts: Timeouts::default(),
        }
    }
}

impl BrowserConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Round tripper builder carrying this configuration.
    pub fn round_tripper_builder(&self) -> RoundTripperBuilder {
        let mut builder = RoundTripperBuilder::new()
            .fingerprint(self.fingerprint.clone())
            .cookies(self.cookies.clone())
            .insecure(self.insecure)
            .force_http1(self.force_http1)
            .keep_alive(self.keep_alive)
            .timeouts(self.timeouts.clone());
        if let Some(ua) = &self.user_agent {
            builder = builder.user_agent(ua.clone());
        }
        if let Some(proxy) = &self.proxy {
            builder = builder.proxy(proxy.clone());
        }
        builder
    }

    pub fn client_builder(&self) -> ClientBuilder {
        ClientBuilder::from_config(self.clone())
    }
}
