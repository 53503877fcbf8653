//! User-Agent parsing into a browser descriptor.
//!
//! Only the family and major version matter: they pick the parts of the
//! fingerprint JA3 does not describe (signature algorithms, GREASE, HTTP/2
//! settings and header order).

/// Browser engine family the user agent claims to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BrowserFamily {
    /// Chrome and Chromium derivatives (Edge, Opera, Brave).
    Chrome,
    Firefox,
    Safari,
    #[default]
    Other,
}

impl BrowserFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chrome => "chrome",
            Self::Firefox => "firefox",
            Self::Safari => "safari",
            Self::Other => "other",
        }
    }
}

/// Structured view of a user-agent string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BrowserDescriptor {
    pub family: BrowserFamily,
    pub major_version: Option<u32>,
}

impl BrowserDescriptor {
    /// Parse a user-agent header value.
    pub fn parse(user_agent: &str) -> Self {
        // Order matters: Chromium UAs also contain "Safari/", Edge/Opera contain "Chrome/".
        const CHROMIUM_TOKENS: &[&str] = &["Edg/", "OPR/", "Chrome/", "CriOS/", "Chromium/"];

        for token in CHROMIUM_TOKENS {
            if let Some(version) = version_after(user_agent, token) {
                return Self {
                    family: BrowserFamily::Chrome,
                    major_version: version,
                };
            }
        }

        for token in ["Firefox/", "FxiOS/"] {
            if let Some(version) = version_after(user_agent, token) {
                return Self {
                    family: BrowserFamily::Firefox,
                    major_version: version,
                };
            }
        }

        if user_agent.contains("Safari/") {
            return Self {
                family: BrowserFamily::Safari,
                major_version: version_after(user_agent, "Version/").flatten(),
            };
        }

        Self::default()
    }
}

/// Returns `Some(major)` if `token` occurs, with `major` parsed when possible.
fn version_after(user_agent: &str, token: &str) -> Option<Option<u32>> {
    let start = user_agent.find(token)? + token.len();
    let digits: String = user_agent[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    Some(digits.parse().ok())
}
