//! Browser fingerprint profiles.

/// Named fingerprint template for impersonation.
///
/// Note: Chrome randomizes TLS extension order since v110. The JA3 strings
/// here record the canonical order; the handshaker enables permutation for
/// Chrome user agents the same way the browser does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FingerprintProfile {
    /// Chrome 131 on macOS.
    #[default]
    Chrome131,
    /// Chrome 120 on Windows.
    Chrome120,
    /// Firefox 133 on Linux.
    Firefox133,
    /// Safari 17 on macOS.
    Safari17,
}

impl FingerprintProfile {
    pub const ALL: &'static [FingerprintProfile] = &[
        Self::Chrome131,
        Self::Chrome120,
        Self::Firefox133,
        Self::Safari17,
    ];

    /// Canonical identifier, e.g. `chrome_131`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Chrome131 => "chrome_131",
            Self::Chrome120 => "chrome_120",
            Self::Firefox133 => "firefox_133",
            Self::Safari17 => "safari_17",
        }
    }

    /// Resolve an identifier. Case-insensitive; `-` and `_` are interchangeable.
    pub fn from_name(id: &str) -> Option<Self> {
        let normalized = id.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL.iter().copied().find(|p| p.name() == normalized)
    }

    /// JA3 string of the browser's ClientHello.
    pub fn ja3(&self) -> &'static str {
        match self {
            Self::Chrome131 => {
                "771,4865-4866-4867-49195-49199-49196-49200-52393-52392-49171-49172-156-157-47-53,0-23-65281-10-11-35-16-5-13-18-51-45-43-27-21,29-23-24,0"
            }
            Self::Chrome120 => {
                "771,4865-4866-4867-49195-49199-49196-49200-52393-52392-49171-49172-156-157-47-53,0-23-65281-10-11-35-16-5-13-18-51-45-43-27-17513,29-23-24,0"
            }
            Self::Firefox133 => {
                "771,4865-4867-4866-49195-49199-52393-52392-49196-49200-49162-49161-49171-49172-156-157-47-53,0-23-65281-10-11-35-16-5-34-51-43-13-45-28-27,29-23-24-25-256-257,0"
            }
            Self::Safari17 => {
                "771,4865-4866-4867-49196-49195-52393-49200-49199-52392-49162-49161-49172-49171-157-156-53-47-49160-49170-10,0-23-65281-10-11-16-5-13-18-51-45-43-27-21,29-23-24-25,0"
            }
        }
    }

    /// User-Agent string shipped with this profile.
    pub fn user_agent(&self) -> &'static str {
        match self {
            Self::Chrome131 => {
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36"
            }
            Self::Chrome120 => {
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
            }
            Self::Firefox133 => {
                "Mozilla/5.0 (X11; Linux x86_64; rv:133.0) Gecko/20100101 Firefox/133.0"
            }
            Self::Safari17 => {
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_2) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15"
            }
        }
    }
}
