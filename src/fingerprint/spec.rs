//! ClientHello specification builder.
//!
//! Turns a fingerprint identifier (named profile or raw JA3 string), a
//! user agent, and the force-HTTP/1 flag into the immutable description the
//! handshaker applies. Pure: identical inputs give identical output.

use crate::error::{Error, Result};
use crate::version::{H2_ALPN, HTTP1_ALPN};

use super::ja3::Ja3;
use super::profiles::FingerprintProfile;
use super::tls::{self, ext, CertCompression};
use super::user_agent::{BrowserDescriptor, BrowserFamily};

/// TLS protocol versions as they appear on the wire.
pub const TLS1_2: u16 = 0x0303;
pub const TLS1_3: u16 = 0x0304;

/// Immutable description of the ClientHello to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHelloSpec {
    /// Legacy ClientHello version from the fingerprint (771 = TLS 1.2).
    pub tls_version: u16,
    /// Highest version offered; TLS 1.3 only when supported_versions is present.
    pub max_version: u16,
    pub cipher_suites: Vec<u16>,
    /// Extension ids in the fingerprint's order.
    pub extensions: Vec<u16>,
    pub curves: Vec<u16>,
    pub point_formats: Vec<u8>,
    /// ALPN offer list, most preferred first.
    pub alpn: Vec<String>,
    pub signature_algorithms: Vec<&'static str>,
    pub grease: bool,
    pub permute_extensions: bool,
    pub cert_compression: Vec<CertCompression>,
    /// Browser the user agent claims; drives HTTP/2 shaping as well.
    pub browser: BrowserDescriptor,
}

impl ClientHelloSpec {
    /// Build a specification.
    ///
    /// `fingerprint_id` is resolved as a named profile first, then parsed as
    /// a JA3 string. Anything else fails with `UnknownFingerprint`.
    pub fn build(fingerprint_id: &str, user_agent: &str, force_http1: bool) -> Result<Self> {
        let ja3 = match FingerprintProfile::from_name(fingerprint_id) {
            Some(profile) => Ja3::parse(profile.ja3())
                .map_err(|reason| Error::unknown_fingerprint(fingerprint_id, reason))?,
            None => Ja3::parse(fingerprint_id)
                .map_err(|reason| Error::unknown_fingerprint(fingerprint_id, reason))?,
        };
        Ok(Self::from_ja3(ja3, user_agent, force_http1))
    }

    /// Build from already-parsed JA3 components.
    pub fn from_ja3(ja3: Ja3, user_agent: &str, force_http1: bool) -> Self {
        let browser = BrowserDescriptor::parse(user_agent);
        let family = browser.family;

        let alpn = if !ja3.has_extension(ext::ALPN) {
            Vec::new()
        } else if force_http1 {
            vec![HTTP1_ALPN.to_string()]
        } else {
            vec![H2_ALPN.to_string(), HTTP1_ALPN.to_string()]
        };

        let max_version = if ja3.has_extension(ext::SUPPORTED_VERSIONS) {
            TLS1_3
        } else {
            TLS1_2
        };

        let cert_compression = if ja3.has_extension(ext::COMPRESS_CERTIFICATE) {
            tls::cert_compression(family).to_vec()
        } else {
            Vec::new()
        };

        // Chrome sends GREASE even when the JA3 was captured with it stripped.
        let grease = ja3.had_grease || family == BrowserFamily::Chrome;
        let permute_extensions = family == BrowserFamily::Chrome;

        Self {
            tls_version: ja3.tls_version,
            max_version,
            cipher_suites: ja3.cipher_suites,
            extensions: ja3.extensions,
            curves: ja3.curves,
            point_formats: ja3.point_formats,
            alpn,
            signature_algorithms: tls::signature_algorithms(family).to_vec(),
            grease,
            permute_extensions,
            cert_compression,
            browser,
        }
    }

    pub fn has_extension(&self, id: u16) -> bool {
        self.extensions.contains(&id)
    }

    /// Whether HTTP/2 is in the ALPN offer.
    pub fn offers_h2(&self) -> bool {
        self.alpn.iter().any(|p| p == H2_ALPN)
    }

    /// ALPN offer in wire format (length-prefixed protocol names).
    pub fn alpn_wire(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for proto in &self.alpn {
            out.push(proto.len() as u8);
            out.extend_from_slice(proto.as_bytes());
        }
        out
    }

    /// JA3 components of this spec (GREASE excluded).
    pub fn ja3(&self) -> Ja3 {
        Ja3 {
            tls_version: self.tls_version,
            cipher_suites: self.cipher_suites.clone(),
            extensions: self.extensions.clone(),
            curves: self.curves.clone(),
            point_formats: self.point_formats.clone(),
            had_grease: self.grease,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
    const FIREFOX_UA: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:133.0) Gecko/20100101 Firefox/133.0";

    #[test]
    fn test_named_profile() {
        let spec = ClientHelloSpec::build("chrome_131", CHROME_UA, false).unwrap();
        assert_eq!(spec.alpn, vec!["h2", "http/1.1"]);
        assert!(spec.offers_h2());
        assert!(spec.grease);
        assert!(spec.permute_extensions);
        assert_eq!(spec.max_version, TLS1_3);
        assert_eq!(spec.cert_compression, vec![CertCompression::Brotli]);
        assert_eq!(spec.browser.family, BrowserFamily::Chrome);
    }

    #[test]
    fn test_raw_ja3() {
        let ja3 = "771,49195-49199,0-10-11-16,29-23,0";
        let spec = ClientHelloSpec::build(ja3, FIREFOX_UA, false).unwrap();
        assert_eq!(spec.cipher_suites, vec![49195, 49199]);
        assert_eq!(spec.max_version, TLS1_2);
        assert!(!spec.grease);
        assert!(!spec.permute_extensions);
        assert!(spec.cert_compression.is_empty());
        assert_eq!(spec.ja3().to_string(), ja3);
    }

    #[test]
    fn test_unknown_fingerprint() {
        let err = ClientHelloSpec::build("netscape_4", CHROME_UA, false).unwrap_err();
        assert!(matches!(err, Error::UnknownFingerprint { ref id, .. } if id == "netscape_4"));
    }

    #[test]
    fn test_force_http1_drops_h2() {
        for profile in FingerprintProfile::ALL {
            let spec = ClientHelloSpec::build(profile.name(), profile.user_agent(), true).unwrap();
            assert!(!spec.offers_h2());
            assert_eq!(spec.alpn, vec!["http/1.1"]);
            assert_eq!(spec.alpn_wire(), b"\x08http/1.1".to_vec());
        }
    }

    #[test]
    fn test_no_alpn_extension_means_no_offer() {
        let spec = ClientHelloSpec::build("771,49195,0-10-11,29,0", CHROME_UA, false).unwrap();
        assert!(spec.alpn.is_empty());
        assert!(spec.alpn_wire().is_empty());
    }

    #[test]
    fn test_deterministic() {
        let a = ClientHelloSpec::build("firefox_133", FIREFOX_UA, false).unwrap();
        let b = ClientHelloSpec::build("firefox_133", FIREFOX_UA, false).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.alpn_wire(), b"\x02h2\x08http/1.1".to_vec());
    }
}
