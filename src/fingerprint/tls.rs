//! TLS name tables: IANA ids to BoringSSL names, plus per-family presets
//! for ClientHello fields that JA3 does not capture.

use super::user_agent::BrowserFamily;

/// TLS extension ids referenced by the spec builder and handshaker.
pub mod ext {
    pub const SERVER_NAME: u16 = 0;
    pub const STATUS_REQUEST: u16 = 5;
    pub const SUPPORTED_GROUPS: u16 = 10;
    pub const EC_POINT_FORMATS: u16 = 11;
    pub const SIGNATURE_ALGORITHMS: u16 = 13;
    pub const ALPN: u16 = 16;
    pub const SIGNED_CERT_TIMESTAMP: u16 = 18;
    pub const COMPRESS_CERTIFICATE: u16 = 27;
    pub const SESSION_TICKET: u16 = 35;
    pub const SUPPORTED_VERSIONS: u16 = 43;
    pub const RENEGOTIATION_INFO: u16 = 65281;
}

/// TLS 1.3 suites. BoringSSL always offers these and does not let the
/// cipher list reorder them.
pub const TLS13_CIPHER_SUITES: &[u16] = &[0x1301, 0x1302, 0x1303];

/// BoringSSL cipher name for an IANA cipher suite id (TLS 1.2 and below).
pub fn cipher_name(id: u16) -> Option<&'static str> {
    let name = match id {
        0xc02b => "ECDHE-ECDSA-AES128-GCM-SHA256",
        0xc02f => "ECDHE-RSA-AES128-GCM-SHA256",
        0xc02c => "ECDHE-ECDSA-AES256-GCM-SHA384",
        0xc030 => "ECDHE-RSA-AES256-GCM-SHA384",
        0xcca9 => "ECDHE-ECDSA-CHACHA20-POLY1305",
        0xcca8 => "ECDHE-RSA-CHACHA20-POLY1305",
        0xc009 => "ECDHE-ECDSA-AES128-SHA",
        0xc00a => "ECDHE-ECDSA-AES256-SHA",
        0xc013 => "ECDHE-RSA-AES128-SHA",
        0xc014 => "ECDHE-RSA-AES256-SHA",
        0xc023 => "ECDHE-ECDSA-AES128-SHA256",
        0xc027 => "ECDHE-RSA-AES128-SHA256",
        0x009c => "AES128-GCM-SHA256",
        0x009d => "AES256-GCM-SHA384",
        0x002f => "AES128-SHA",
        0x0035 => "AES256-SHA",
        0x003c => "AES128-SHA256",
        0x000a => "DES-CBC3-SHA",
        _ => return None,
    };
    Some(name)
}

/// BoringSSL group name for an IANA named-group id.
pub fn curve_name(id: u16) -> Option<&'static str> {
    let name = match id {
        29 => "X25519",
        23 => "P-256",
        24 => "P-384",
        25 => "P-521",
        4588 => "X25519MLKEM768",
        25497 => "X25519Kyber768Draft00",
        _ => return None,
    };
    Some(name)
}

/// Post-quantum hybrid groups; older BoringSSL builds may reject them.
pub fn is_post_quantum_curve(id: u16) -> bool {
    matches!(id, 4588 | 25497)
}

/// Chrome signature algorithms.
pub const CHROME_SIGNATURE_ALGORITHMS: &[&str] = &[
    "ecdsa_secp256r1_sha256",
    "rsa_pss_rsae_sha256",
    "rsa_pkcs1_sha256",
    "ecdsa_secp384r1_sha384",
    "rsa_pss_rsae_sha384",
    "rsa_pkcs1_sha384",
    "rsa_pss_rsae_sha512",
    "rsa_pkcs1_sha512",
];

/// Firefox signature algorithms.
pub const FIREFOX_SIGNATURE_ALGORITHMS: &[&str] = &[
    "ecdsa_secp256r1_sha256",
    "ecdsa_secp384r1_sha384",
    "ecdsa_secp521r1_sha512",
    "rsa_pss_rsae_sha256",
    "rsa_pss_rsae_sha384",
    "rsa_pss_rsae_sha512",
    "rsa_pkcs1_sha256",
    "rsa_pkcs1_sha384",
    "rsa_pkcs1_sha512",
    "ecdsa_sha1",
    "rsa_pkcs1_sha1",
];

/// Safari signature algorithms.
pub const SAFARI_SIGNATURE_ALGORITHMS: &[&str] = &[
    "ecdsa_secp256r1_sha256",
    "rsa_pss_rsae_sha256",
    "rsa_pkcs1_sha256",
    "ecdsa_secp384r1_sha384",
    "ecdsa_sha1",
    "rsa_pss_rsae_sha384",
    "rsa_pkcs1_sha384",
    "rsa_pss_rsae_sha512",
    "rsa_pkcs1_sha512",
    "rsa_pkcs1_sha1",
];

/// Signature algorithms offered by `family`.
pub fn signature_algorithms(family: BrowserFamily) -> &'static [&'static str] {
    match family {
        BrowserFamily::Firefox => FIREFOX_SIGNATURE_ALGORITHMS,
        BrowserFamily::Safari => SAFARI_SIGNATURE_ALGORITHMS,
        BrowserFamily::Chrome | BrowserFamily::Other => CHROME_SIGNATURE_ALGORITHMS,
    }
}

/// Certificate compression algorithm advertised in compress_certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertCompression {
    Brotli,
    Zlib,
}

/// Certificate compression algorithms for `family`, used only when the
/// fingerprint carries the compress_certificate extension.
pub fn cert_compression(family: BrowserFamily) -> &'static [CertCompression] {
    match family {
        BrowserFamily::Firefox => &[CertCompression::Zlib, CertCompression::Brotli],
        BrowserFamily::Safari => &[CertCompression::Zlib],
        BrowserFamily::Chrome | BrowserFamily::Other => &[CertCompression::Brotli],
    }
}
