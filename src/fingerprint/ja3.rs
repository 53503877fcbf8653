//! JA3 string parsing and hashing.
//!
//! A JA3 string is `version,ciphers,extensions,curves,point_formats` where
//! every list is dash-separated decimal and may be empty, e.g.
//! `771,4865-4866-4867,0-23-65281-10-11,29-23-24,0`.

use std::fmt;

/// GREASE values (RFC 8701). Excluded from JA3 computation.
pub const GREASE_VALUES: &[u16] = &[
    0x0a0a, 0x1a1a, 0x2a2a, 0x3a3a, 0x4a4a, 0x5a5a, 0x6a6a, 0x7a7a, 0x8a8a, 0x9a9a, 0xaaaa, 0xbaba,
    0xcaca, 0xdada, 0xeaea, 0xfafa,
];

/// Check whether a cipher/extension/group id is a GREASE placeholder.
pub fn is_grease(val: u16) -> bool {
    GREASE_VALUES.contains(&val)
}

/// The five JA3 fields, GREASE filtered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ja3 {
    /// ClientHello legacy version (771 = TLS 1.2).
    pub tls_version: u16,
    pub cipher_suites: Vec<u16>,
    /// Extension ids in ClientHello order.
    pub extensions: Vec<u16>,
    pub curves: Vec<u16>,
    pub point_formats: Vec<u8>,
    /// The input carried GREASE values (which were stripped).
    pub had_grease: bool,
}

impl Ja3 {
    /// Parse a JA3 string. Returns a human readable reason on failure.
    pub fn parse(input: &str) -> Result<Self, String> {
        let fields: Vec<&str> = input.trim().split(',').collect();
        if fields.len() != 5 {
            return Err(format!("expected 5 comma-separated fields, got {}", fields.len()));
        }

        let tls_version = fields[0]
            .trim()
            .parse::<u16>()
            .map_err(|e| format!("invalid TLS version '{}': {}", fields[0], e))?;

        let mut had_grease = false;
        let mut parse_list = |field: &str, name: &str| -> Result<Vec<u16>, String> {
            let mut out = Vec::new();
            for part in field.split('-').map(str::trim).filter(|p| !p.is_empty()) {
                let val = part
                    .parse::<u16>()
                    .map_err(|e| format!("invalid {} value '{}': {}", name, part, e))?;
                if is_grease(val) {
                    had_grease = true;
                } else {
                    out.push(val);
                }
            }
            Ok(out)
        };

        let cipher_suites = parse_list(fields[1], "cipher")?;
        let extensions = parse_list(fields[2], "extension")?;
        let curves = parse_list(fields[3], "curve")?;
        let point_formats = parse_list(fields[4], "point format")?
            .into_iter()
            .map(|p| u8::try_from(p).map_err(|_| format!("point format {} out of range", p)))
            .collect::<Result<Vec<u8>, String>>()?;

        if cipher_suites.is_empty() {
            return Err("no cipher suites".into());
        }

        Ok(Self {
            tls_version,
            cipher_suites,
            extensions,
            curves,
            point_formats,
            had_grease,
        })
    }

    /// MD5 of the canonical JA3 string, lowercase hex.
    pub fn hash(&self) -> String {
        format!("{:x}", md5::compute(self.to_string().as_bytes()))
    }

    pub fn has_extension(&self, id: u16) -> bool {
        self.extensions.contains(&id)
    }
}

fn join<T: ToString>(vals: &[T]) -> String {
    vals.iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("-")
}

impl fmt::Display for Ja3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{}",
            self.tls_version,
            join(&self.cipher_suites),
            join(&self.extensions),
            join(&self.curves),
            join(&self.point_formats)
        )
    }
}
