//! TLS and HTTP/2 fingerprinting configuration.

pub mod http2;
pub mod ja3;
pub mod profiles;
pub mod spec;
pub mod tls;
pub mod user_agent;

pub use http2::Http2Settings;
pub use ja3::Ja3;
pub use profiles::FingerprintProfile;
pub use spec::ClientHelloSpec;
pub use tls::CertCompression;
pub use user_agent::{BrowserDescriptor, BrowserFamily};
