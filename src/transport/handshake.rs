//! Spoofed TLS handshake over an already-dialed stream.
//!
//! `BoringHandshaker` turns a `ClientHelloSpec` into a BoringSSL context:
//! cipher order, groups, signature algorithms, ALPN, GREASE, extension
//! permutation, and certificate compression all come from the spec.

use std::io::{self, Read};
use std::os::raw::c_int;
use std::sync::Mutex;

use async_trait::async_trait;
use boring::ssl::{
    SslConnector, SslConnectorBuilder, SslMethod, SslOptions, SslSessionCacheMode, SslVerifyMode,
    SslVersion,
};
use boring::x509::X509;
use boring_sys::{CRYPTO_BUFFER, SSL, SSL_CTX};

use crate::error::{Error, Result};
use crate::fingerprint::spec::TLS1_3;
use crate::fingerprint::tls::{self, ext, CertCompression};
use crate::fingerprint::ClientHelloSpec;
use crate::transport::conn::{BoxedIo, Connection};
use crate::version::AlpnProtocol;

extern "C" {
    fn SSL_CTX_set_grease_enabled(ctx: *mut SSL_CTX, enabled: c_int) -> c_int;
    fn SSL_CTX_set_permute_extensions(ctx: *mut SSL_CTX, enabled: c_int) -> c_int;
}

/// Runs the client side of a TLS handshake shaped by a `ClientHelloSpec`.
#[async_trait]
pub trait Handshaker: Send + Sync {
    /// Handshake over `io`, sending SNI `server_name`.
    ///
    /// The returned connection carries the ALPN protocol the server chose.
    async fn handshake(
        &self,
        io: BoxedIo,
        server_name: &str,
        spec: &ClientHelloSpec,
        insecure: bool,
    ) -> Result<Connection>;
}

/// Copy `data` into a CRYPTO_BUFFER for BoringSSL.
unsafe fn emit_cert_buffer(out: *mut *mut CRYPTO_BUFFER, data: &[u8]) -> c_int {
    let buffer = boring_sys::CRYPTO_BUFFER_new(data.as_ptr(), data.len(), std::ptr::null_mut());
    if buffer.is_null() {
        return 0;
    }
    *out = buffer;
    1
}

unsafe extern "C" fn decompress_brotli_cert(
    _ssl: *mut SSL,
    out: *mut *mut CRYPTO_BUFFER,
    uncompressed_len: usize,
    in_: *const u8,
    in_len: usize,
) -> c_int {
    let compressed = std::slice::from_raw_parts(in_, in_len);
    let mut decompressed = Vec::with_capacity(uncompressed_len);
    let mut decoder = brotli::Decompressor::new(compressed, uncompressed_len.max(1));
    match decoder.read_to_end(&mut decompressed) {
        Ok(_) if decompressed.len() == uncompressed_len => emit_cert_buffer(out, &decompressed),
        _ => 0,
    }
}

unsafe extern "C" fn decompress_zlib_cert(
    _ssl: *mut SSL,
    out: *mut *mut CRYPTO_BUFFER,
    uncompressed_len: usize,
    in_: *const u8,
    in_len: usize,
) -> c_int {
    let compressed = std::slice::from_raw_parts(in_, in_len);
    let mut decompressed = Vec::with_capacity(uncompressed_len);
    let mut decoder = flate2::read::ZlibDecoder::new(compressed);
    match decoder.read_to_end(&mut decompressed) {
        Ok(_) if decompressed.len() == uncompressed_len => emit_cert_buffer(out, &decompressed),
        _ => 0,
    }
}

struct CachedConnector {
    spec: ClientHelloSpec,
    insecure: bool,
    connector: SslConnector,
}

/// BoringSSL handshaker.
#[derive(Default)]
pub struct BoringHandshaker {
    root_certs: Vec<Vec<u8>>,
    // Last built context; one round tripper uses one spec, so this hits.
    cached: Mutex<Option<CachedConnector>>,
}

impl BoringHandshaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trust extra root certificates (DER or PEM).
    pub fn with_root_certificates(mut self, certs: Vec<Vec<u8>>) -> Self {
        self.root_certs = certs;
        self
    }

    fn connector(&self, spec: &ClientHelloSpec, insecure: bool) -> Result<SslConnector> {
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| Error::tls("TLS context cache poisoned"))?;
        if let Some(c) = cached.as_ref() {
            if c.insecure == insecure && c.spec == *spec {
                return Ok(c.connector.clone());
            }
        }
        let connector = self.build_connector(spec, insecure)?;
        *cached = Some(CachedConnector {
            spec: spec.clone(),
            insecure,
            connector: connector.clone(),
        });
        Ok(connector)
    }

    /// Extension order, point formats and the JA3 version field are left to
    /// BoringSSL; the extension list only toggles features.
    fn build_connector(&self, spec: &ClientHelloSpec, insecure: bool) -> Result<SslConnector> {
        let mut builder = SslConnector::builder(SslMethod::tls_client())
            .map_err(|e| Error::tls(format!("Failed to create SSL connector: {}", e)))?;

        for cert_bytes in &self.root_certs {
            let cert = X509::from_der(cert_bytes).or_else(|_| X509::from_pem(cert_bytes));
            match cert {
                Ok(cert) => {
                    if let Err(e) = builder.cert_store_mut().add_cert(cert) {
                        tracing::warn!("failed to add root certificate: {}", e);
                    }
                }
                Err(e) => tracing::warn!("ignoring unparseable root certificate: {}", e),
            }
        }

        if insecure {
            builder.set_verify(SslVerifyMode::NONE);
        }

        let ciphers: Vec<&str> = spec
            .cipher_suites
            .iter()
            .filter(|id| !tls::TLS13_CIPHER_SUITES.contains(id))
            .filter_map(|id| tls::cipher_name(*id))
            .collect();
        if !ciphers.is_empty() {
            builder
                .set_cipher_list(&ciphers.join(":"))
                .map_err(|e| Error::tls(format!("Failed to set cipher list: {}", e)))?;
        }

        set_curves(&mut builder, &spec.curves)?;

        if !spec.signature_algorithms.is_empty() {
            builder
                .set_sigalgs_list(&spec.signature_algorithms.join(":"))
                .map_err(|e| Error::tls(format!("Failed to set signature algorithms: {}", e)))?;
        }

        unsafe {
            let ctx = builder.as_ptr() as *mut SSL_CTX;
            SSL_CTX_set_grease_enabled(ctx, spec.grease as c_int);
            SSL_CTX_set_permute_extensions(ctx, spec.permute_extensions as c_int);

            // Decompression only; a client never compresses its own chain.
            for alg in &spec.cert_compression {
                match alg {
                    CertCompression::Brotli => {
                        boring_sys::SSL_CTX_add_cert_compression_alg(
                            ctx,
                            boring_sys::TLSEXT_cert_compression_brotli as u16,
                            None,
                            Some(decompress_brotli_cert),
                        );
                    }
                    CertCompression::Zlib => {
                        boring_sys::SSL_CTX_add_cert_compression_alg(
                            ctx,
                            boring_sys::TLSEXT_cert_compression_zlib as u16,
                            None,
                            Some(decompress_zlib_cert),
                        );
                    }
                }
            }
        }

        if spec.has_extension(ext::STATUS_REQUEST) {
            builder.enable_ocsp_stapling();
        }
        if spec.has_extension(ext::SIGNED_CERT_TIMESTAMP) {
            builder.enable_signed_cert_timestamps();
        }
        if !spec.has_extension(ext::SESSION_TICKET) {
            builder.set_options(SslOptions::NO_TICKET);
        }

        let max_version = if spec.max_version >= TLS1_3 {
            SslVersion::TLS1_3
        } else {
            SslVersion::TLS1_2
        };
        builder
            .set_min_proto_version(Some(SslVersion::TLS1_2))
            .map_err(|e| Error::tls(format!("Failed to set min TLS version: {}", e)))?;
        builder
            .set_max_proto_version(Some(max_version))
            .map_err(|e| Error::tls(format!("Failed to set max TLS version: {}", e)))?;

        builder.set_session_cache_mode(SslSessionCacheMode::CLIENT);

        if !spec.alpn.is_empty() {
            builder
                .set_alpn_protos(&spec.alpn_wire())
                .map_err(|e| Error::tls(format!("Failed to set ALPN: {}", e)))?;
        }

        Ok(builder.build())
    }
}

/// Apply the fingerprint's groups. Post-quantum hybrids are dropped if this
/// BoringSSL build rejects them.
fn set_curves(builder: &mut SslConnectorBuilder, curves: &[u16]) -> Result<()> {
    let names: Vec<&str> = curves.iter().filter_map(|id| tls::curve_name(*id)).collect();
    if names.is_empty() {
        return Ok(());
    }
    if builder.set_curves_list(&names.join(":")).is_ok() {
        return Ok(());
    }

    let classic: Vec<&str> = curves
        .iter()
        .filter(|id| !tls::is_post_quantum_curve(**id))
        .filter_map(|id| tls::curve_name(*id))
        .collect();
    tracing::debug!("groups {:?} rejected, falling back to {:?}", names, classic);
    if classic.is_empty() {
        return Ok(());
    }
    builder
        .set_curves_list(&classic.join(":"))
        .map_err(|e| Error::tls(format!("Failed to set curves: {}", e)))
}

#[async_trait]
impl Handshaker for BoringHandshaker {
    async fn handshake(
        &self,
        io: BoxedIo,
        server_name: &str,
        spec: &ClientHelloSpec,
        insecure: bool,
    ) -> Result<Connection> {
        let connector = self.connector(spec, insecure)?;
        let mut config = connector
            .configure()
            .map_err(|e| Error::tls(format!("Failed to configure SSL: {}", e)))?;
        if insecure {
            config.set_verify_hostname(false);
        }

        let stream = tokio_boring::connect(config, server_name, io)
            .await
            .map_err(handshake_error)?;

        let protocol = AlpnProtocol::from_selected(stream.ssl().selected_alpn_protocol());
        tracing::debug!(
            "TLS handshake with {} complete, ALPN {:?}",
            server_name,
            protocol
        );
        Ok(Connection::new(Box::new(stream), protocol))
    }
}

/// Keep the BoringSSL error stack (or the I/O error) as the failure's source.
fn handshake_error<S>(e: tokio_boring::HandshakeError<S>) -> Error {
    if let Some(stack) = e.as_ssl_error_stack() {
        return Error::handshake(stack);
    }
    if let Some(cause) = e.as_io_error() {
        return Error::handshake(io::Error::new(cause.kind(), cause.to_string()));
    }
    Error::handshake_msg(e.to_string())
}
