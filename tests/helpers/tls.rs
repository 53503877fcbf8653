use boring::pkey::PKey;
use boring::ssl::{select_next_proto, AlpnError, SslAcceptor, SslAcceptorBuilder, SslMethod};
use boring::x509::X509;

/// Self-signed certificate for 127.0.0.1/localhost: acceptor builder plus
/// the PEM certificate, which doubles as its own CA.
pub fn generate_cert_bundle() -> (SslAcceptorBuilder, Vec<u8>) {
    let cert = rcgen::generate_simple_self_signed(vec![
        "127.0.0.1".to_string(),
        "localhost".to_string(),
    ])
    .expect("generate cert");
    let cert_pem = cert.cert.pem();
    let key_pem = cert.signing_key.serialize_pem();

    let pkey = PKey::private_key_from_pem(key_pem.as_bytes()).expect("parse key");
    let x509 = X509::from_pem(cert_pem.as_bytes()).expect("parse cert");

    let mut builder = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls()).expect("acceptor");
    builder.set_private_key(&pkey).expect("set key");
    builder.set_certificate(&x509).expect("set cert");
    (builder, cert_pem.into_bytes())
}

/// Acceptor that picks from `server_protos` (ALPN wire format) in server
/// preference order, and its CA certificate.
pub fn acceptor_with_alpn(server_protos: &'static [u8]) -> (SslAcceptor, Vec<u8>) {
    let (mut builder, ca) = generate_cert_bundle();
    builder.set_alpn_select_callback(move |_, client_protos| {
        select_next_proto(server_protos, client_protos).ok_or(AlpnError::NOACK)
    });
    (builder.build(), ca)
}
