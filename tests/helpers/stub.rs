//! Dialer and handshaker doubles that skip DNS and TLS.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;

use guise::fingerprint::ClientHelloSpec;
use guise::transport::{BoxedIo, Connection, Dialer, Handshaker};
use guise::version::AlpnProtocol;
use guise::{Error, Result};

/// Connects every dial to one local address, recording what was asked for.
pub struct LoopbackDialer {
    target: SocketAddr,
    dials: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl LoopbackDialer {
    pub fn new(target: SocketAddr) -> Self {
        Self {
            target,
            dials: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl Dialer for LoopbackDialer {
    async fn dial(&self, _network: &str, addr: &str) -> Result<BoxedIo> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(addr.to_string());
        let stream = TcpStream::connect(self.target)
            .await
            .map_err(|e| Error::dial(addr, e))?;
        Ok(Box::new(stream))
    }
}

/// Pretends to handshake: waits `delay`, then reports `protocol` as the
/// ALPN result over the untouched stream.
pub struct FakeTlsHandshaker {
    protocol: AlpnProtocol,
    delay: Duration,
    handshakes: AtomicUsize,
    server_names: Mutex<Vec<String>>,
}

impl FakeTlsHandshaker {
    pub fn new(protocol: AlpnProtocol) -> Self {
        Self {
            protocol,
            delay: Duration::ZERO,
            handshakes: AtomicUsize::new(0),
            server_names: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn handshakes(&self) -> usize {
        self.handshakes.load(Ordering::SeqCst)
    }

    pub fn server_names(&self) -> Vec<String> {
        self.server_names.lock().unwrap().clone()
    }
}

#[async_trait]
impl Handshaker for FakeTlsHandshaker {
    async fn handshake(
        &self,
        io: BoxedIo,
        server_name: &str,
        _spec: &ClientHelloSpec,
        _insecure: bool,
    ) -> Result<Connection> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.handshakes.fetch_add(1, Ordering::SeqCst);
        self.server_names.lock().unwrap().push(server_name.to_string());
        Ok(Connection::new(io, self.protocol))
    }
}
