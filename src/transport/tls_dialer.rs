//! Spoofing dialer and protocol negotiation.
//!
//! The application protocol is only known after the handshake (ALPN), but
//! the transport that will carry requests has to be chosen before it can
//! dial. Negotiation therefore runs in two steps:
//!
//! 1. `negotiate(addr)` dials and handshakes once, picks a transport from
//!    the ALPN result, caches the transport, and stashes the handshaken
//!    connection in the connection cache.
//! 2. The transport's dial hook (`connect`) adopts the stashed connection on
//!    first use and performs fresh spoofed handshakes afterwards.

use std::sync::{Arc, Weak};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::fingerprint::http2::{header_order, Http2Settings};
use crate::fingerprint::ClientHelloSpec;
use crate::timeouts::{with_timeout, Timeouts};
use crate::transport::addr::split_host;
use crate::transport::cache::{ConnectionCache, NegotiationLocks, TransportCache};
use crate::transport::conn::Connection;
use crate::transport::dialer::Dialer;
use crate::transport::h1::Http1Transport;
use crate::transport::h2::Http2Transport;
use crate::transport::handshake::Handshaker;
use crate::transport::{DialHook, Transport};
use crate::version::AlpnProtocol;

/// Result of a locked dial.
#[derive(Debug)]
pub enum DialOutcome {
    /// A usable connection: either one stashed by an earlier negotiation or
    /// a fresh handshake for a destination whose transport already exists.
    Connection(Connection),
    /// A transport was selected and cached; the handshaken connection waits
    /// in the connection cache for that transport.
    Negotiated,
}

/// Per-dialer behavior shared by every destination.
#[derive(Debug, Clone, Default)]
pub struct DialOptions {
    /// Skip certificate and hostname verification.
    pub insecure: bool,
    /// Reuse HTTP/1.1 connections between requests.
    pub keep_alive: bool,
    pub timeouts: Timeouts,
}

/// Dials, handshakes with the spoofed ClientHello, and owns the
/// per-destination connection and transport caches.
pub struct TlsDialer {
    dialer: Arc<dyn Dialer>,
    handshaker: Arc<dyn Handshaker>,
    spec: ClientHelloSpec,
    options: DialOptions,
    connections: ConnectionCache,
    transports: TransportCache,
    locks: NegotiationLocks,
    // Handed to transports' dial hooks; a strong reference would cycle
    // through the transport cache.
    weak_self: Weak<TlsDialer>,
}

impl TlsDialer {
    pub fn new(
        dialer: Arc<dyn Dialer>,
        handshaker: Arc<dyn Handshaker>,
        spec: ClientHelloSpec,
        options: DialOptions,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            dialer,
            handshaker,
            spec,
            options,
            connections: ConnectionCache::new(),
            transports: TransportCache::new(),
            locks: NegotiationLocks::new(),
            weak_self: weak_self.clone(),
        })
    }

    pub fn spec(&self) -> &ClientHelloSpec {
        &self.spec
    }

    /// Dial `addr` under its negotiation lock.
    ///
    /// Returns a stashed connection when one exists. Otherwise handshakes;
    /// if a transport is already cached the fresh connection is returned,
    /// else the Protocol Selector runs and `Negotiated` is returned.
    pub async fn dial(&self, addr: &str) -> Result<DialOutcome> {
        let _guard = self.locks.acquire(addr).await;
        self.dial_locked(addr).await
    }

    async fn dial_locked(&self, addr: &str) -> Result<DialOutcome> {
        if let Some(conn) = self.connections.take(addr) {
            tracing::trace!("reusing stashed connection for {}", addr);
            return Ok(DialOutcome::Connection(conn));
        }

        let conn = self.handshake(addr).await?;
        if self.transports.get(addr).is_some() {
            return Ok(DialOutcome::Connection(conn));
        }

        let transport = self.select_transport(addr, conn.protocol());
        if let Some(displaced) = self.connections.insert(addr, conn) {
            displaced.close().await;
        }
        self.transports.get_or_insert(addr, transport);
        Ok(DialOutcome::Negotiated)
    }

    /// Transport for `addr`, negotiating it on first use.
    ///
    /// Concurrent first requests to the same destination wait on one
    /// negotiation; other destinations are not blocked.
    pub async fn negotiate(&self, addr: &str) -> Result<Arc<dyn Transport>> {
        if let Some(transport) = self.transports.get(addr) {
            return Ok(transport);
        }

        let _guard = self.locks.acquire(addr).await;
        if let Some(transport) = self.transports.get(addr) {
            return Ok(transport);
        }

        tracing::debug!("negotiating protocol for {}", addr);
        match self.dial_locked(addr).await? {
            DialOutcome::Negotiated => match self.transports.get(addr) {
                Some(transport) => Ok(transport),
                None => panic!("negotiation for {} reported success without caching a transport", addr),
            },
            DialOutcome::Connection(_) => {
                panic!("negotiation for {} produced a connection without selecting a transport", addr)
            }
        }
    }

    /// Connection for a transport's dial hook: the stashed negotiation
    /// connection if still unclaimed, else a fresh spoofed handshake.
    pub async fn connect(&self, addr: &str) -> Result<Connection> {
        if let Some(conn) = self.connections.take(addr) {
            tracing::trace!("transport for {} adopted negotiated connection", addr);
            return Ok(conn);
        }
        self.handshake(addr).await
    }

    /// Dial plus spoofed handshake, bounded by the connect timeout.
    async fn handshake(&self, addr: &str) -> Result<Connection> {
        with_timeout(self.options.timeouts.connect, Error::ConnectTimeout, async {
            let io = self.dialer.dial("tcp", addr).await?;
            let server_name = split_host(addr);
            tracing::debug!("TLS handshake with {} (SNI {})", addr, server_name);
            self.handshaker
                .handshake(io, server_name, &self.spec, self.options.insecure)
                .await
        })
        .await
    }

    /// Protocol Selector: `h2` gets an HTTP/2 transport, anything else
    /// (including no ALPN at all) an HTTP/1.1 transport. A ClientHello that
    /// never offered `h2` always gets HTTP/1.1, whatever the peer echoed.
    pub fn select_transport(&self, addr: &str, protocol: AlpnProtocol) -> Arc<dyn Transport> {
        let hook: Arc<dyn DialHook> = Arc::new(TlsHook {
            dialer: self.weak_self.clone(),
        });
        let ttfb = self.options.timeouts.ttfb;

        if protocol.is_h2() && self.spec.offers_h2() {
            let family = self.spec.browser.family;
            tracing::debug!("selected HTTP/2 transport for {} ({})", addr, family.as_str());
            Arc::new(Http2Transport::new(
                addr,
                hook,
                Http2Settings::for_family(family),
                header_order(family),
                ttfb,
            ))
        } else {
            tracing::debug!("selected HTTP/1.1 transport for {} (ALPN {:?})", addr, protocol);
            Arc::new(Http1Transport::new(addr, hook, self.options.keep_alive, ttfb))
        }
    }

    /// Close and evict every stashed connection. Transports stay cached.
    pub async fn close_idle_connections(&self) {
        let drained = self.connections.drain();
        if !drained.is_empty() {
            tracing::debug!("closing {} idle connection(s)", drained.len());
        }
        for (addr, conn) in drained {
            tracing::trace!("closing idle connection to {}", addr);
            conn.close().await;
        }
    }

    pub fn cached_transport(&self, addr: &str) -> Option<Arc<dyn Transport>> {
        self.transports.get(addr)
    }

    pub fn cached_transport_count(&self) -> usize {
        self.transports.len()
    }

    pub fn cached_connection_count(&self) -> usize {
        self.connections.len()
    }
}

/// Dial hook that re-enters the spoofing dialer.
struct TlsHook {
    dialer: Weak<TlsDialer>,
}

#[async_trait]
impl DialHook for TlsHook {
    async fn connect(&self, addr: &str) -> Result<Connection> {
        let dialer = self
            .dialer
            .upgrade()
            .ok_or_else(|| Error::connection("round tripper dropped"))?;
        dialer.connect(addr).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::fingerprint::FingerprintProfile;
    use crate::transport::conn::BoxedIo;
    use crate::version::HttpVersion;

    struct NullDialer {
        dials: AtomicUsize,
    }

    #[async_trait]
    impl Dialer for NullDialer {
        async fn dial(&self, _network: &str, _addr: &str) -> Result<BoxedIo> {
            self.dials.fetch_add(1, Ordering::SeqCst);
            let (a, _b) = tokio::io::duplex(64);
            Ok(Box::new(a))
        }
    }

    struct FixedAlpn {
        protocol: AlpnProtocol,
        delay: Duration,
        handshakes: AtomicUsize,
    }

    #[async_trait]
    impl Handshaker for FixedAlpn {
        async fn handshake(
            &self,
            io: BoxedIo,
            _server_name: &str,
            _spec: &ClientHelloSpec,
            _insecure: bool,
        ) -> Result<Connection> {
            self.handshakes.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(Connection::new(io, self.protocol))
        }
    }

    fn dialer(protocol: AlpnProtocol, delay: Duration) -> (Arc<TlsDialer>, Arc<NullDialer>, Arc<FixedAlpn>) {
        let raw = Arc::new(NullDialer {
            dials: AtomicUsize::new(0),
        });
        let hs = Arc::new(FixedAlpn {
            protocol,
            delay,
            handshakes: AtomicUsize::new(0),
        });
        let profile = FingerprintProfile::Chrome131;
        let spec = ClientHelloSpec::build(profile.name(), profile.user_agent(), false).unwrap();
        let tls = TlsDialer::new(raw.clone(), hs.clone(), spec, DialOptions::default());
        (tls, raw, hs)
    }

    #[tokio::test]
    async fn test_dial_negotiates_then_returns_stashed() {
        let (tls, raw, _) = dialer(AlpnProtocol::H2, Duration::ZERO);

        assert!(matches!(tls.dial("a.test:443").await.unwrap(), DialOutcome::Negotiated));
        assert_eq!(tls.cached_transport_count(), 1);
        assert_eq!(tls.cached_connection_count(), 1);

        match tls.dial("a.test:443").await.unwrap() {
            DialOutcome::Connection(conn) => assert_eq!(conn.protocol(), AlpnProtocol::H2),
            DialOutcome::Negotiated => panic!("expected the stashed connection"),
        }
        assert_eq!(tls.cached_connection_count(), 0);
        assert_eq!(raw.dials.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dial_with_cached_transport_returns_fresh_connection() {
        let (tls, raw, _) = dialer(AlpnProtocol::Http1, Duration::ZERO);
        tls.negotiate("b.test:443").await.unwrap();
        tls.connect("b.test:443").await.unwrap();

        assert!(matches!(
            tls.dial("b.test:443").await.unwrap(),
            DialOutcome::Connection(_)
        ));
        assert_eq!(tls.cached_connection_count(), 0);
        assert_eq!(raw.dials.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_selector_maps_alpn() {
        let (tls, _, _) = dialer(AlpnProtocol::None, Duration::ZERO);
        assert_eq!(
            tls.select_transport("x:443", AlpnProtocol::H2).version(),
            HttpVersion::Http2
        );
        assert_eq!(
            tls.select_transport("x:443", AlpnProtocol::Http1).version(),
            HttpVersion::Http1_1
        );
        assert_eq!(
            tls.select_transport("x:443", AlpnProtocol::None).version(),
            HttpVersion::Http1_1
        );
    }

    #[tokio::test]
    async fn test_force_http1_ignores_h2_echoed_by_peer() {
        let raw = Arc::new(NullDialer {
            dials: AtomicUsize::new(0),
        });
        let hs = Arc::new(FixedAlpn {
            protocol: AlpnProtocol::H2,
            delay: Duration::ZERO,
            handshakes: AtomicUsize::new(0),
        });
        let spec = ClientHelloSpec::build("chrome_131", "", true).unwrap();
        assert!(!spec.offers_h2());
        let tls = TlsDialer::new(raw, hs, spec, DialOptions::default());

        assert_eq!(
            tls.select_transport("x:443", AlpnProtocol::H2).version(),
            HttpVersion::Http1_1
        );
        let transport = tls.negotiate("x.test:443").await.unwrap();
        assert_eq!(transport.version(), HttpVersion::Http1_1);
    }

    #[tokio::test]
    async fn test_concurrent_negotiation_single_handshake() {
        let (tls, _, hs) = dialer(AlpnProtocol::H2, Duration::from_millis(50));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let tls = tls.clone();
                tokio::spawn(async move { tls.negotiate("a.test:443").await.map(|_| ()) })
            })
            .collect();
        for t in tasks {
            t.await.unwrap().unwrap();
        }

        assert_eq!(hs.handshakes.load(Ordering::SeqCst), 1);
        assert_eq!(tls.cached_transport_count(), 1);
    }

    #[tokio::test]
    async fn test_connect_timeout_leaves_caches_empty() {
        let raw = Arc::new(NullDialer {
            dials: AtomicUsize::new(0),
        });
        let hs = Arc::new(FixedAlpn {
            protocol: AlpnProtocol::H2,
            delay: Duration::from_secs(5),
            handshakes: AtomicUsize::new(0),
        });
        let spec = ClientHelloSpec::build("chrome_131", "", false).unwrap();
        let options = DialOptions {
            timeouts: Timeouts::new().connect(Duration::from_millis(20)),
            ..Default::default()
        };
        let tls = TlsDialer::new(raw, hs, spec, options);

        let err = tls.negotiate("slow.test:443").await.err().unwrap();
        assert!(matches!(err, Error::ConnectTimeout(_)));
        assert_eq!(tls.cached_transport_count(), 0);
        assert_eq!(tls.cached_connection_count(), 0);
    }

    #[tokio::test]
    async fn test_negotiation_locks_released_after_use() {
        let (tls, _, _) = dialer(AlpnProtocol::H2, Duration::ZERO);
        for i in 0..4 {
            tls.negotiate(&format!("host{}.test:443", i)).await.unwrap();
        }
        tls.dial("host0.test:443").await.unwrap();
        assert!(tls.locks.is_empty());

        let raw = Arc::new(NullDialer {
            dials: AtomicUsize::new(0),
        });
        let hs = Arc::new(FixedAlpn {
            protocol: AlpnProtocol::H2,
            delay: Duration::from_secs(5),
            handshakes: AtomicUsize::new(0),
        });
        let spec = ClientHelloSpec::build("chrome_131", "", false).unwrap();
        let options = DialOptions {
            timeouts: Timeouts::new().connect(Duration::from_millis(20)),
            ..Default::default()
        };
        let tls = TlsDialer::new(raw, hs, spec, options);
        assert!(tls.negotiate("slow.test:443").await.is_err());
        assert!(tls.locks.is_empty());
    }

    #[tokio::test]
    async fn test_hook_fails_after_dialer_dropped() {
        let (tls, _, _) = dialer(AlpnProtocol::Http1, Duration::ZERO);
        let hook = TlsHook {
            dialer: Arc::downgrade(&tls),
        };
        drop(tls);
        assert!(matches!(
            hook.connect("a.test:443").await.err().unwrap(),
            Error::Connection(_)
        ));
    }
}
