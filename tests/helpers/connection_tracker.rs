use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Counts accepted connections, served requests and closed connections on
/// a mock server.
#[derive(Clone, Default)]
pub struct ConnectionTracker {
    peers: Arc<Mutex<Vec<SocketAddr>>>,
    requests: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_connection(&self, peer: SocketAddr) {
        self.peers.lock().unwrap().push(peer);
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }

    /// Number of TCP connections accepted so far.
    pub fn connection_count(&self) -> usize {
        self.peers.lock().unwrap().len()
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Called once the server side of a connection has finished.
    pub fn record_close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn closed_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Wait until `n` connections have closed, or `timeout` elapses.
    pub async fn wait_for_closed(&self, n: usize, timeout: std::time::Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.closed_count() < n {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        true
    }
}
