//! Per-destination caches.
//!
//! Keys are canonical `host:port` strings from `addr::destination_addr`.
//! Critical sections are plain map operations; no lock here is held across
//! I/O.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::transport::conn::Connection;
use crate::transport::Transport;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic mid-insert leaves the map itself consistent.
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handshaken connections awaiting adoption by a transport.
///
/// Each entry is consumed at most once: `take` removes it.
#[derive(Default)]
pub struct ConnectionCache {
    entries: Mutex<HashMap<String, Connection>>,
}

impl ConnectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stash `conn` for `addr`. A connection already stashed is returned so
    /// the caller can close it.
    pub fn insert(&self, addr: &str, conn: Connection) -> Option<Connection> {
        lock(&self.entries).insert(addr.to_string(), conn)
    }

    /// Remove and return the stashed connection for `addr`.
    pub fn take(&self, addr: &str) -> Option<Connection> {
        lock(&self.entries).remove(addr)
    }

    pub fn contains(&self, addr: &str) -> bool {
        lock(&self.entries).contains_key(addr)
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empty the cache, handing every entry to the caller.
    pub fn drain(&self) -> Vec<(String, Connection)> {
        lock(&self.entries).drain().collect()
    }
}

/// Transport per destination. Entries are only ever added.
#[derive(Default)]
pub struct TransportCache {
    entries: Mutex<HashMap<String, Arc<dyn Transport>>>,
}

impl TransportCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, addr: &str) -> Option<Arc<dyn Transport>> {
        lock(&self.entries).get(addr).cloned()
    }

    /// Insert unless present; returns whichever transport is cached afterwards.
    pub fn get_or_insert(&self, addr: &str, transport: Arc<dyn Transport>) -> Arc<dyn Transport> {
        lock(&self.entries)
            .entry(addr.to_string())
            .or_insert(transport)
            .clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One async lock per destination, serializing negotiation for that
/// destination only. An entry lives while some task holds or awaits it.
#[derive(Default)]
pub struct NegotiationLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl NegotiationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the lock on `addr`. Dropping the guard releases it.
    pub async fn acquire(&self, addr: &str) -> NegotiationGuard<'_> {
        let mutex = lock(&self.locks)
            .entry(addr.to_string())
            .or_default()
            .clone();
        let guard = mutex.clone().lock_owned().await;
        NegotiationGuard {
            locks: self,
            addr: addr.to_string(),
            mutex,
            guard: Some(guard),
        }
    }

    /// Number of destinations with a live lock entry.
    pub fn len(&self) -> usize {
        lock(&self.locks).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, addr: &str, mutex: &Arc<tokio::sync::Mutex<()>>) {
        let mut locks = lock(&self.locks);
        // Handles are only cloned under the map lock, so a count of two
        // (map plus `mutex`) means nobody else holds or awaits this entry.
        let unused = locks
            .get(addr)
            .is_some_and(|m| Arc::ptr_eq(m, mutex) && Arc::strong_count(mutex) == 2);
        if unused {
            locks.remove(addr);
        }
    }
}

/// Held negotiation lock for one destination.
pub struct NegotiationGuard<'a> {
    locks: &'a NegotiationLocks,
    addr: String,
    mutex: Arc<tokio::sync::Mutex<()>>,
    guard: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl Drop for NegotiationGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.release(&self.addr, &self.mutex);
    }
}
