//! In-memory coordination store
//!
//! A [`LeaseStore`] backed by process-local maps, for tests and local
//! development. Leases do not expire on a clock; instead [`MemoryStore::sever`]
//! simulates the store side of a lost connection: every keepalive stream
//! closes and every lease-bound entry is dropped.

use super::{KeepAliveAck, KeepAliveStream, LeaseId, LeaseStore};
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory store entry
#[derive(Debug, Clone)]
struct Entry {
    value: String,
    lease: Option<LeaseId>,
}

#[derive(Default)]
struct Inner {
    next_lease: u64,
    /// Granted leases and the keepalive senders draining them
    leases: HashMap<LeaseId, Vec<async_channel::Sender<KeepAliveAck>>>,
    ttls: HashMap<LeaseId, u64>,
    entries: HashMap<String, Entry>,
    fail_puts: u32,
    grant_calls: u64,
    put_calls: u64,
    delete_calls: u64,
}

/// In-memory [`LeaseStore`] implementation
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the current value under `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner.entries.get(key).map(|e| e.value.clone())
    }

    /// List all keys under a `/`-terminated prefix, sorted.
    pub fn keys_under(&self, prefix: &str) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        let mut keys: Vec<String> = inner
            .entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Make the next `put` fail with a store error.
    pub fn fail_next_put(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_puts += 1;
    }

    /// Number of `grant` calls observed so far.
    pub fn grant_calls(&self) -> u64 {
        self.inner.lock().unwrap().grant_calls
    }

    /// Number of `put` calls observed so far.
    pub fn put_calls(&self) -> u64 {
        self.inner.lock().unwrap().put_calls
    }

    /// Number of `delete` calls observed so far.
    pub fn delete_calls(&self) -> u64 {
        self.inner.lock().unwrap().delete_calls
    }

    /// Simulate a severed connection: every keepalive stream closes,
    /// every lease is forgotten, and every lease-bound entry is dropped.
    pub fn sever(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.leases.clear();
        inner.ttls.clear();
        inner.entries.retain(|_, e| e.lease.is_none());
    }
}

#[async_trait]
impl LeaseStore for MemoryStore {
    async fn grant(&self, ttl_seconds: u64) -> Result<LeaseId> {
        let mut inner = self.inner.lock().unwrap();
        inner.grant_calls += 1;
        inner.next_lease += 1;
        let id = LeaseId::new(inner.next_lease);
        inner.leases.insert(id, Vec::new());
        inner.ttls.insert(id, ttl_seconds);
        Ok(id)
    }

    async fn keep_alive(&self, lease: LeaseId) -> Result<KeepAliveStream> {
        let mut inner = self.inner.lock().unwrap();
        let ttl_seconds = *inner
            .ttls
            .get(&lease)
            .ok_or_else(|| Error::Store(format!("lease {lease} not found")))?;
        let (tx, rx) = async_channel::bounded(16);
        // One ack up front; the stream then stays open until sever()
        // drops the sender.
        let _ = tx.try_send(KeepAliveAck {
            lease,
            ttl_seconds,
        });
        inner
            .leases
            .get_mut(&lease)
            .ok_or_else(|| Error::Store(format!("lease {lease} not found")))?
            .push(tx);
        Ok(rx.map(Ok).boxed())
    }

    async fn put(&self, key: &str, value: &str, lease: Option<LeaseId>) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.put_calls += 1;
        if inner.fail_puts > 0 {
            inner.fail_puts -= 1;
            return Err(Error::Store("store unavailable".to_string()));
        }
        if let Some(lease) = lease {
            if !inner.leases.contains_key(&lease) {
                return Err(Error::Store(format!("lease {lease} not found")));
            }
        }
        inner.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                lease,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.delete_calls += 1;
        inner.entries.remove(key);
        Ok(())
    }
}
