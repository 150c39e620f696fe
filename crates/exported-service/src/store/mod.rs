//! Coordination store capability
//!
//! The TTL-backed key-value store this crate publishes into is an external
//! collaborator. Everything it must provide is captured by the
//! [`LeaseStore`] trait: granting a renewable lease, streaming renewal
//! acknowledgements, and keyed put/delete. Consensus, persistence, and
//! watches stay on the store's side of the seam.

pub mod memory;

use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a granted lease.
///
/// Formats as zero-padded 16-digit hex, which is also how it appears in
/// registration keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeaseId(u64);

impl LeaseId {
    /// Wrap a raw lease number handed out by a store.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for LeaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// One renewal acknowledgement.
///
/// The exporter never interprets these; the type exists so the stream has
/// a shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeepAliveAck {
    /// Lease being renewed
    pub lease: LeaseId,
    /// TTL the store reset the lease to
    pub ttl_seconds: u64,
}

/// Continuous stream of renewal acknowledgements for one lease.
///
/// Must be drained for as long as the lease should stay alive; it ends
/// when the store stops renewing (expiry, connection loss).
pub type KeepAliveStream = BoxStream<'static, Result<KeepAliveAck>>;

/// Capability surface consumed from the coordination store.
///
/// A single store handle may be shared across any number of exporters;
/// each acquires its own lease.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Grant a new lease with the given TTL in seconds.
    async fn grant(&self, ttl_seconds: u64) -> Result<LeaseId>;

    /// Open the renewal acknowledgement stream for a lease.
    ///
    /// The returned stream never blocks the store's renewal machinery;
    /// the caller is responsible for draining it.
    async fn keep_alive(&self, lease: LeaseId) -> Result<KeepAliveStream>;

    /// Write `value` under `key`, optionally bound to a lease so the
    /// entry vanishes when the lease does.
    async fn put(&self, key: &str, value: &str, lease: Option<LeaseId>) -> Result<()>;

    /// Delete a key. Deleting an absent key is an ordinary success.
    async fn delete(&self, key: &str) -> Result<()>;
}
