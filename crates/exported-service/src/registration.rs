//! Registration key layouts
//!
//! Publishing an address means writing one key into the store; how the key
//! is named depends on the store generation. The [`RegistrationStore`]
//! trait keeps the exporter agnostic of the layout, with one
//! implementation per variant.

use crate::error::Result;
use crate::store::{LeaseId, LeaseStore};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Namespace prefix all registrations live under
pub const SERVICE_PREFIX: &str = "/ns/service";

/// Writes and deletes service registrations.
///
/// `publish` returns the key it wrote so the caller can later `withdraw`
/// exactly that registration.
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Write `addr` as the registration of `service`; returns the key.
    async fn publish(&self, service: &str, addr: &str) -> Result<String>;

    /// Delete a previously published registration key.
    async fn withdraw(&self, key: &str) -> Result<()>;
}

/// Lease-keyed layout: `/ns/service/{service}/{lease:016x}`.
///
/// The lease identifier is folded into the key, so independent exporters
/// for the same service never overwrite each other, while re-exports from
/// the same exporter land on the same key and simply overwrite. The write
/// is bound to the lease: when renewal stops, the store removes the entry
/// by itself.
pub struct LeasedRegistration {
    store: Arc<dyn LeaseStore>,
    lease: LeaseId,
}

impl LeasedRegistration {
    /// Layout over `store` for registrations owned by `lease`.
    pub fn new(store: Arc<dyn LeaseStore>, lease: LeaseId) -> Self {
        Self { store, lease }
    }
}

#[async_trait]
impl RegistrationStore for LeasedRegistration {
    async fn publish(&self, service: &str, addr: &str) -> Result<String> {
        let key = format!("{SERVICE_PREFIX}/{service}/{lease}", lease = self.lease);
        self.store.put(&key, addr, Some(self.lease)).await?;
        debug!(%key, addr, "published leased registration");
        Ok(key)
    }

    async fn withdraw(&self, key: &str) -> Result<()> {
        self.store.delete(key).await
    }
}

/// Legacy layout: a unique child name under `/ns/service/{service}`.
///
/// Mirrors stores that allocate child node names themselves. No lease is
/// attached, so entries have no intrinsic auto-expiry and every publish
/// creates a fresh key.
pub struct LegacyRegistration {
    store: Arc<dyn LeaseStore>,
}

impl LegacyRegistration {
    /// Layout over `store` with store-side child naming.
    pub fn new(store: Arc<dyn LeaseStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RegistrationStore for LegacyRegistration {
    async fn publish(&self, service: &str, addr: &str) -> Result<String> {
        let key = format!("{SERVICE_PREFIX}/{service}/{}", Uuid::new_v4());
        self.store.put(&key, addr, None).await?;
        debug!(%key, addr, "published legacy registration");
        Ok(key)
    }

    async fn withdraw(&self, key: &str) -> Result<()> {
        self.store.delete(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    #[smol_potat::test]
    async fn leased_layout_reuses_one_key() {
        let store = Arc::new(MemoryStore::new());
        let lease = store.grant(5).await.unwrap();
        let reg = LeasedRegistration::new(store.clone(), lease);

        let key1 = reg.publish("foo", "127.0.0.1:1000").await.unwrap();
        let key2 = reg.publish("foo", "127.0.0.1:2000").await.unwrap();

        assert_eq!(key1, key2);
        assert_eq!(key1, format!("/ns/service/foo/{lease}"));
        // Second publish overwrote, not errored
        assert_eq!(store.get(&key1), Some("127.0.0.1:2000".to_string()));
    }

    #[smol_potat::test]
    async fn distinct_leases_never_collide() {
        let store = Arc::new(MemoryStore::new());
        let a = LeasedRegistration::new(store.clone(), store.grant(5).await.unwrap());
        let b = LeasedRegistration::new(store.clone(), store.grant(5).await.unwrap());

        let key_a = a.publish("foo", "127.0.0.1:1000").await.unwrap();
        let key_b = b.publish("foo", "127.0.0.1:2000").await.unwrap();

        assert_ne!(key_a, key_b);
        assert_eq!(store.keys_under("/ns/service/foo/").len(), 2);
    }

    #[smol_potat::test]
    async fn legacy_layout_allocates_fresh_keys() {
        let store = Arc::new(MemoryStore::new());
        let reg = LegacyRegistration::new(store.clone());

        let key1 = reg.publish("foo", "127.0.0.1:1000").await.unwrap();
        let key2 = reg.publish("foo", "127.0.0.1:2000").await.unwrap();

        assert_ne!(key1, key2);
        assert!(key1.starts_with("/ns/service/foo/"));
        assert_eq!(store.keys_under("/ns/service/foo/").len(), 2);

        reg.withdraw(&key2).await.unwrap();
        assert_eq!(store.get(&key1), Some("127.0.0.1:1000".to_string()));
        assert_eq!(store.get(&key2), None);
    }
}
