//! Lease lifecycle
//!
//! One exporter holds exactly one lease for its whole life. Acquisition
//! grants the lease, opens the keepalive stream, and hands the stream to
//! a background drain task; everything published under the lease stays
//! alive for exactly as long as that draining keeps succeeding. The drain
//! task never interprets acknowledgement payloads.

use crate::error::{Error, Result};
use crate::spawn::Spawner;
use crate::store::{KeepAliveStream, LeaseId, LeaseStore};
use futures::future::{AbortHandle, Abortable};
use futures::{FutureExt, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, trace, warn};

/// Smallest accepted lease TTL, in seconds. Shorter leases race the
/// store's keepalive cadence.
pub const MIN_TTL_SECONDS: u64 = 5;

/// A granted lease plus the machinery keeping it renewed.
///
/// Dropping the handle aborts the renewal task; the lease then expires at
/// the store within one TTL, taking its registrations with it.
#[derive(Debug)]
pub struct Lease {
    id: LeaseId,
    lost: Arc<AtomicBool>,
    lost_rx: async_channel::Receiver<()>,
    abort: AbortHandle,
}

impl Lease {
    /// Grant a lease and start draining its keepalive stream.
    ///
    /// `ttl_seconds` below [`MIN_TTL_SECONDS`] is rejected before any
    /// store call. Fails atomically: if the grant or the keepalive setup
    /// fails, no handle is returned and nothing is left running.
    pub async fn acquire(
        store: Arc<dyn LeaseStore>,
        ttl_seconds: u64,
        spawner: Arc<dyn Spawner>,
    ) -> Result<Self> {
        if ttl_seconds < MIN_TTL_SECONDS {
            return Err(Error::TtlTooShort { ttl: ttl_seconds });
        }

        let id = store.grant(ttl_seconds).await?;
        let acks = store.keep_alive(id).await?;

        let lost = Arc::new(AtomicBool::new(false));
        let (lost_tx, lost_rx) = async_channel::bounded(1);
        let (abort, registration) = AbortHandle::new_pair();

        let drain = drain_acks(id, acks, lost.clone(), lost_tx);
        spawner.spawn(Box::pin(Abortable::new(drain, registration).map(|_| ())));

        info!(lease = %id, ttl_seconds, "lease acquired, renewal running");

        Ok(Self {
            id,
            lost,
            lost_rx,
            abort,
        })
    }

    /// The lease identifier. Assigned once, never rotated.
    pub fn id(&self) -> LeaseId {
        self.id
    }

    /// Whether the renewal stream has closed on its own.
    ///
    /// Once true, registrations under this lease are expiring at the
    /// store and new exports through it fail fast.
    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::SeqCst)
    }

    /// Resolve once renewal has stopped, for callers that want to react
    /// to a dying registration instead of polling [`Lease::is_lost`].
    pub async fn lost(&self) {
        // The drain task holds the only sender; the channel closing is
        // the signal.
        let _ = self.lost_rx.recv().await;
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        debug!(lease = %self.id, "lease handle dropped, stopping renewal");
        self.abort.abort();
    }
}

/// Drain the keepalive stream until it ends.
///
/// Ack payloads carry nothing the exporter needs; draining exists so the
/// store's renewal machinery is never blocked on an unread response.
async fn drain_acks(
    id: LeaseId,
    mut acks: KeepAliveStream,
    lost: Arc<AtomicBool>,
    lost_tx: async_channel::Sender<()>,
) {
    while let Some(ack) = acks.next().await {
        match ack {
            Ok(_) => trace!(lease = %id, "keepalive ack"),
            Err(e) => {
                warn!(lease = %id, error = %e, "keepalive stream error");
                break;
            }
        }
    }

    lost.store(true, Ordering::SeqCst);
    warn!(lease = %id, "keepalive stream closed; registrations under this lease will expire");
    drop(lost_tx);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spawn::default_spawner;
    use crate::store::memory::MemoryStore;

    #[smol_potat::test]
    async fn rejects_short_ttl_before_any_store_call() {
        let store = Arc::new(MemoryStore::new());
        let err = Lease::acquire(store.clone(), 4, default_spawner())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TtlTooShort { ttl: 4 }));
        // No lease was requested from the store
        assert_eq!(store.grant_calls(), 0);
    }

    #[smol_potat::test]
    async fn acquire_yields_distinct_leases() {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let a = Lease::acquire(store.clone(), 5, default_spawner())
            .await
            .unwrap();
        let b = Lease::acquire(store.clone(), 30, default_spawner())
            .await
            .unwrap();
        assert_ne!(a.id(), b.id());
        assert!(!a.is_lost());
    }

    #[smol_potat::test]
    async fn severed_store_marks_lease_lost() {
        let store = Arc::new(MemoryStore::new());
        let lease = Lease::acquire(store.clone(), 10, default_spawner())
            .await
            .unwrap();

        store.sever();
        lease.lost().await;
        assert!(lease.is_lost());
    }
}
