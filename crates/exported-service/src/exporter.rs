//! Port exporter
//!
//! Binds a listening socket and publishes its resolved address under a
//! service-scoped key, bound to the exporter's lease so the registration
//! dies with the process. The returned listener is plain [`async_net`]
//! and independent of the store: losing the store later never un-binds it.

use crate::error::{Error, Result};
use crate::lease::Lease;
use crate::registration::{LeasedRegistration, LegacyRegistration, RegistrationStore};
use crate::spawn::{Spawner, default_spawner};
use crate::store::{LeaseId, LeaseStore};
use async_net::TcpListener;
use std::sync::Arc;
use tracing::{debug, info};

/// Exports listening ports through a coordination store.
///
/// One exporter, one lease, for its entire lifetime. The store handle may
/// be shared across exporters; the bound sockets and published keys are
/// exclusively this instance's. Only the most recent export is remembered
/// for [`ServiceExporter::unexport`].
pub struct ServiceExporter {
    registration: Arc<dyn RegistrationStore>,
    lease: Option<Lease>,
    last_path: Option<String>,
    spawner: Arc<dyn Spawner>,
}

impl ServiceExporter {
    /// Create an exporter over `store` with a lease of `ttl_seconds`.
    ///
    /// Grants the lease and starts renewal before returning; if either
    /// step fails, no exporter exists. `ttl_seconds` must be at least
    /// [`crate::lease::MIN_TTL_SECONDS`].
    pub async fn new(store: Arc<dyn LeaseStore>, ttl_seconds: u64) -> Result<Self> {
        Self::with_spawner(store, ttl_seconds, default_spawner()).await
    }

    /// Like [`ServiceExporter::new`] with an explicit runtime spawner.
    pub async fn with_spawner(
        store: Arc<dyn LeaseStore>,
        ttl_seconds: u64,
        spawner: Arc<dyn Spawner>,
    ) -> Result<Self> {
        let lease = Lease::acquire(store.clone(), ttl_seconds, spawner.clone()).await?;
        let registration = Arc::new(LeasedRegistration::new(store, lease.id()));

        Ok(Self {
            registration,
            lease: Some(lease),
            last_path: None,
            spawner,
        })
    }

    /// Create an exporter using the legacy child-key layout.
    ///
    /// No lease is granted: registrations have no auto-expiry and each
    /// export allocates a fresh key under the service node.
    pub fn with_legacy_layout(store: Arc<dyn LeaseStore>) -> Self {
        Self {
            registration: Arc::new(LegacyRegistration::new(store)),
            lease: None,
            last_path: None,
            spawner: default_spawner(),
        }
    }

    /// Bind a listener on `addr` and publish it as `service`.
    ///
    /// If `addr` is a `host:port` pair that exact port is bound; a bare
    /// host gets port 0 and the platform picks a free one. What gets
    /// published is always the listener's resolved local address. On a
    /// publish failure the listener is closed before the error returns,
    /// so a failed export never leaks a socket to the caller.
    pub async fn export_port(&mut self, addr: &str, service: &str) -> Result<TcpListener> {
        if let Some(lease) = &self.lease {
            if lease.is_lost() {
                return Err(Error::LeaseLost(lease.id()));
            }
        }

        let bind_addr = listen_address(addr)?;
        let listener = TcpListener::bind(bind_addr.as_str()).await?;
        let local = listener.local_addr()?;
        debug!(%local, service, "listener bound");

        match self.registration.publish(service, &local.to_string()).await {
            Ok(key) => {
                info!(service, %local, %key, "exported port");
                self.last_path = Some(key);
                Ok(listener)
            }
            Err(e) => {
                // Close-on-failure: a failed export hands back no socket
                drop(listener);
                Err(e)
            }
        }
    }

    /// Retract the most recent export.
    ///
    /// Success without any store call when nothing has been published.
    /// Only the last export is tracked; earlier registrations of this
    /// exporter are left to lease expiry. The lease itself keeps renewing
    /// and stays usable for further exports.
    pub async fn unexport(&mut self) -> Result<()> {
        let Some(path) = self.last_path.take() else {
            return Ok(());
        };

        self.registration.withdraw(&path).await?;
        info!(key = %path, "unexported");
        Ok(())
    }

    /// The exporter's lease identifier, if it uses the leased layout.
    pub fn lease_id(&self) -> Option<LeaseId> {
        self.lease.as_ref().map(Lease::id)
    }

    /// Whether this exporter's lease has stopped renewing.
    ///
    /// Legacy-layout exporters have no lease and never report lost.
    pub fn is_lease_lost(&self) -> bool {
        self.lease.as_ref().is_some_and(Lease::is_lost)
    }

    /// Resolve once the lease has stopped renewing; pends forever for
    /// legacy-layout exporters.
    pub async fn lease_lost(&self) {
        match &self.lease {
            Some(lease) => lease.lost().await,
            None => futures::future::pending().await,
        }
    }

    pub(crate) fn spawner(&self) -> &Arc<dyn Spawner> {
        &self.spawner
    }
}

/// Turn a caller-supplied address into something bindable.
///
/// `host:port` (with brackets for IPv6) binds that exact port; a bare
/// host (including an unbracketed IPv6 literal) gets port 0. Anything
/// else is malformed: empty host, unterminated bracket, non-numeric or
/// out-of-range port.
fn listen_address(addr: &str) -> Result<String> {
    let malformed = || Error::InvalidAddress(addr.to_string());

    if addr.is_empty() {
        return Err(malformed());
    }

    if let Some(rest) = addr.strip_prefix('[') {
        let Some((host, tail)) = rest.split_once(']') else {
            return Err(malformed());
        };
        if host.is_empty() {
            return Err(malformed());
        }
        return match tail {
            "" => Ok(format!("[{host}]:0")),
            _ => match tail.strip_prefix(':') {
                Some(port) if port.parse::<u16>().is_ok() => Ok(addr.to_string()),
                _ => Err(malformed()),
            },
        };
    }

    match addr.rsplit_once(':') {
        // More than one colon without brackets: a bare IPv6 host
        Some((host, _)) if host.contains(':') => Ok(format!("[{addr}]:0")),
        Some((host, port)) => {
            if host.is_empty() || port.parse::<u16>().is_err() {
                Err(malformed())
            } else {
                Ok(addr.to_string())
            }
        }
        None => Ok(format!("{addr}:0")),
    }
}
