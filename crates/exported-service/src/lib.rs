//! Lease-backed port export through a TTL coordination store
//!
//! A process that binds an ephemeral port has no stable address to hand
//! out. This crate binds the socket, publishes the resolved `host:port`
//! under a service-scoped key in a shared coordination store, and keeps
//! the registration alive with a continuously renewed lease. When the
//! process dies or loses the store, renewal stops and the registration
//! expires on its own; stale entries self-heal without any cleanup path.
//!
//! # Architecture
//!
//! The crate is runtime-agnostic, working with any async runtime (smol,
//! tokio, async-std) via the [`spawn::Spawner`] seam. It uses:
//!
//! - `async-net` for sockets
//! - `async-tungstenite` for the named request/response server (without
//!   runtime features)
//! - `futures-rustls` for TLS-wrapped listeners (feature `tls`)
//! - Standard `futures` traits
//!
//! The coordination store itself is a collaborator behind the
//! [`store::LeaseStore`] trait; [`store::memory::MemoryStore`] ships for
//! tests and local development.
//!
//! # Example
//!
//! ```no_run
//! use exported_service::{ServiceExporter, store::LeaseStore};
//! use std::sync::Arc;
//!
//! # async fn example(store: Arc<dyn LeaseStore>) -> exported_service::Result<()> {
//! // One lease per exporter, renewed for as long as it lives
//! let mut exporter = ServiceExporter::new(store, 30).await?;
//!
//! // Bare host: the platform picks a free port, the resolved
//! // address is what gets published
//! let listener = exporter.export_port("127.0.0.1", "my-service").await?;
//! println!("serving on {}", listener.local_addr()?);
//!
//! // Retract the registration early; the lease stays usable
//! exporter.unexport().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod exporter;
pub mod lease;
pub mod registration;
pub mod server;
pub mod spawn;
pub mod store;
#[cfg(feature = "tls")]
pub mod tls;

pub use error::{Error, Result};
pub use exporter::ServiceExporter;
pub use lease::{Lease, MIN_TTL_SECONDS};
pub use registration::{
    LeasedRegistration, LegacyRegistration, RegistrationStore, SERVICE_PREFIX,
};
pub use server::{ErrorInfo, Frame, RequestHandler};
pub use spawn::Spawner;
pub use store::{KeepAliveAck, KeepAliveStream, LeaseId, LeaseStore};
#[cfg(feature = "tls")]
pub use tls::{TlsListener, TlsServerConfig};
