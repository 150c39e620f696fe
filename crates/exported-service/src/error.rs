//! Error types for the port exporter

use crate::store::LeaseId;
use thiserror::Error;

/// Port exporter error type
#[derive(Error, Debug)]
pub enum Error {
    /// Lease TTL below the renewal-race floor
    #[error("lease TTL must be at least 5 seconds, got {ttl}")]
    TtlTooShort {
        /// Requested TTL in seconds
        ttl: u64,
    },

    /// Address is neither a valid host:port pair nor a valid bare host
    #[error("invalid listen address: {0:?}")]
    InvalidAddress(String),

    /// I/O error (bind, accept, handshake)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Coordination store failure (grant, keepalive setup, put, delete)
    #[error("store error: {0}")]
    Store(String),

    /// The lease's renewal stream has closed; registrations under it
    /// are expiring and new exports would be stillborn
    #[error("lease {0} lost: keepalive stream closed")]
    LeaseLost(LeaseId),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// TLS configuration error
    #[error("TLS error: {0}")]
    Tls(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
