//! TLS decoration for exported ports
//!
//! [`TlsListener`] wraps an exported plain listener; its `accept` runs the
//! rustls handshake transparently. Registration semantics are entirely
//! those of [`ServiceExporter::export_port`]; the TLS layer adds nothing
//! to the store.

use crate::error::{Error, Result};
use crate::exporter::ServiceExporter;
use async_net::{TcpListener, TcpStream};
use futures_rustls::TlsAcceptor;
use futures_rustls::server::TlsStream;
use rustls::ServerConfig;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// TLS configuration for exported listeners
#[derive(Clone)]
pub struct TlsServerConfig {
    config: Arc<ServerConfig>,
}

impl TlsServerConfig {
    /// Wrap an already-built rustls server configuration.
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Self { config }
    }

    /// Build a configuration from PEM-encoded certificate chain and key.
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self> {
        let certs = rustls_pemfile::certs(&mut &*cert_pem)
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(|e| Error::Tls(format!("failed to parse certificates: {e}")))?;
        if certs.is_empty() {
            return Err(Error::Tls("no certificates in input".to_string()));
        }

        let key = rustls_pemfile::private_key(&mut &*key_pem)
            .map_err(|e| Error::Tls(format!("failed to parse private key: {e}")))?
            .ok_or_else(|| Error::Tls("no private key in input".to_string()))?;

        let config = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|e| Error::Tls(format!("failed to build TLS config: {e}")))?;

        Ok(Self {
            config: Arc::new(config),
        })
    }

    /// Build a configuration from PEM files on disk.
    pub async fn from_files(
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
    ) -> Result<Self> {
        let cert_pem = async_fs::read(cert_path.as_ref())
            .await
            .map_err(|e| Error::Tls(format!("failed to read certificate file: {e}")))?;
        let key_pem = async_fs::read(key_path.as_ref())
            .await
            .map_err(|e| Error::Tls(format!("failed to read key file: {e}")))?;

        Self::from_pem(&cert_pem, &key_pem)
    }
}

/// An exported listener with a TLS handshake on accept
pub struct TlsListener {
    inner: TcpListener,
    acceptor: TlsAcceptor,
}

impl TlsListener {
    pub(crate) fn new(inner: TcpListener, tls: &TlsServerConfig) -> Self {
        Self {
            inner,
            acceptor: TlsAcceptor::from(tls.config.clone()),
        }
    }

    /// Accept one connection and complete the TLS handshake.
    pub async fn accept(&self) -> Result<(TlsStream<TcpStream>, SocketAddr)> {
        let (tcp, peer) = self.inner.accept().await?;
        let stream = self.acceptor.accept(tcp).await?;
        debug!(%peer, "TLS handshake complete");
        Ok((stream, peer))
    }

    /// The resolved local address of the underlying socket.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.local_addr()?)
    }

    /// The plain listener underneath.
    pub fn get_ref(&self) -> &TcpListener {
        &self.inner
    }
}

impl ServiceExporter {
    /// Export a port as with [`ServiceExporter::export_port`], then wrap
    /// the listener in TLS.
    ///
    /// Publication, key layout, and error behavior are exactly those of
    /// `export_port`; nothing extra is registered.
    pub async fn export_tls_port(
        &mut self,
        addr: &str,
        service: &str,
        tls: &TlsServerConfig,
    ) -> Result<TlsListener> {
        let listener = self.export_port(addr, service).await?;
        Ok(TlsListener::new(listener, tls))
    }
}
