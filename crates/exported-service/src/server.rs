//! Named request/response server
//!
//! Convenience layer over [`ServiceExporter::export_port`]: export a port,
//! then run a request/response loop over it until the listener fails. The
//! wire protocol is JSON frames over WebSocket; the caller supplies the
//! [`RequestHandler`]. No registration logic lives here.

use crate::error::Result;
use crate::exporter::ServiceExporter;
use async_net::TcpStream;
use async_trait::async_trait;
use async_tungstenite::accept_async;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tungstenite::Message;

/// Application logic for a named service: one JSON request in, one JSON
/// response out. Handler errors become error frames, not dropped
/// connections.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Answer one request.
    async fn handle(&self, request: serde_json::Value) -> Result<serde_json::Value>;
}

/// Wire frames exchanged with a named service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Client request
    Request {
        /// Request ID for correlation
        id: String,
        /// Request payload, opaque to the server loop
        body: serde_json::Value,
    },
    /// Server response
    Response {
        /// Request ID this answers
        id: String,
        /// Response payload on success
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
        /// Error information on failure
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<ErrorInfo>,
    },
}

/// Error payload of a response frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Machine-readable error code
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl ServiceExporter {
    /// Export `addr` as `service` and serve `handler` over it.
    ///
    /// Blocks until the listener fails; per-connection loops run on the
    /// exporter's spawner. Registration is exactly one
    /// [`ServiceExporter::export_port`] call.
    pub async fn serve_named(
        &mut self,
        service: &str,
        addr: &str,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<()> {
        let listener = self.export_port(addr, service).await?;
        info!(service, addr = %listener.local_addr()?, "serving named service");

        loop {
            let (stream, peer) = listener.accept().await?;
            debug!(%peer, service, "accepted connection");

            let handler = handler.clone();
            self.spawner().spawn(Box::pin(async move {
                if let Err(e) = serve_connection(stream, peer, handler).await {
                    warn!(%peer, error = %e, "connection ended with error");
                }
            }));
        }
    }
}

/// Run the request/response loop for one connection.
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    handler: Arc<dyn RequestHandler>,
) -> Result<()> {
    let mut ws = accept_async(stream).await?;

    while let Some(msg) = ws.next().await {
        match msg? {
            Message::Text(text) => {
                let frame = answer(text.as_str(), handler.as_ref()).await;
                ws.send(Message::Text(serde_json::to_string(&frame)?.into()))
                    .await?;
            }
            Message::Ping(data) => {
                ws.send(Message::Pong(data)).await?;
            }
            Message::Close(_) => {
                debug!(%peer, "client closing connection");
                break;
            }
            _ => {
                // Ignore other message types
            }
        }
    }

    debug!(%peer, "connection closed");
    Ok(())
}

/// Decode one text frame and produce the response frame for it.
async fn answer(text: &str, handler: &dyn RequestHandler) -> Frame {
    match serde_json::from_str::<Frame>(text) {
        Ok(Frame::Request { id, body }) => match handler.handle(body).await {
            Ok(data) => Frame::Response {
                id,
                data: Some(data),
                error: None,
            },
            Err(e) => Frame::Response {
                id,
                data: None,
                error: Some(ErrorInfo {
                    code: "handler_error".to_string(),
                    message: e.to_string(),
                }),
            },
        },
        Ok(Frame::Response { id, .. }) => {
            warn!("unexpected response frame from client");
            error_frame(id, "unexpected_frame", "server takes requests only")
        }
        Err(e) => error_frame(String::new(), "bad_request", &e.to_string()),
    }
}

fn error_frame(id: String, code: &str, message: &str) -> Frame {
    Frame::Response {
        id,
        data: None,
        error: Some(ErrorInfo {
            code: code.to_string(),
            message: message.to_string(),
        }),
    }
}
