//! Named server integration tests
//!
//! The server publishes its address into the store like any other export;
//! the tests discover the port the same way a real client would, by
//! reading the registration back.

use async_net::TcpStream;
use async_trait::async_trait;
use async_tungstenite::client_async;
use exported_service::store::memory::MemoryStore;
use exported_service::{Error, Frame, RequestHandler, Result, ServiceExporter};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tungstenite::Message;

/// Echoes the request body back; refuses bodies with `"fail": true`.
struct EchoHandler;

#[async_trait]
impl RequestHandler for EchoHandler {
    async fn handle(&self, request: serde_json::Value) -> Result<serde_json::Value> {
        if request.get("fail").and_then(|v| v.as_bool()) == Some(true) {
            return Err(Error::Store("refused by handler".to_string()));
        }
        Ok(request)
    }
}

/// Poll the store until the registration for `key` shows up.
async fn wait_for_registration(store: &MemoryStore, key: &str) -> String {
    for _ in 0..200 {
        if let Some(value) = store.get(key) {
            return value;
        }
        smol::Timer::after(Duration::from_millis(10)).await;
    }
    panic!("registration for {key} never appeared");
}

async fn connect_ws(
    addr: &str,
) -> anyhow::Result<async_tungstenite::WebSocketStream<TcpStream>> {
    let stream = TcpStream::connect(addr).await?;
    let (ws, _) = client_async(&format!("ws://{addr}"), stream).await?;
    Ok(ws)
}

async fn roundtrip(
    ws: &mut async_tungstenite::WebSocketStream<TcpStream>,
    frame: &Frame,
) -> anyhow::Result<Frame> {
    ws.send(Message::Text(serde_json::to_string(frame)?.into()))
        .await?;

    loop {
        let message = ws
            .next()
            .await
            .ok_or_else(|| anyhow::anyhow!("connection closed before a reply"))??;
        if let Message::Text(text) = message {
            return Ok(serde_json::from_str(text.as_str())?);
        }
    }
}

#[smol_potat::test]
async fn named_server_answers_requests() {
    let store = Arc::new(MemoryStore::new());
    let mut exporter = ServiceExporter::new(store.clone(), 30)
        .await
        .expect("create exporter");
    let lease = exporter.lease_id().expect("leased exporter");

    // serve_named blocks, so it runs in the background for the test
    let server = smol::spawn(async move {
        let _ = exporter
            .serve_named("answers", "127.0.0.1", Arc::new(EchoHandler))
            .await;
    });

    let key = format!("/ns/service/answers/{lease}");
    let addr = wait_for_registration(&store, &key).await;

    let mut ws = connect_ws(&addr).await.expect("websocket handshake");

    // Plain echo
    let body = serde_json::json!({"msg": "hi"});
    let reply = roundtrip(
        &mut ws,
        &Frame::Request {
            id: "1".to_string(),
            body: body.clone(),
        },
    )
    .await
    .expect("echo roundtrip");
    match reply {
        Frame::Response { id, data, error } => {
            assert_eq!(id, "1");
            assert_eq!(data, Some(body));
            assert!(error.is_none());
        }
        other => panic!("expected response, got {other:?}"),
    }

    // Handler failure comes back as an error frame on the same id
    let reply = roundtrip(
        &mut ws,
        &Frame::Request {
            id: "2".to_string(),
            body: serde_json::json!({"fail": true}),
        },
    )
    .await
    .expect("refused roundtrip");
    match reply {
        Frame::Response { id, data, error } => {
            assert_eq!(id, "2");
            assert!(data.is_none());
            let error = error.expect("error info");
            assert_eq!(error.code, "handler_error");
        }
        other => panic!("expected response, got {other:?}"),
    }

    ws.close(None).await.expect("close");
    drop(server);
}

#[smol_potat::test]
async fn malformed_requests_get_an_error_frame() {
    let store = Arc::new(MemoryStore::new());
    let mut exporter = ServiceExporter::new(store.clone(), 30)
        .await
        .expect("create exporter");
    let lease = exporter.lease_id().expect("leased exporter");

    let server = smol::spawn(async move {
        let _ = exporter
            .serve_named("strict", "127.0.0.1", Arc::new(EchoHandler))
            .await;
    });

    let key = format!("/ns/service/strict/{lease}");
    let addr = wait_for_registration(&store, &key).await;

    let mut ws = connect_ws(&addr).await.expect("websocket handshake");

    ws.send(Message::Text("this is not json".into()))
        .await
        .expect("send garbage");

    let reply = loop {
        match ws.next().await.expect("stream open").expect("recv") {
            Message::Text(text) => {
                break serde_json::from_str::<Frame>(text.as_str()).expect("decode frame");
            }
            _ => continue,
        }
    };
    match reply {
        Frame::Response { error, .. } => {
            assert_eq!(error.expect("error info").code, "bad_request");
        }
        other => panic!("expected response, got {other:?}"),
    }

    ws.close(None).await.expect("close");
    drop(server);
}
