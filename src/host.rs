//! Newline-delimited JSON transport between the extension and the gateway.
//!
//! Each input line is one request; each output line is a reply or a change
//! notification. Replies echo the request's `requestId` when present. All
//! output goes through one writer task so lines never interleave.

use crate::commands::{self, Request, Response};
use crate::notifications::LinkEvent;
use crate::AppState;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinSet;

const REQUEST_ID: &str = "requestId";

/// Serve until `input` reaches EOF. In-flight requests finish before return.
pub async fn serve<R, W>(state: Arc<AppState>, input: R, output: W) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(write_lines(rx, output));

    let mut events = state.notifier.subscribe();
    let event_tx = tx.clone();
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
    let forwarder = tokio::spawn(async move {
        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => forward_event(&event_tx, event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Dropped {} notification(s)", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = &mut shutdown_rx => {
                    // Flush what is already queued.
                    loop {
                        match events.try_recv() {
                            Ok(event) => forward_event(&event_tx, event),
                            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                            Err(_) => break,
                        }
                    }
                    break;
                }
            }
        }
    });

    let mut requests = JoinSet::new();
    let mut lines = BufReader::new(input).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let state = state.clone();
        let tx = tx.clone();
        requests.spawn(async move {
            let reply = dispatch_line(&state, &line).await;
            let _ = tx.send(reply);
        });
    }

    tracing::info!("Input closed, waiting for {} request(s)", requests.len());
    while requests.join_next().await.is_some() {}

    let _ = shutdown_tx.send(());
    let _ = forwarder.await;
    drop(tx);
    match writer.await {
        Ok(result) => result,
        Err(e) => Err(std::io::Error::new(std::io::ErrorKind::Other, e)),
    }
}

async fn write_lines<W>(mut rx: mpsc::UnboundedReceiver<String>, mut output: W) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        output.write_all(line.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
    }
    Ok(())
}

fn forward_event(tx: &mpsc::UnboundedSender<String>, event: LinkEvent) {
    match serde_json::to_string(&event) {
        Ok(line) => {
            let _ = tx.send(line);
        }
        Err(e) => tracing::error!("Failed to encode {:?}: {}", event, e),
    }
}

/// Parse, handle and encode one request line.
pub async fn dispatch_line(state: &AppState, line: &str) -> String {
    let (request_id, response) = match serde_json::from_str::<Value>(line) {
        Ok(value) => {
            let request_id = value.get(REQUEST_ID).cloned();
            let response = match serde_json::from_value::<Request>(value) {
                Ok(request) => commands::handle(state, request).await,
                Err(e) => Response::failure(format!("Invalid request: {}", e)),
            };
            (request_id, response)
        }
        Err(e) => (None, Response::failure(format!("Invalid JSON: {}", e))),
    };

    let mut reply = serde_json::to_value(&response)
        .unwrap_or_else(|e| serde_json::json!({"success": false, "error": e.to_string()}));
    if let (Some(id), Value::Object(map)) = (request_id, &mut reply) {
        map.insert(REQUEST_ID.to_string(), id);
    }
    reply.to_string()
}
