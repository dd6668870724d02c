//! Line-delimited JSON bridge between the host and the worker.
//!
//! Each input line is `{"id": n, "event": {"type": ..., ...}}`. Every event
//! runs in its own task so a stalled fetch only stalls its own reply. Replies
//! go through a single writer task as `{"id": n, "ok": ...}` or
//! `{"id": n, "error": {"code": ..., "message": ...}}`, in completion order.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use pwa_relay_client::{EventOutcome, FetchedResponse, HostEvent, Worker};

use crate::error::{BridgeError, ErrorReply};

#[derive(Debug, Deserialize)]
struct Envelope {
    id: u64,
    event: HostEvent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Reply {
    Ok { id: Option<u64>, ok: Value },
    Err { id: Option<u64>, error: ErrorReply },
}

/// Serve host events from `reader` until EOF, writing replies to `writer`.
///
/// Returns once every in-flight event has replied.
pub async fn serve<R, W>(worker: Arc<Worker>, reader: R, writer: W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel::<Reply>();
    let writer = tokio::spawn(write_replies(rx, writer));

    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let envelope = match parse(&line) {
            Ok(envelope) => envelope,
            Err((id, err)) => {
                tracing::warn!(error = %err, "rejecting host line");
                if tx.send(Reply::Err { id, error: ErrorReply::from(&err) }).is_err() {
                    tracing::error!("reply writer is gone");
                }
                continue;
            }
        };

        let worker = worker.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let reply = handle(&worker, envelope).await;
            if tx.send(reply).is_err() {
                tracing::error!("reply writer is gone");
            }
        });
    }

    tracing::info!("host closed input, draining replies");
    drop(tx);
    writer.await??;
    Ok(())
}

async fn write_replies<W>(mut rx: mpsc::UnboundedReceiver<Reply>, mut writer: W) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(reply) = rx.recv().await {
        let mut line = serde_json::to_vec(&reply).map_err(std::io::Error::other)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    Ok(())
}

/// Parse one line. On failure, returns whatever id could be recovered.
fn parse(line: &str) -> Result<Envelope, (Option<u64>, BridgeError)> {
    let value: Value =
        serde_json::from_str(line).map_err(|e| (None, BridgeError::InvalidInput(format!("not JSON: {e}"))))?;
    let id = value.get("id").and_then(Value::as_u64);
    serde_json::from_value(value).map_err(|e| (id, BridgeError::InvalidInput(e.to_string())))
}

async fn handle(worker: &Worker, envelope: Envelope) -> Reply {
    let Envelope { id, event } = envelope;
    let name = event.name();
    tracing::debug!(id, name, "handling event");

    let result = match event {
        HostEvent::Install => install(worker).await,
        event => worker.dispatch(event).await.map(encode),
    };

    match result {
        Ok(ok) => {
            tracing::debug!(id, name, "event handled");
            Reply::Ok { id: Some(id), ok }
        }
        Err(err) => {
            tracing::warn!(id, name, error = %err, "event failed");
            Reply::Err { id: Some(id), error: ErrorReply::from(&err) }
        }
    }
}

/// Install, then activate straight away when install asked to skip waiting.
async fn install(worker: &Worker) -> Result<Value, pwa_relay_core::Error> {
    let outcome = worker.dispatch(HostEvent::Install).await?;
    let skip_waiting = matches!(outcome, EventOutcome::Installed { skip_waiting: true, .. });
    let mut reply = encode(outcome);

    if skip_waiting {
        match worker.dispatch(HostEvent::Activate).await {
            Ok(activated) => reply["activated"] = encode(activated),
            Err(err) => {
                tracing::warn!(error = %err, "activation after install failed");
                reply["activated"] = json!({ "error": ErrorReply::from(&err) });
            }
        }
    }

    Ok(reply)
}

fn encode(outcome: EventOutcome) -> Value {
    match outcome {
        EventOutcome::Installed { report, skip_waiting } => json!({ "report": report, "skip_waiting": skip_waiting }),
        EventOutcome::Activated { deleted } => json!({ "deleted": deleted }),
        EventOutcome::Fetched(response) => encode_response(response),
        EventOutcome::Notified(notification) => json!({ "notification": notification }),
        EventOutcome::Clicked(outcome) => json!(outcome),
        EventOutcome::Ack => Value::Null,
    }
}

fn encode_response(response: FetchedResponse) -> Value {
    json!({
        "status": response.status,
        "url": response.url,
        "headers": response.headers,
        "from_cache": response.from_cache,
        "body": STANDARD.encode(&response.body),
    })
}
