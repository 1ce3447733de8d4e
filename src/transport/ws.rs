// src/transport/ws.rs
// Streaming transport for subscription operations, speaking the
// graphql-transport-ws protocol: connection_init/connection_ack handshake,
// then subscribe/next/error/complete frames multiplexed by id over one
// long-lived socket. A spawned driver task owns the read half and fans
// frames out to per-subscription channels.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::error::ClientError;
use crate::graphql::{GraphQLResponse, Operation};

const ACK_TIMEOUT: Duration = Duration::from_secs(10);

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;
type SubscriberMap = Arc<Mutex<HashMap<String, mpsc::Sender<Result<Value, ClientError>>>>>;

/// Stream of decoded `next` payloads for one subscription. Ends when the
/// server completes the subscription or the channel is torn down; dropping
/// it discards further pushes without aborting the shared socket.
pub type SubscriptionStream = ReceiverStream<Result<Value, ClientError>>;

pub struct WsTransport {
    sink: Arc<tokio::sync::Mutex<WsSink>>,
    subscribers: SubscriberMap,
    driver: JoinHandle<()>,
}

impl WsTransport {
    /// Open the socket and run the protocol handshake. The bearer token, if
    /// any, travels in the `connection_init` payload.
    pub async fn connect(url: &str, token: Option<String>) -> Result<Self, ClientError> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| ClientError::transport(format!("failed to connect to {url}: {e}")))?;
        let (mut sink, mut source) = ws_stream.split();

        let init = match token {
            Some(token) => json!({
                "type": "connection_init",
                "payload": { "authorization": format!("Bearer {token}") },
            }),
            None => json!({ "type": "connection_init" }),
        };
        sink.send(Message::Text(init.to_string().into()))
            .await
            .map_err(|e| ClientError::transport(format!("failed to send connection_init: {e}")))?;

        timeout(ACK_TIMEOUT, wait_for_ack(&mut source))
            .await
            .map_err(|_| ClientError::transport("timed out waiting for connection_ack"))??;

        debug!(url, "subscription channel established");
        let sink = Arc::new(tokio::sync::Mutex::new(sink));
        let subscribers: SubscriberMap = Arc::new(Mutex::new(HashMap::new()));
        let driver = tokio::spawn(drive(source, subscribers.clone(), sink.clone()));
        Ok(WsTransport {
            sink,
            subscribers,
            driver,
        })
    }

    /// Start one subscription on the shared socket.
    pub async fn subscribe(&self, op: &Operation) -> Result<SubscriptionStream, ClientError> {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(32);
        lock_map(&self.subscribers).insert(id.clone(), tx);

        let frame = json!({
            "id": id,
            "type": "subscribe",
            "payload": {
                "operationName": op.name,
                "query": op.document,
                "variables": op.variables,
            },
        });
        let sent = self
            .sink
            .lock()
            .await
            .send(Message::Text(frame.to_string().into()))
            .await;
        if let Err(e) = sent {
            lock_map(&self.subscribers).remove(&id);
            return Err(ClientError::transport(format!(
                "failed to start subscription {}: {e}",
                op.name
            )));
        }
        debug!(operation = op.name, id = %id, "subscription started");
        Ok(ReceiverStream::new(rx))
    }

    /// Abort the driver and end every active subscription stream. Used on
    /// full session teardown.
    pub fn close(&self) {
        self.driver.abort();
        lock_map(&self.subscribers).clear();
    }

    pub fn is_closed(&self) -> bool {
        self.driver.is_finished()
    }
}

async fn wait_for_ack(source: &mut WsSource) -> Result<(), ClientError> {
    while let Some(frame) = source.next().await {
        let frame = frame
            .map_err(|e| ClientError::transport(format!("websocket error during handshake: {e}")))?;
        let Message::Text(text) = frame else { continue };
        let msg: Value = serde_json::from_str(&text)
            .map_err(|e| ClientError::transport(format!("malformed handshake frame: {e}")))?;
        match msg.get("type").and_then(Value::as_str) {
            Some("connection_ack") => return Ok(()),
            Some("connection_error") => {
                return Err(ClientError::Unauthorized {
                    message: msg
                        .get("payload")
                        .map(Value::to_string)
                        .unwrap_or_else(|| "connection rejected".to_string()),
                });
            }
            _ => continue,
        }
    }
    Err(ClientError::transport("connection closed during handshake"))
}

async fn drive(mut source: WsSource, subscribers: SubscriberMap, sink: Arc<tokio::sync::Mutex<WsSink>>) {
    while let Some(frame) = source.next().await {
        match frame {
            Ok(Message::Text(text)) => handle_frame(&text, &subscribers, &sink).await,
            Ok(Message::Close(_)) => {
                debug!("subscription channel closed by server");
                break;
            }
            Err(e) => {
                warn!(error = %e, "subscription channel failed");
                break;
            }
            _ => {}
        }
    }
    // dropping the senders ends every subscription stream
    lock_map(&subscribers).clear();
}

async fn handle_frame(text: &str, subscribers: &SubscriberMap, sink: &Arc<tokio::sync::Mutex<WsSink>>) {
    let Ok(msg) = serde_json::from_str::<Value>(text) else {
        warn!("dropping unparseable frame from subscription channel");
        return;
    };
    let msg_type = msg.get("type").and_then(Value::as_str).unwrap_or("");
    match msg_type {
        "next" => {
            let Some(id) = msg.get("id").and_then(Value::as_str) else {
                return;
            };
            let payload = msg.get("payload").cloned().unwrap_or(Value::Null);
            let item = match serde_json::from_value::<GraphQLResponse>(payload) {
                Ok(envelope) => envelope.into_data(),
                Err(e) => Err(ClientError::transport(format!(
                    "malformed subscription payload: {e}"
                ))),
            };
            deliver(subscribers, id, item).await;
        }
        "error" => {
            let Some(id) = msg.get("id").and_then(Value::as_str) else {
                return;
            };
            let errors = msg
                .get("payload")
                .cloned()
                .and_then(|payload| serde_json::from_value(payload).ok())
                .unwrap_or_default();
            deliver(subscribers, id, Err(ClientError::Api(errors))).await;
            lock_map(subscribers).remove(id);
        }
        "complete" => {
            if let Some(id) = msg.get("id").and_then(Value::as_str) {
                debug!(id, "subscription completed by server");
                lock_map(subscribers).remove(id);
            }
        }
        "ping" => {
            let pong = json!({ "type": "pong" });
            if let Err(e) = sink
                .lock()
                .await
                .send(Message::Text(pong.to_string().into()))
                .await
            {
                warn!(error = %e, "failed to answer ping");
            }
        }
        other => trace!(frame = other, "ignoring subscription channel frame"),
    }
}

async fn deliver(subscribers: &SubscriberMap, id: &str, item: Result<Value, ClientError>) {
    let tx = lock_map(subscribers).get(id).cloned();
    if let Some(tx) = tx {
        if tx.send(item).await.is_err() {
            // receiver dropped: the owning view went away, discard the rest
            lock_map(subscribers).remove(id);
        }
    }
}

fn lock_map(
    subscribers: &SubscriberMap,
) -> std::sync::MutexGuard<'_, HashMap<String, mpsc::Sender<Result<Value, ClientError>>>> {
    subscribers.lock().unwrap_or_else(|e| e.into_inner())
}
