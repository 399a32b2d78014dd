use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use sync_api::{ChangeNotification, SyncError};

use crate::config::{ServerEndpoint, WsProtocol};
use crate::http::{GraphqlErrorItem, join_errors};
use crate::queries;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = futures_util::stream::SplitSink<WsStream, Message>;
type WsRead = futures_util::stream::SplitStream<WsStream>;

/// Operation id of the single subscription carried by a connection.
const OPERATION_ID: &str = "1";
/// Upper bound for the goodbye sequence on shutdown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_CHANNEL_BUFFER: usize = 64;

// ═══════════════════════════════════════════════════════════════
//  Wire messages
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct ServerMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Option<Value>,
}

fn client_message(kind: &str, id: Option<&str>, payload: Option<Value>) -> Message {
    let mut msg = json!({ "type": kind });
    if let Some(id) = id {
        msg["id"] = json!(id);
    }
    if let Some(payload) = payload {
        msg["payload"] = payload;
    }
    Message::Text(msg.to_string().into())
}

/// Human-readable text for an `error` / `connection_error` payload, which is
/// an object in the legacy dialect and a list in the newer one.
fn payload_error_text(payload: Option<&Value>) -> String {
    let Some(payload) = payload else {
        return "no details".to_string();
    };
    if let Ok(items) = serde_json::from_value::<Vec<GraphqlErrorItem>>(payload.clone()) {
        if let Some(text) = join_errors(&items) {
            return text;
        }
    }
    payload
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| payload.to_string())
}

// ═══════════════════════════════════════════════════════════════
//  SubscriptionClient
// ═══════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub struct SubscriptionClient {
    endpoint: ServerEndpoint,
    protocol: WsProtocol,
    buffer: usize,
}

impl SubscriptionClient {
    pub fn new(endpoint: ServerEndpoint, protocol: WsProtocol) -> Self {
        Self {
            endpoint,
            protocol,
            buffer: DEFAULT_CHANNEL_BUFFER,
        }
    }

    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    /// Open a connection, authenticate, start `projectVersionsUpdated` and
    /// hand the socket to a background task.
    pub async fn subscribe(&self, project_id: &str) -> Result<Subscription, SyncError> {
        let url = self.endpoint.ws_url();
        let timeout = self.endpoint.timeout();

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| SyncError::config(format!("websocket url {url}: {e}")))?;
        request.headers_mut().insert(
            "Sec-WebSocket-Protocol",
            HeaderValue::from_static(self.protocol.subprotocol()),
        );

        let (ws_stream, _) = tokio::time::timeout(timeout, tokio_tungstenite::connect_async(request))
            .await
            .map_err(|_| SyncError::transport(format!("websocket connect to {url} timed out")))?
            .map_err(|e| SyncError::transport(format!("websocket connect to {url}: {e}")))?;

        let (mut write, mut read) = ws_stream.split();

        write
            .send(client_message(
                "connection_init",
                None,
                Some(json!({ "Authorization": self.endpoint.bearer() })),
            ))
            .await
            .map_err(|e| SyncError::transport(format!("websocket: {e}")))?;

        tokio::time::timeout(timeout, await_ack(&mut write, &mut read))
            .await
            .map_err(|_| SyncError::transport("no connection_ack from server"))??;

        write
            .send(client_message(
                self.protocol.start_type(),
                Some(OPERATION_ID),
                Some(json!({
                    "query": queries::PROJECT_VERSIONS_UPDATED,
                    "variables": { "projectId": project_id },
                })),
            ))
            .await
            .map_err(|e| SyncError::transport(format!("websocket: {e}")))?;

        tracing::info!(url = %url, project_id, protocol = self.protocol.subprotocol(), "subscribed");

        let (tx, rx) = mpsc::channel(self.buffer);
        let token = CancellationToken::new();
        let handle = tokio::spawn(connection_task(
            write,
            read,
            self.protocol,
            tx,
            token.clone(),
        ));

        Ok(Subscription {
            rx,
            token,
            handle: Some(handle),
            closed: false,
        })
    }
}

async fn await_ack(write: &mut WsWrite, read: &mut WsRead) -> Result<(), SyncError> {
    while let Some(msg) = read.next().await {
        let msg = msg.map_err(|e| SyncError::transport(format!("websocket: {e}")))?;
        let text = match &msg {
            Message::Text(t) => t.as_str(),
            Message::Close(frame) => {
                return Err(SyncError::transport(format!(
                    "connection closed during handshake: {}",
                    frame.as_ref().map(|f| f.reason.to_string()).unwrap_or_default()
                )));
            }
            _ => continue,
        };
        let server: ServerMessage = serde_json::from_str(text)
            .map_err(|e| SyncError::transport(format!("bad handshake message: {e}")))?;
        match server.kind.as_str() {
            "connection_ack" => return Ok(()),
            "ka" => continue,
            "ping" => {
                write
                    .send(client_message("pong", None, None))
                    .await
                    .map_err(|e| SyncError::transport(format!("websocket: {e}")))?;
            }
            "connection_error" | "error" => {
                return Err(SyncError::config(format!(
                    "connection rejected: {}",
                    payload_error_text(server.payload.as_ref())
                )));
            }
            other => {
                tracing::debug!(kind = other, "ignoring message before ack");
            }
        }
    }
    Err(SyncError::transport("connection closed before connection_ack"))
}

// ═══════════════════════════════════════════════════════════════
//  Connection task: socket → channel
// ═══════════════════════════════════════════════════════════════

type Item = Result<ChangeNotification, SyncError>;

/// What the read side decided for one incoming frame.
enum Step {
    Continue,
    Pong,
    Emit(Item),
    /// Server ended the operation (`complete` or `error`), connection still up.
    Done(Option<Item>),
    Finish(Option<Item>),
}

fn classify(protocol: WsProtocol, msg: Message) -> Step {
    let text = match &msg {
        Message::Text(t) => t.as_str(),
        Message::Close(_) => return Step::Finish(None),
        _ => return Step::Continue,
    };
    let server: ServerMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable websocket message, skipping");
            return Step::Continue;
        }
    };

    match server.kind.as_str() {
        kind if kind == protocol.data_type() => Step::Emit(decode_data(server.payload)),
        "ka" | "pong" => Step::Continue,
        "ping" => Step::Pong,
        "complete" => Step::Done(None),
        // Operation rejected, e.g. no access to the project. Terminal.
        "error" => Step::Done(Some(Err(SyncError::config(format!(
            "subscription rejected: {}",
            payload_error_text(server.payload.as_ref())
        ))))),
        "connection_error" => Step::Finish(Some(Err(SyncError::transport(format!(
            "connection error: {}",
            payload_error_text(server.payload.as_ref())
        ))))),
        other => {
            tracing::debug!(kind = other, "ignoring websocket message");
            Step::Continue
        }
    }
}

fn decode_data(payload: Option<Value>) -> Item {
    #[derive(Deserialize)]
    struct ExecutionResult {
        #[serde(default)]
        data: Option<Value>,
        #[serde(default)]
        errors: Option<Vec<GraphqlErrorItem>>,
    }

    let payload = payload.ok_or_else(|| SyncError::query("data message without payload"))?;
    let result: ExecutionResult = serde_json::from_value(payload)
        .map_err(|e| SyncError::query(format!("unexpected payload shape: {e}")))?;
    if let Some(msg) = result.errors.as_deref().and_then(join_errors) {
        return Err(SyncError::query(msg));
    }
    let event = result
        .data
        .as_ref()
        .and_then(|d| d.get(queries::SUBSCRIPTION_FIELD))
        .filter(|v| !v.is_null())
        .cloned()
        .ok_or_else(|| SyncError::query(format!("payload has no {}", queries::SUBSCRIPTION_FIELD)))?;
    serde_json::from_value(event).map_err(|e| SyncError::query(format!("bad notification: {e}")))
}

async fn connection_task(
    mut write: WsWrite,
    mut read: WsRead,
    protocol: WsProtocol,
    tx: mpsc::Sender<Item>,
    token: CancellationToken,
) {
    let mut cancelled = false;
    let mut operation_open = true;

    loop {
        let msg = tokio::select! {
            _ = token.cancelled() => {
                cancelled = true;
                break;
            }
            msg = read.next() => msg,
        };

        let step = match msg {
            Some(Ok(Message::Ping(_))) => {
                // tungstenite queues the pong; flush it out.
                let _ = write.flush().await;
                Step::Continue
            }
            Some(Ok(msg)) => classify(protocol, msg),
            Some(Err(e)) => Step::Finish(Some(Err(SyncError::transport(format!("websocket: {e}"))))),
            None => Step::Finish(None),
        };

        match step {
            Step::Continue => {}
            Step::Pong => {
                let _ = write.send(client_message("pong", None, None)).await;
            }
            Step::Emit(item) => {
                if !forward(&tx, item, &token).await {
                    cancelled = token.is_cancelled();
                    break;
                }
            }
            Step::Done(last) => {
                operation_open = false;
                if let Some(item) = last {
                    let _ = forward(&tx, item, &token).await;
                }
                break;
            }
            Step::Finish(last) => {
                if let Some(item) = last {
                    let _ = forward(&tx, item, &token).await;
                }
                break;
            }
        }
    }

    // Send errors are ignored: the socket may already be gone.
    let goodbye = async {
        if operation_open {
            let _ = write
                .send(client_message(protocol.stop_type(), Some(OPERATION_ID), None))
                .await;
        }
        if let Some(kind) = protocol.terminate_type() {
            let _ = write.send(client_message(kind, None, None)).await;
        }
        let _ = write.send(Message::Close(None)).await;
        let _ = write.close().await;
    };
    if tokio::time::timeout(CLOSE_TIMEOUT, goodbye).await.is_err() {
        tracing::warn!("websocket close timed out");
    }
    tracing::debug!(cancelled, operation_open, "connection task finished");
}

/// Send into the channel unless cancelled first. `false` = stop reading.
async fn forward(tx: &mpsc::Sender<Item>, item: Item, token: &CancellationToken) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        res = tx.send(item) => res.is_ok(),
    }
}

// ═══════════════════════════════════════════════════════════════
//  Subscription handle
// ═══════════════════════════════════════════════════════════════

/// Live, non-restartable sequence of change notifications.
///
/// Connection-level failures arrive once as `Err` and end the sequence.
/// The transport is released by [`Subscription::close`], or on drop.
pub struct Subscription {
    rx: mpsc::Receiver<Item>,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
    closed: bool,
}

impl Subscription {
    /// Next notification; `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<Item> {
        self.rx.recv().await
    }

    /// Stop the subscription and close the socket. Safe to call repeatedly.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.token.cancel();
        self.rx.close();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "connection task ended abnormally");
            }
        }
        tracing::info!("connection closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Build a subscription fed by an arbitrary channel. Used to drive the
    /// listen loop without a socket.
    pub fn from_channel(rx: mpsc::Receiver<Item>) -> Self {
        Self {
            rx,
            token: CancellationToken::new(),
            handle: None,
            closed: false,
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.closed)
            .field("task", &self.handle.is_some())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // The task still runs its goodbye sequence after cancellation.
        self.token.cancel();
    }
}
