use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use speckle_graphql::{ServerEndpoint, Subscription, SubscriptionClient, WsProtocol};
use sync_api::{ChangeNotification, ErrorKind};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_util::sync::CancellationToken;
use workflow::{BackupOutcome, HandlerFuture, ListenExit, NotificationHandler, SkipReason, listen};

type ServerWs = WebSocketStream<TcpStream>;

#[derive(Default)]
struct Counter {
    seen: AtomicU64,
}

impl NotificationHandler for Counter {
    fn handle<'a>(&'a self, _: &'a ChangeNotification) -> HandlerFuture<'a> {
        Box::pin(async move {
            self.seen.fetch_add(1, Ordering::SeqCst);
            BackupOutcome::Skipped(SkipReason::WatchOnly)
        })
    }
}

/// Accept one legacy-dialect connection, ack it, then run `script`.
/// Resolves to the message types the client sent after the handshake,
/// with a close frame recorded as `"close"`.
async fn spawn_server<F, Fut>(script: F) -> (String, oneshot::Receiver<Vec<String>>)
where
    F: FnOnce(ServerWs, Value) -> Fut + Send + 'static,
    Fut: Future<Output = ServerWs> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, seen_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let accept = |_: &Request, mut resp: Response| -> Result<Response, ErrorResponse> {
            resp.headers_mut().insert(
                "Sec-WebSocket-Protocol",
                HeaderValue::from_static(WsProtocol::GraphqlWs.subprotocol()),
            );
            Ok(resp)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, accept).await.unwrap();

        let init = recv_json(&mut ws).await;
        assert_eq!(init["type"], "connection_init");
        send_json(&mut ws, json!({"type": "connection_ack"})).await;
        let start = recv_json(&mut ws).await;
        assert_eq!(start["type"], "start");

        let mut ws = script(ws, start["id"].clone()).await;
        let _ = seen_tx.send(client_frames(&mut ws).await);
    });

    (format!("http://{addr}"), seen_rx)
}

async fn recv_json(ws: &mut ServerWs) -> Value {
    loop {
        match ws.next().await.unwrap().unwrap() {
            Message::Text(t) => return serde_json::from_str(t.as_str()).unwrap(),
            _ => continue,
        }
    }
}

async fn send_json(ws: &mut ServerWs, value: Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

async fn client_frames(ws: &mut ServerWs) -> Vec<String> {
    let mut seen = Vec::new();
    while let Some(Ok(msg)) = ws.next().await {
        match msg {
            Message::Text(t) => {
                let value: Value = serde_json::from_str(t.as_str()).unwrap();
                seen.push(value["type"].as_str().unwrap_or_default().to_string());
            }
            Message::Close(_) => {
                seen.push("close".to_string());
                break;
            }
            _ => continue,
        }
    }
    seen
}

async fn subscribe(base: &str) -> Subscription {
    let endpoint = ServerEndpoint::new(base, "test-token").unwrap();
    SubscriptionClient::new(endpoint, WsProtocol::GraphqlWs)
        .subscribe("p1")
        .await
        .unwrap()
}

#[tokio::test]
async fn cancel_closes_the_socket_with_stop_and_terminate() {
    let (base, seen) = spawn_server(|ws, _| async move { ws }).await;
    let sub = subscribe(&base).await;
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let report = listen(sub, &token, &Counter::default()).await;

    assert_eq!(report.exit, ListenExit::Cancelled);
    assert_eq!(seen.await.unwrap(), vec!["stop", "connection_terminate", "close"]);
}

#[tokio::test]
async fn transport_error_closes_the_socket_with_stop_and_terminate() {
    let (base, seen) = spawn_server(|mut ws, _| async move {
        send_json(&mut ws, json!({"type": "connection_error", "payload": {"message": "server restarting"}})).await;
        ws
    })
    .await;
    let sub = subscribe(&base).await;

    let report = listen(sub, &CancellationToken::new(), &Counter::default()).await;

    let ListenExit::ConnectionError(err) = &report.exit else {
        panic!("expected a connection error, got {:?}", report.exit);
    };
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(seen.await.unwrap(), vec!["stop", "connection_terminate", "close"]);
}

#[tokio::test]
async fn server_error_frame_fails_the_listen_loop() {
    let (base, seen) = spawn_server(|mut ws, id| async move {
        send_json(
            &mut ws,
            json!({
                "type": "error",
                "id": id,
                "payload": {"message": "You do not have access to this project"}
            }),
        )
        .await;
        ws
    })
    .await;
    let sub = subscribe(&base).await;
    let handler = Counter::default();

    let report = listen(sub, &CancellationToken::new(), &handler).await;

    let ListenExit::ConnectionError(err) = &report.exit else {
        panic!("expected a connection error, got {:?}", report.exit);
    };
    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(err.message().contains("You do not have access to this project"));
    assert_eq!(report.stats.failed, 0);
    assert_eq!(handler.seen.load(Ordering::SeqCst), 0);
    assert_eq!(seen.await.unwrap(), vec!["connection_terminate", "close"]);
}

#[tokio::test]
async fn completed_stream_ends_cleanly_and_closes() {
    let (base, seen) = spawn_server(|mut ws, id| async move {
        let data = json!({
            "projectVersionsUpdated": {
                "id": "m1",
                "type": "CREATED",
                "version": {"id": "v1", "referencedObject": "obj1"}
            }
        });
        send_json(&mut ws, json!({"type": "data", "id": id, "payload": {"data": data}})).await;
        send_json(&mut ws, json!({"type": "complete", "id": id})).await;
        ws
    })
    .await;
    let sub = subscribe(&base).await;
    let handler = Counter::default();

    let report = listen(sub, &CancellationToken::new(), &handler).await;

    assert_eq!(report.exit, ListenExit::StreamEnded);
    assert_eq!(report.stats.received, 1);
    assert_eq!(handler.seen.load(Ordering::SeqCst), 1);
    assert_eq!(seen.await.unwrap(), vec!["connection_terminate", "close"]);
}
