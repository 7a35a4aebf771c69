use anyhow::{Result, anyhow};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Reply = oneshot::Sender<Result<TransportResponse>>;

/// Upper bound for a single CDP round trip. Full-page captures of long
/// documents are the slowest calls we make.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Global atomic ID counter for generating unique message IDs.
static GLOBAL_ID_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Returns a unique incremental ID for request messages.
pub(crate) fn next_id() -> usize {
    GLOBAL_ID_COUNTER.fetch_add(1, Ordering::SeqCst) + 1
}

/// Messages sent to the transport actor.
#[derive(Debug)]
pub(crate) enum TransportMessage {
    /// A browser-level command with a response sender.
    Request(Value, Reply),
    /// Listener for the target response carrying the given ID.
    ListenTargetMessage(u64, Reply),
    /// Forward every `(session, method)` event to the sender.
    Subscribe(EventKey, mpsc::UnboundedSender<Value>),
    /// Send `Browser.close`, stop the actor, then acknowledge.
    Shutdown(oneshot::Sender<()>),
}

/// Responses produced by the transport actor.
#[derive(Debug)]
pub(crate) enum TransportResponse {
    Response(Response),
    Target(TargetMessage),
}

/// A browser-level CDP response.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Response {
    pub(crate) id: u64,
    #[serde(default)]
    pub(crate) result: Value,
}

/// A `Target.receivedMessageFromTarget` notification. `params.message`
/// holds the JSON-encoded message of the page session.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct TargetMessage {
    pub(crate) params: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct EventKey {
    pub(crate) session_id: String,
    pub(crate) method: String,
}

/// What one frame read from the socket turned out to be.
#[derive(Debug)]
pub(crate) enum Incoming {
    Response(Response),
    Failure { id: u64, message: String },
    Target { id: u64, message: TargetMessage },
    Event { key: EventKey, params: Value },
    Ignored,
}

/// Classifies a raw text frame from the browser.
pub(crate) fn classify(text: &str) -> Incoming {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return Incoming::Ignored;
    };

    if let Some(id) = value.get("id").and_then(Value::as_u64) {
        if let Some(error) = value.get("error") {
            return Incoming::Failure {
                id,
                message: describe_error(error),
            };
        }
        return match serde_json::from_value::<Response>(value) {
            Ok(response) => Incoming::Response(response),
            Err(_) => Incoming::Ignored,
        };
    }

    if value["method"] != "Target.receivedMessageFromTarget" {
        return Incoming::Ignored;
    }

    let Some(inner) = value["params"]["message"]
        .as_str()
        .and_then(|s| serde_json::from_str::<Value>(s).ok())
    else {
        return Incoming::Ignored;
    };

    if let Some(id) = inner.get("id").and_then(Value::as_u64) {
        return Incoming::Target {
            id,
            message: TargetMessage {
                params: value["params"].clone(),
            },
        };
    }

    match (value["params"]["sessionId"].as_str(), inner["method"].as_str()) {
        (Some(session_id), Some(method)) => Incoming::Event {
            key: EventKey {
                session_id: session_id.to_string(),
                method: method.to_string(),
            },
            params: inner["params"].clone(),
        },
        _ => Incoming::Ignored,
    }
}

pub(crate) fn describe_error(error: &Value) -> String {
    match (error["code"].as_i64(), error["message"].as_str()) {
        (Some(code), Some(message)) => format!("{message} (code {code})"),
        (None, Some(message)) => message.to_string(),
        _ => error.to_string(),
    }
}

/// Internal transport actor managing WebSocket communication and request-response handling.
struct TransportActor {
    pending_requests: HashMap<u64, Reply>,
    subscribers: HashMap<EventKey, Vec<mpsc::UnboundedSender<Value>>>,
    ws_sink: SplitSink<WsStream, Message>,
    command_rx: mpsc::Receiver<TransportMessage>,
}

impl TransportActor {
    async fn run(mut self, mut ws_stream: SplitStream<WsStream>) {
        loop {
            tokio::select! {
                Some(msg) = ws_stream.next() => {
                    match msg {
                        Ok(Message::Text(text)) => self.dispatch(&text),
                        Ok(Message::Close(_)) | Err(_) => break,
                        _ => {}
                    }
                }
                Some(msg) = self.command_rx.recv() => {
                    match msg {
                        TransportMessage::Request(cmd, tx) => {
                            let Some(id) = cmd["id"].as_u64() else {
                                let _ = tx.send(Err(anyhow!("Command without id: {cmd}")));
                                continue;
                            };
                            if self.ws_sink.send(Message::Text(cmd.to_string())).await.is_ok() {
                                self.pending_requests.insert(id, tx);
                            } else {
                                let _ = tx.send(Err(anyhow!("WebSocket send failed")));
                            }
                        }
                        TransportMessage::ListenTargetMessage(id, tx) => {
                            self.pending_requests.insert(id, tx);
                        }
                        TransportMessage::Subscribe(key, tx) => {
                            self.subscribers.entry(key).or_default().push(tx);
                        }
                        TransportMessage::Shutdown(done) => {
                            let _ = self.ws_sink.send(Message::Text(json!({
                                "id": next_id(),
                                "method": "Browser.close",
                                "params": {}
                            }).to_string())).await;
                            let _ = self.ws_sink.close().await;
                            let _ = done.send(());
                            break;
                        }
                    }
                }
                else => break,
            }
        }
        debug!("CDP transport stopped");
    }

    fn dispatch(&mut self, text: &str) {
        match classify(text) {
            Incoming::Response(response) => {
                if let Some(sender) = self.pending_requests.remove(&response.id) {
                    let _ = sender.send(Ok(TransportResponse::Response(response)));
                }
            }
            Incoming::Failure { id, message } => {
                if let Some(sender) = self.pending_requests.remove(&id) {
                    let _ = sender.send(Err(anyhow!("CDP error: {message}")));
                }
            }
            Incoming::Target { id, message } => {
                if let Some(sender) = self.pending_requests.remove(&id) {
                    let _ = sender.send(Ok(TransportResponse::Target(message)));
                }
            }
            Incoming::Event { key, params } => {
                if let Some(senders) = self.subscribers.get_mut(&key) {
                    senders.retain(|tx| tx.send(params.clone()).is_ok());
                }
            }
            Incoming::Ignored => {}
        }
    }
}

/// Asynchronous transport interface to the Chrome DevTools Protocol over WebSocket.
#[derive(Debug)]
pub(crate) struct Transport {
    tx: mpsc::Sender<TransportMessage>,
}

impl Transport {
    /// Creates a new transport connected to the specified WebSocket URL.
    pub(crate) async fn new(ws_url: &str) -> Result<Self> {
        let (ws_stream, _) = connect_async(ws_url).await?;
        let (ws_sink, ws_stream) = ws_stream.split();
        let (tx, rx) = mpsc::channel(100);

        tokio::spawn(async move {
            let actor = TransportActor {
                pending_requests: HashMap::new(),
                subscribers: HashMap::new(),
                ws_sink,
                command_rx: rx,
            };
            actor.run(ws_stream).await;
        });

        Ok(Self { tx })
    }

    /// Sends a command and awaits its response.
    pub(crate) async fn send(&self, command: Value) -> Result<TransportResponse> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(TransportMessage::Request(command, tx))
            .await
            .map_err(|_| anyhow!("Transport actor dropped"))?;
        time::timeout(RESPONSE_TIMEOUT, rx)
            .await
            .map_err(|_| anyhow!("Timeout waiting for response"))?
            .map_err(|_| anyhow!("Response channel closed"))?
    }

    /// Registers interest in the target response carrying `msg_id`. Call
    /// before sending the message so a fast reply cannot be missed.
    pub(crate) async fn listen_target_msg(
        &self,
        msg_id: usize,
    ) -> Result<oneshot::Receiver<Result<TransportResponse>>> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(TransportMessage::ListenTargetMessage(msg_id as u64, tx))
            .await
            .map_err(|_| anyhow!("Transport actor dropped"))?;
        Ok(rx)
    }

    /// Waits for a target response registered with `listen_target_msg`.
    pub(crate) async fn get_target_msg(
        &self,
        rx: oneshot::Receiver<Result<TransportResponse>>,
    ) -> Result<TransportResponse> {
        time::timeout(RESPONSE_TIMEOUT, rx)
            .await
            .map_err(|_| anyhow!("Timeout waiting for target message"))?
            .map_err(|_| anyhow!("Response channel closed"))?
    }

    /// Subscribes to an event of a page session. Register before triggering
    /// the event; the actor processes commands in order.
    pub(crate) async fn subscribe(
        &self,
        session_id: &str,
        method: &str,
    ) -> Result<mpsc::UnboundedReceiver<Value>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let key = EventKey {
            session_id: session_id.to_string(),
            method: method.to_string(),
        };
        self.tx
            .send(TransportMessage::Subscribe(key, tx))
            .await
            .map_err(|_| anyhow!("Transport actor dropped"))?;
        Ok(rx)
    }

    /// Sends `Browser.close` and returns once the actor has written it and
    /// stopped.
    pub(crate) async fn shutdown(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(TransportMessage::Shutdown(done_tx)).await.is_err() {
            warn!("CDP transport already stopped");
            return;
        }
        match time::timeout(SHUTDOWN_TIMEOUT, done_rx).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => warn!("CDP transport stopped before sending Browser.close"),
            Err(_) => warn!("Timeout waiting for the CDP transport to shut down"),
        }
    }
}
