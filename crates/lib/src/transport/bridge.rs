//! Bridge transport: one WebSocket link to a chat transport sidecar per connection attempt.
//!
//! The link is opened with a `connect` request carrying the stored credentials, and `connect`
//! returns once the bridge has accepted it. A rejected request fails the attempt. A reader task
//! turns bridge frames into `TransportEvent`s; a writer task owns the socket sink so sends from
//! several flows can be in flight at once. Send responses are matched back by request id.

use crate::credentials::Credentials;
use crate::error::TransportError;
use crate::transport::event::{ConnectionState, ConnectionUpdate, DisconnectReason, TransportEvent};
use crate::transport::protocol::{
    decode_event, BridgeFrame, BridgeRequest, ConnectParams, SendParams, METHOD_CONNECT,
    METHOD_SEND,
};
use crate::transport::{Connection, Transport, TransportLink};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;

const EVENT_BUFFER: usize = 64;

/// How long the bridge has to accept or reject a `connect` request.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Waiters for send responses, keyed by request id. None once the link has ended.
type Pending = Arc<Mutex<Option<HashMap<String, oneshot::Sender<Result<(), String>>>>>>;

/// Connects to a bridge at `url` for one session identity.
pub struct BridgeTransport {
    url: String,
    session_id: String,
}

impl BridgeTransport {
    pub fn new(url: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            session_id: session_id.into(),
        }
    }
}

#[async_trait]
impl Transport for BridgeTransport {
    async fn connect(
        &self,
        credentials: Option<Credentials>,
    ) -> Result<TransportLink, TransportError> {
        let (ws, _) = tokio_tungstenite::connect_async(&self.url)
            .await
            .map_err(|e| TransportError::Connect {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;
        let (mut sink, stream) = ws.split();

        let params = serde_json::to_value(ConnectParams {
            session: self.session_id.clone(),
            credentials,
        })?;
        let connect_req = BridgeRequest::new(METHOD_CONNECT, params);
        sink.send(Message::Text(serde_json::to_string(&connect_req)?))
            .await
            .map_err(|e| TransportError::Connect {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;

        let pending: Pending = Arc::new(Mutex::new(Some(HashMap::new())));
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
        let (event_tx, event_rx) = mpsc::channel::<TransportEvent>(EVENT_BUFFER);

        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let is_close = matches!(msg, Message::Close(_));
                if sink.send(msg).await.is_err() || is_close {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let (accepted_tx, accepted_rx) = oneshot::channel();
        tokio::spawn(read_loop(
            stream,
            event_tx,
            pending.clone(),
            connect_req.id,
            accepted_tx,
        ));

        let connection = Arc::new(BridgeConnection {
            out_tx,
            pending,
            closed: AtomicBool::new(false),
        });
        let verdict = match tokio::time::timeout(CONNECT_TIMEOUT, accepted_rx).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(reason))) => Err(TransportError::Rejected(reason)),
            Ok(Err(_)) => Err(TransportError::LinkClosed),
            Err(_) => Err(TransportError::Connect {
                url: self.url.clone(),
                reason: format!("no answer to connect within {:?}", CONNECT_TIMEOUT),
            }),
        };
        if let Err(e) = verdict {
            connection.close();
            return Err(e);
        }
        Ok(TransportLink {
            connection,
            events: event_rx,
        })
    }
}

/// Read frames until the socket ends. Guarantees exactly one close event per link.
async fn read_loop<S>(
    mut stream: S,
    event_tx: mpsc::Sender<TransportEvent>,
    pending: Pending,
    connect_id: String,
    accepted_tx: oneshot::Sender<Result<(), String>>,
) where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + Unpin,
{
    let mut closed = false;
    let mut accepted_tx = Some(accepted_tx);
    while let Some(msg) = stream.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };
        let frame: BridgeFrame = match serde_json::from_str(&text) {
            Ok(f) => f,
            Err(e) => {
                log::debug!("bridge: ignoring unparseable frame: {}", e);
                continue;
            }
        };
        match frame {
            BridgeFrame::Res { id, ok, error } => {
                if id == connect_id {
                    let Some(tx) = accepted_tx.take() else { continue };
                    if ok {
                        let _ = tx.send(Ok(()));
                        continue;
                    }
                    let reason = error.unwrap_or_else(|| "connect rejected".to_string());
                    log::warn!("bridge: connect rejected: {}", reason);
                    let _ = tx.send(Err(reason));
                    closed = true;
                    break;
                }
                let waiter = pending
                    .lock()
                    .ok()
                    .and_then(|mut p| p.as_mut().and_then(|w| w.remove(&id)));
                if let Some(tx) = waiter {
                    let result = if ok {
                        Ok(())
                    } else {
                        Err(error.unwrap_or_else(|| "send failed".to_string()))
                    };
                    let _ = tx.send(result);
                }
            }
            BridgeFrame::Event { event, payload } => {
                let Some(ev) = decode_event(&event, payload) else {
                    log::debug!("bridge: ignoring event {}", event);
                    continue;
                };
                let is_close = matches!(
                    ev,
                    TransportEvent::ConnectionUpdate(ConnectionUpdate {
                        state: Some(ConnectionState::Close(_)),
                        ..
                    })
                );
                if event_tx.send(ev).await.is_err() {
                    break;
                }
                if is_close {
                    closed = true;
                    break;
                }
            }
        }
    }
    if let Ok(mut p) = pending.lock() {
        p.take();
    }
    if !closed {
        let _ = event_tx
            .send(TransportEvent::ConnectionUpdate(ConnectionUpdate {
                state: Some(ConnectionState::Close(DisconnectReason::ConnectionLost)),
                qr: None,
            }))
            .await;
    }
}

/// Live bridge link.
pub struct BridgeConnection {
    out_tx: mpsc::UnboundedSender<Message>,
    pending: Pending,
    closed: AtomicBool,
}

#[async_trait]
impl Connection for BridgeConnection {
    async fn send_text(&self, address: &str, text: &str) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::LinkClosed);
        }
        let params = serde_json::to_value(SendParams {
            to: address.to_string(),
            text: text.to_string(),
        })?;
        let req = BridgeRequest::new(METHOD_SEND, params);
        let frame = serde_json::to_string(&req)?;
        let (tx, rx) = oneshot::channel();
        {
            let mut p = self.pending.lock().map_err(|_| TransportError::LinkClosed)?;
            let waiters = p.as_mut().ok_or(TransportError::LinkClosed)?;
            waiters.insert(req.id.clone(), tx);
        }
        if self.out_tx.send(Message::Text(frame)).is_err() {
            if let Ok(mut p) = self.pending.lock() {
                if let Some(w) = p.as_mut() {
                    w.remove(&req.id);
                }
            }
            return Err(TransportError::LinkClosed);
        }
        match rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(reason)) => Err(TransportError::Rejected(reason)),
            Err(_) => Err(TransportError::LinkClosed),
        }
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.out_tx.send(Message::Close(None));
        }
    }
}
