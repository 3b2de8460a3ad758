//! Bridge WebSocket protocol types.
//!
//! Requests: `{ "type": "req", "id", "method", "params" }` with methods `connect` and `send`.
//! Responses: `{ "type": "res", "id", "ok", "error"? }`.
//! Events: `{ "type": "event", "event", "payload" }` with events `creds.update`,
//! `connection.update` and `message`.

use crate::credentials::Credentials;
use crate::transport::event::{
    ConnectionState, ConnectionUpdate, DisconnectReason, InboundEvent, TransportEvent,
};
use serde::{Deserialize, Serialize};

pub const METHOD_CONNECT: &str = "connect";
pub const METHOD_SEND: &str = "send";

pub const EVENT_CREDS_UPDATE: &str = "creds.update";
pub const EVENT_CONNECTION_UPDATE: &str = "connection.update";
pub const EVENT_MESSAGE: &str = "message";

/// Wire request: `{ "type": "req", "id", "method", "params" }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeRequest {
    #[serde(rename = "type")]
    pub typ: String,
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl BridgeRequest {
    /// Build a request with a fresh id.
    pub fn new(method: &str, params: serde_json::Value) -> Self {
        Self {
            typ: "req".to_string(),
            id: uuid::Uuid::new_v4().to_string(),
            method: method.to_string(),
            params,
        }
    }
}

/// Any frame the bridge sends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BridgeFrame {
    Res {
        id: String,
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Event {
        event: String,
        #[serde(default)]
        payload: serde_json::Value,
    },
}

/// Params for `connect`: session identity and stored credentials (null when pairing).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    pub session: String,
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

/// Params for `send`: deliver one text message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendParams {
    pub to: String,
    pub text: String,
}

/// Payload of `connection.update`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionUpdatePayload {
    /// "connecting", "open" or "close".
    #[serde(default)]
    pub connection: Option<String>,
    #[serde(default)]
    pub qr: Option<String>,
    /// Close code; see `DisconnectReason::from_code`.
    #[serde(default)]
    pub status_code: Option<u16>,
}

/// Payload of `message`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub remote_jid: String,
    #[serde(default)]
    pub from_me: bool,
    #[serde(default)]
    pub text: Option<String>,
}

fn decode_connection_update(p: ConnectionUpdatePayload) -> ConnectionUpdate {
    let state = match p.connection.as_deref() {
        Some("open") => Some(ConnectionState::Open),
        Some("connecting") => Some(ConnectionState::Connecting),
        Some("close") => Some(ConnectionState::Close(
            p.status_code
                .map(DisconnectReason::from_code)
                .unwrap_or(DisconnectReason::ConnectionClosed),
        )),
        _ => None,
    };
    ConnectionUpdate { state, qr: p.qr }
}

/// Translate a bridge event into a transport event. Unknown events, malformed payloads and
/// credential updates without a payload yield None.
pub fn decode_event(event: &str, payload: serde_json::Value) -> Option<TransportEvent> {
    match event {
        EVENT_CREDS_UPDATE if payload.is_null() => None,
        EVENT_CREDS_UPDATE => Some(TransportEvent::CredentialsUpdated(Credentials(payload))),
        EVENT_CONNECTION_UPDATE => serde_json::from_value::<ConnectionUpdatePayload>(payload)
            .ok()
            .map(|p| TransportEvent::ConnectionUpdate(decode_connection_update(p))),
        EVENT_MESSAGE => serde_json::from_value::<MessagePayload>(payload)
            .ok()
            .map(|m| {
                TransportEvent::Message(InboundEvent {
                    sender_address: m.remote_jid,
                    is_self_originated: m.from_me,
                    body_text: m.text.unwrap_or_default(),
                })
            }),
        _ => None,
    }
}
