//! Session lifecycle manager: owns the single transport link and supervises reconnection.
//!
//! All state changes happen on the supervisor task in response to transport events, one event
//! at a time. Other flows only read the status and call `send`.

use crate::config::{ReconnectConfig, TransportConfig};
use crate::credentials::{CredentialStore, Credentials};
use crate::error::{CredentialError, SendError};
use crate::session::status::{render_pairing_artifact, Readiness, SessionStatus};
use crate::session::MessageSender;
use crate::transport::{
    Connection, ConnectionState, DisconnectReason, InboundEvent, Transport, TransportEvent,
};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Notify, RwLock};
use tokio::task::JoinHandle;

/// Minimum wait after the link itself could not be opened (bridge unreachable).
const LINK_RETRY_FLOOR: Duration = Duration::from_secs(2);

/// How one link ended.
enum LinkOutcome {
    Closed(DisconnectReason),
    Stopped,
}

pub struct SessionManager {
    transport: Arc<dyn Transport>,
    store: Arc<dyn CredentialStore>,
    reconnect: ReconnectConfig,
    qr_render_url: String,
    inbound_tx: mpsc::Sender<InboundEvent>,
    status_tx: watch::Sender<SessionStatus>,
    connection: RwLock<Option<Arc<dyn Connection>>>,
    connect_attempts: AtomicU64,
    running: AtomicBool,
    stop_signal: Notify,
}

impl SessionManager {
    /// Inbound messages are forwarded to `inbound_tx` in arrival order. The supervisor never
    /// waits on that channel: when it is full, the message is dropped with a warning.
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
        config: &TransportConfig,
        inbound_tx: mpsc::Sender<InboundEvent>,
    ) -> Self {
        let (status_tx, _) = watch::channel(SessionStatus::initializing());
        Self {
            transport,
            store,
            reconnect: config.reconnect,
            qr_render_url: config.qr_render_url.clone(),
            inbound_tx,
            status_tx,
            connection: RwLock::new(None),
            connect_attempts: AtomicU64::new(0),
            running: AtomicBool::new(false),
            stop_signal: Notify::new(),
        }
    }

    /// Load stored credentials and spawn the supervisor. Returns as soon as the supervisor is
    /// running; the connection is established in the background. Call once.
    pub async fn start(self: &Arc<Self>) -> Result<JoinHandle<()>, CredentialError> {
        let credentials = self.store.load().await?;
        if credentials.is_none() {
            log::info!("session: no stored credentials, a pairing code will be published");
        }
        self.running.store(true, Ordering::SeqCst);
        let this = Arc::clone(self);
        Ok(tokio::spawn(async move {
            this.supervise(credentials).await;
        }))
    }

    /// Current readiness and pairing artifact.
    pub fn current_status(&self) -> SessionStatus {
        self.status_tx.borrow().clone()
    }

    /// Receiver that observes every status change.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    /// Number of connection attempts so far, including the first.
    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    /// Send a text message. Fails with `NotReady` without touching the transport unless the
    /// session is Ready.
    pub async fn send(&self, address: &str, text: &str) -> Result<(), SendError> {
        if self.current_status().readiness != Readiness::Ready {
            return Err(SendError::NotReady);
        }
        let connection = self
            .connection
            .read()
            .await
            .clone()
            .ok_or(SendError::NotReady)?;
        connection.send_text(address, text).await?;
        Ok(())
    }

    /// Stop supervising and close the live link. The supervisor task then exits.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.stop_signal.notify_one();
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn transition(&self, readiness: Readiness, pairing_artifact: Option<String>) {
        let mut changed = false;
        self.status_tx.send_modify(|s| {
            if s.readiness != readiness {
                s.since = Utc::now();
                changed = true;
            }
            s.readiness = readiness;
            s.pairing_artifact = pairing_artifact;
        });
        if changed {
            log::info!("session: {}", readiness.as_str());
        }
    }

    /// Sleep for `delay` unless stopped first.
    async fn pause(&self, delay: Duration) {
        if delay.is_zero() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = self.stop_signal.notified() => {}
        }
    }

    async fn supervise(&self, mut credentials: Option<Credentials>) {
        let mut consecutive: u32 = 0;
        while self.is_running() {
            let attempt = self.connect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
            self.transition(Readiness::Initializing, None);
            log::debug!("session: opening transport link (attempt {})", attempt);

            let connected = tokio::select! {
                r = self.transport.connect(credentials.clone()) => r,
                _ = self.stop_signal.notified() => break,
            };
            let link = match connected {
                Ok(link) => link,
                Err(e) => {
                    consecutive = consecutive.saturating_add(1);
                    self.transition(Readiness::Disconnected, None);
                    let delay = self.reconnect.delay(consecutive).max(LINK_RETRY_FLOOR);
                    log::warn!("session: {}; retrying in {:?}", e, delay);
                    self.pause(delay).await;
                    continue;
                }
            };

            *self.connection.write().await = Some(Arc::clone(&link.connection));
            let outcome = self
                .drive(link.events, &mut credentials, &mut consecutive)
                .await;
            *self.connection.write().await = None;
            link.connection.close();

            match outcome {
                LinkOutcome::Stopped => break,
                LinkOutcome::Closed(_) if !self.is_running() => break,
                LinkOutcome::Closed(reason) if reason.is_resumable() => {
                    consecutive = consecutive.saturating_add(1);
                    let delay = self.reconnect.delay(consecutive);
                    log::info!(
                        "session: connection closed: {}; reconnecting (attempt {})",
                        reason,
                        attempt + 1
                    );
                    self.pause(delay).await;
                }
                LinkOutcome::Closed(reason) => {
                    log::warn!(
                        "session: connection closed: {}; not reconnecting. \
                         Clear credentials (`relay logout`) and restart to pair again",
                        reason
                    );
                    break;
                }
            }
        }
        self.running.store(false, Ordering::SeqCst);
        if self.current_status().readiness != Readiness::Disconnected {
            self.transition(Readiness::Disconnected, None);
        }
        log::debug!("session: supervisor stopped");
    }

    /// Process one link's events in order until it closes or the session is stopped.
    async fn drive(
        &self,
        mut events: mpsc::Receiver<TransportEvent>,
        credentials: &mut Option<Credentials>,
        consecutive: &mut u32,
    ) -> LinkOutcome {
        loop {
            let event = tokio::select! {
                ev = events.recv() => ev,
                _ = self.stop_signal.notified() => {
                    self.transition(Readiness::Disconnected, None);
                    return LinkOutcome::Stopped;
                }
            };
            let Some(event) = event else { break };
            match event {
                TransportEvent::CredentialsUpdated(creds) => {
                    if let Err(e) = self.store.save(&creds).await {
                        log::error!("session: persisting rotated credentials failed: {}", e);
                    }
                    *credentials = Some(creds);
                }
                TransportEvent::ConnectionUpdate(update) => {
                    if let Some(qr) = update.qr {
                        self.publish_pairing_code(&qr);
                    }
                    match update.state {
                        Some(ConnectionState::Open) => {
                            *consecutive = 0;
                            self.transition(Readiness::Ready, None);
                        }
                        Some(ConnectionState::Close(reason)) => {
                            self.transition(Readiness::Disconnected, None);
                            return LinkOutcome::Closed(reason);
                        }
                        Some(ConnectionState::Connecting) | None => {}
                    }
                }
                TransportEvent::Message(msg) => match self.inbound_tx.try_send(msg) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(msg)) => {
                        log::warn!(
                            "session: inbound queue full, dropping message from {}",
                            msg.sender_address
                        );
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        log::debug!("session: inbound receiver gone, dropping message");
                    }
                },
            }
        }
        self.transition(Readiness::Disconnected, None);
        LinkOutcome::Closed(DisconnectReason::ConnectionLost)
    }

    fn publish_pairing_code(&self, raw: &str) {
        let readiness = self.current_status().readiness;
        if !matches!(
            readiness,
            Readiness::Initializing | Readiness::AwaitingPairing
        ) {
            log::debug!("session: ignoring pairing code while {}", readiness.as_str());
            return;
        }
        let artifact = render_pairing_artifact(&self.qr_render_url, raw);
        self.transition(Readiness::AwaitingPairing, Some(artifact));
        log::info!("session: pairing code published; open the status page to scan it");
    }
}

#[async_trait]
impl MessageSender for SessionManager {
    async fn send(&self, address: &str, text: &str) -> Result<(), SendError> {
        SessionManager::send(self, address, text).await
    }
}
