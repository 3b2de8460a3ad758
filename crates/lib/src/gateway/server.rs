//! Gateway HTTP server: status page, health, and the order-status webhook.

use crate::config::{self, Config};
use crate::credentials::{CredentialStore, FileCredentialStore};
use crate::gateway::page;
use crate::reply::ReplyClassifier;
use crate::session::{MessageSender, SessionManager, SessionStatus};
use crate::transport::{BridgeTransport, InboundEvent, Transport};
use crate::webhook::{RelayOutcome, WebhookRelay};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

const INBOUND_BUFFER: usize = 64;

/// Shared state for the HTTP handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub session: Arc<SessionManager>,
    pub relay: Arc<WebhookRelay>,
}

/// Routes: `GET /` status page, `GET /status` JSON status, `GET /health` probe,
/// `POST /webhook` order-status events.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(status_page))
        .route("/status", get(status_json))
        .route("/health", get(health_http))
        .route("/webhook", post(webhook))
        .with_state(state)
}

/// Run the service with the file credential store and the bridge transport from config.
/// Blocks until shutdown (e.g. Ctrl+C).
/// `config_path` is used to resolve the default credentials directory.
pub async fn run_gateway(config: Config, config_path: PathBuf) -> Result<()> {
    let credentials_dir = config::resolve_credentials_dir(&config, &config_path);
    let store = FileCredentialStore::open(&credentials_dir, &config.transport.session_id)
        .with_context(|| format!("opening credential store in {}", credentials_dir.display()))?;
    log::info!("credential record: {}", store.path().display());
    let transport = BridgeTransport::new(
        config.transport.bridge_url.clone(),
        config.transport.session_id.clone(),
    );
    log::info!("transport bridge: {}", config.transport.bridge_url);
    run_gateway_with(config, Arc::new(store), Arc::new(transport)).await
}

/// Run the service with the given credential store and transport.
pub async fn run_gateway_with(
    config: Config,
    store: Arc<dyn CredentialStore>,
    transport: Arc<dyn Transport>,
) -> Result<()> {
    let bind_addr = format!("{}:{}", config.gateway.bind.trim(), config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;

    let (inbound_tx, mut inbound_rx) = mpsc::channel::<InboundEvent>(INBOUND_BUFFER);
    let session = Arc::new(SessionManager::new(
        transport,
        store,
        &config.transport,
        inbound_tx,
    ));
    let sender: Arc<dyn MessageSender> = session.clone();
    let classifier = Arc::new(ReplyClassifier::new(sender.clone(), &config.survey));
    let relay = Arc::new(WebhookRelay::new(
        sender,
        &config.survey,
        &config.transport.address_domain,
    ));

    let supervisor = session
        .start()
        .await
        .context("loading stored credentials")?;

    // Replies run on their own tasks; this loop never waits on the transport.
    tokio::spawn(async move {
        while let Some(event) = inbound_rx.recv().await {
            let classifier = Arc::clone(&classifier);
            tokio::spawn(async move {
                match classifier.handle(&event).await {
                    Ok(Some(answer)) => {
                        log::info!("reply: answered {:?} from {}", answer, event.sender_address)
                    }
                    Ok(None) => {}
                    Err(e) => log::warn!(
                        "reply: answering {} failed: {}",
                        event.sender_address,
                        e
                    ),
                }
            });
        }
    });

    let state = GatewayState {
        config: Arc::new(config),
        session: session.clone(),
        relay,
    };
    log::info!("listening on {}", bind_addr);
    let served = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server exited");

    session.stop();
    let _ = supervisor.await;
    log::info!("relay stopped");
    served
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("installing Ctrl+C handler failed: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::warn!("installing SIGTERM handler failed: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, stopping session");
}

/// GET / renders the operator status page.
async fn status_page(State(state): State<GatewayState>) -> Html<String> {
    Html(page::render_status(&state.session.current_status()))
}

/// GET /status returns the session status as JSON.
async fn status_json(State(state): State<GatewayState>) -> Json<SessionStatus> {
    Json(state.session.current_status())
}

/// GET /health returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    let status = state.session.current_status();
    Json(json!({
        "runtime": "running",
        "readiness": status.readiness,
        "connectAttempts": state.session.connect_attempts(),
        "port": state.config.gateway.port,
    }))
}

/// POST /webhook relays a completed order to a survey message. Acknowledges with 200 unless
/// the send failed unexpectedly, in which case the error text comes back with 500.
async fn webhook(State(state): State<GatewayState>, body: Bytes) -> Response {
    match state.relay.relay_json(&body).await {
        Ok(outcome) => {
            match outcome {
                RelayOutcome::Sent { address } => log::info!("webhook: survey sent to {}", address),
                RelayOutcome::NotReady => {
                    log::warn!("webhook: session not ready, survey dropped")
                }
                RelayOutcome::Ignored => log::debug!("webhook: event ignored"),
            }
            (StatusCode::OK, "OK").into_response()
        }
        Err(e) => {
            log::warn!("webhook: relay failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
