//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.relay/config.json`) and environment.
//! Every field has a default, so a missing file yields a runnable service.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP server settings (status page and webhook endpoint).
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Chat transport bridge and session settings.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Survey texts and the order-status markers that trigger them.
    #[serde(default)]
    pub survey: SurveyConfig,
}

/// HTTP bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Listen port (default 3000). Overridden by the PORT env.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0"; the webhook producer is usually remote).
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    3000
}

fn default_gateway_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// Transport bridge connection and session identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportConfig {
    /// WebSocket URL of the chat transport bridge.
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,

    /// Session identity; keys the credential record.
    #[serde(default = "default_session_id")]
    pub session_id: String,

    /// Where credential records live. Relative paths are resolved against the config file's
    /// parent. Default: `credentials` next to the config file.
    #[serde(default)]
    pub credentials_dir: Option<PathBuf>,

    /// Domain appended to a normalized phone number to form a transport address.
    #[serde(default = "default_address_domain")]
    pub address_domain: String,

    /// Base URL the raw pairing code is wrapped into so a browser can render it as an image.
    /// Empty publishes the raw code.
    #[serde(default = "default_qr_render_url")]
    pub qr_render_url: String,

    /// What to do between a resumable closure and the next connection attempt.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

fn default_bridge_url() -> String {
    "ws://127.0.0.1:8787/ws".to_string()
}

fn default_session_id() -> String {
    "default".to_string()
}

fn default_address_domain() -> String {
    "s.whatsapp.net".to_string()
}

fn default_qr_render_url() -> String {
    "https://api.qrserver.com/v1/create-qr-code/".to_string()
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bridge_url: default_bridge_url(),
            session_id: default_session_id(),
            credentials_dir: None,
            address_domain: default_address_domain(),
            qr_render_url: default_qr_render_url(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Reconnect policy. `immediate` retries at once with no cap; `backoff` doubles the delay per
/// consecutive closure up to `maxDelayMs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum ReconnectConfig {
    Immediate,
    #[serde(rename_all = "camelCase")]
    Backoff {
        #[serde(default = "default_initial_delay_ms")]
        initial_delay_ms: u64,
        #[serde(default = "default_max_delay_ms")]
        max_delay_ms: u64,
    },
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        ReconnectConfig::Immediate
    }
}

impl ReconnectConfig {
    /// Delay before the given consecutive retry (1-based).
    pub fn delay(&self, consecutive: u32) -> Duration {
        match *self {
            ReconnectConfig::Immediate => Duration::ZERO,
            ReconnectConfig::Backoff {
                initial_delay_ms,
                max_delay_ms,
            } => {
                let shift = consecutive.saturating_sub(1).min(20);
                let ms = initial_delay_ms.saturating_mul(1u64 << shift);
                Duration::from_millis(ms.min(max_delay_ms))
            }
        }
    }
}

/// Survey texts and completion markers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyConfig {
    /// Order statuses that mean "transaction completed". Integer statuses compare by their
    /// decimal string.
    #[serde(default = "default_completed_statuses")]
    pub completed_statuses: Vec<String>,

    /// Survey sent after a completed order. `{name}` is replaced with the customer's name.
    #[serde(default = "default_survey_message")]
    pub message: String,

    /// Reply to option "1". `{reviewLink}` is replaced with `review_link`.
    #[serde(default = "default_positive_reply")]
    pub positive_reply: String,

    /// Reply to option "2".
    #[serde(default = "default_negative_reply")]
    pub negative_reply: String,

    /// Public review page linked from the positive reply.
    #[serde(default = "default_review_link")]
    pub review_link: String,
}

fn default_completed_statuses() -> Vec<String> {
    vec!["completed".to_string()]
}

fn default_survey_message() -> String {
    "Hi {name}! Thanks for your order. How was your experience?\n\n\
     1 - Great, everything was fine\n\
     2 - I had a problem\n\n\
     Reply with 1 or 2."
        .to_string()
}

fn default_positive_reply() -> String {
    "Thank you! We're glad you enjoyed it. It would mean a lot if you left us a review: {reviewLink}"
        .to_string()
}

fn default_negative_reply() -> String {
    "We're sorry about that. Our team has been notified and will get in touch with you shortly."
        .to_string()
}

fn default_review_link() -> String {
    "https://g.page/r/review".to_string()
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            completed_statuses: default_completed_statuses(),
            message: default_survey_message(),
            positive_reply: default_positive_reply(),
            negative_reply: default_negative_reply(),
            review_link: default_review_link(),
        }
    }
}

/// Parse a port override; blank or invalid values are ignored.
fn parse_port(raw: Option<String>) -> Option<u16> {
    raw.and_then(|s| s.trim().parse::<u16>().ok())
}

/// Resolve the listen port: env PORT overrides config.
pub fn resolve_port(config: &Config) -> u16 {
    match parse_port(std::env::var("PORT").ok()) {
        Some(port) => port,
        None => config.gateway.port,
    }
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("RELAY_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".relay").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

fn config_parent(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Resolve the credentials directory: `transport.credentialsDir` if set (relative paths resolved
/// against the config file's parent), otherwise `credentials` next to the config file.
pub fn resolve_credentials_dir(config: &Config, config_path: &Path) -> PathBuf {
    let parent = config_parent(config_path);
    match &config.transport.credentials_dir {
        Some(d) if !d.as_os_str().is_empty() => {
            if d.is_absolute() {
                d.clone()
            } else {
                parent.join(d)
            }
        }
        _ => parent.join("credentials"),
    }
}

/// Load config from the given path (or the default path). Missing file => default config.
/// The PORT env is applied on top of the file.
/// Returns the config and the path that was used (for resolving the credentials directory).
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let mut config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    config.gateway.port = resolve_port(&config);
    Ok((config, path))
}
