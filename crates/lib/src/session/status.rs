//! Session readiness and the pairing artifact published to operators.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Readiness {
    Initializing,
    AwaitingPairing,
    Ready,
    Disconnected,
}

impl Readiness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Readiness::Initializing => "initializing",
            Readiness::AwaitingPairing => "awaitingPairing",
            Readiness::Ready => "ready",
            Readiness::Disconnected => "disconnected",
        }
    }
}

/// Snapshot returned by `SessionManager::current_status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub readiness: Readiness,
    /// Display-ready pairing code (an image URL, or the raw code when no renderer is set).
    pub pairing_artifact: Option<String>,
    /// When `readiness` last changed.
    pub since: DateTime<Utc>,
}

impl SessionStatus {
    pub fn initializing() -> Self {
        Self {
            readiness: Readiness::Initializing,
            pairing_artifact: None,
            since: Utc::now(),
        }
    }
}

/// Wrap a raw pairing code into an image URL under `render_base`. Falls back to the raw code
/// when the base is empty or not a URL.
pub fn render_pairing_artifact(render_base: &str, raw: &str) -> String {
    let base = render_base.trim();
    if base.is_empty() {
        return raw.to_string();
    }
    match reqwest::Url::parse_with_params(base, &[("size", "300x300"), ("data", raw)]) {
        Ok(url) => url.to_string(),
        Err(e) => {
            log::debug!("qr render url {:?} unusable ({}); publishing raw code", base, e);
            raw.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_is_url_encoded_into_renderer() {
        let out = render_pairing_artifact(
            "https://api.qrserver.com/v1/create-qr-code/",
            "2@Ab+c/d==,x",
        );
        assert!(out.starts_with("https://api.qrserver.com/v1/create-qr-code/?size=300x300&data="));
        assert!(out.ends_with("2%40Ab%2Bc%2Fd%3D%3D%2Cx"));
    }

    #[test]
    fn empty_or_invalid_renderer_publishes_raw_code() {
        assert_eq!(render_pairing_artifact("", "2@abc"), "2@abc");
        assert_eq!(render_pairing_artifact("not a url", "2@abc"), "2@abc");
    }

    #[test]
    fn status_serializes_camel_case() {
        let status = SessionStatus {
            readiness: Readiness::AwaitingPairing,
            pairing_artifact: Some("x".to_string()),
            since: Utc::now(),
        };
        let v = serde_json::to_value(&status).unwrap();
        assert_eq!(v["readiness"], "awaitingPairing");
        assert_eq!(v["pairingArtifact"], "x");
        assert_eq!(Readiness::AwaitingPairing.as_str(), "awaitingPairing");
    }
}
