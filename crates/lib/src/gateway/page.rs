//! Operator status page: one of three renderings keyed on session readiness.

use crate::session::{Readiness, SessionStatus};

const REFRESH_SECS: u32 = 5;

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, refresh: bool, body: &str) -> String {
    let refresh_tag = if refresh {
        format!(r#"<meta http-equiv="refresh" content="{}">"#, REFRESH_SECS)
    } else {
        String::new()
    };
    format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\">{}<title>{}</title></head>\
         <body style=\"font-family:sans-serif;text-align:center;margin-top:3em\">{}</body></html>\n",
        refresh_tag, title, body
    )
}

/// Render the page for the given status.
pub fn render_status(status: &SessionStatus) -> String {
    match (status.readiness, status.pairing_artifact.as_deref()) {
        (Readiness::Ready, _) => layout(
            "Relay: connected",
            false,
            "<h1>Connected</h1><p>The chat session is ready to send surveys.</p>",
        ),
        (Readiness::AwaitingPairing, Some(artifact)) => {
            let escaped = escape_html(artifact);
            let code = if artifact.starts_with("https://") || artifact.starts_with("http://") {
                format!(r#"<img src="{}" alt="pairing code" width="300" height="300">"#, escaped)
            } else {
                format!("<pre>{}</pre>", escaped)
            };
            layout(
                "Relay: scan to pair",
                true,
                &format!(
                    "<h1>Scan to pair</h1>{}<p>Open the chat app, go to linked devices and scan this code.</p>",
                    code
                ),
            )
        }
        (readiness, _) => layout(
            "Relay: initializing",
            true,
            &format!(
                "<h1>Initializing&hellip;</h1><p>Session state: {}. This page refreshes automatically.</p>",
                readiness.as_str()
            ),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(readiness: Readiness, artifact: Option<&str>) -> SessionStatus {
        SessionStatus {
            readiness,
            pairing_artifact: artifact.map(str::to_string),
            since: chrono::Utc::now(),
        }
    }

    #[test]
    fn ready_renders_success_without_refresh() {
        let html = render_status(&status(Readiness::Ready, None));
        assert!(html.contains("Connected"));
        assert!(!html.contains("refresh"));
    }

    #[test]
    fn pairing_renders_escaped_image() {
        let html = render_status(&status(
            Readiness::AwaitingPairing,
            Some("https://qr.test/?size=300x300&data=2%40abc"),
        ));
        assert!(html.contains(r#"<img src="https://qr.test/?size=300x300&amp;data=2%40abc""#));
    }

    #[test]
    fn raw_pairing_code_is_shown_as_text() {
        let html = render_status(&status(Readiness::AwaitingPairing, Some("2@<abc>")));
        assert!(html.contains("<pre>2@&lt;abc&gt;</pre>"));
        assert!(!html.contains("<img"));
    }

    #[test]
    fn other_states_render_placeholder() {
        for r in [Readiness::Initializing, Readiness::Disconnected] {
            let html = render_status(&status(r, None));
            assert!(html.contains("Initializing"));
            assert!(html.contains(r.as_str()));
        }
    }
}
