//! Integration test: start the gateway on a free port, GET /health, assert health JSON.
//! No transport bridge is running, so the session keeps retrying in the background.
//! The server task is left running when the test ends.

use lib::config::Config;
use lib::gateway;
use std::path::PathBuf;
use std::time::Duration;

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

fn temp_config_dir() -> (PathBuf, PathBuf) {
    let dir = std::env::temp_dir().join(format!("relay-gateway-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create config dir");
    let config_path = dir.join("config.json");
    (dir, config_path)
}

#[tokio::test]
async fn gateway_health_http_responds_with_running() {
    let port = free_port();
    let unused_bridge_port = free_port();
    let (temp_dir, config_path) = temp_config_dir();

    let mut config = Config::default();
    config.gateway.port = port;
    config.gateway.bind = "127.0.0.1".to_string();
    config.transport.bridge_url = format!("ws://127.0.0.1:{}/ws", unused_bridge_port);
    config.transport.credentials_dir = Some(temp_dir.join("credentials"));

    let gateway_handle = tokio::spawn(async move {
        let _ = gateway::run_gateway(config, config_path).await;
    });

    let url = format!("http://127.0.0.1:{}/health", port);
    let client = reqwest::Client::new();
    let mut last_err = None;
    for _ in 0..100 {
        match client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let json: serde_json::Value = resp.json().await.expect("parse JSON");
                assert_eq!(json.get("runtime").and_then(|v| v.as_str()), Some("running"));
                assert_eq!(json.get("port").and_then(|v| v.as_u64()), Some(port as u64));
                let readiness = json.get("readiness").and_then(|v| v.as_str());
                assert!(
                    matches!(readiness, Some("initializing") | Some("disconnected")),
                    "unexpected readiness {:?}",
                    readiness
                );
                assert!(json.get("connectAttempts").and_then(|v| v.as_u64()).is_some());
                return;
            }
            Ok(_) => {}
            Err(e) => last_err = Some(e),
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    gateway_handle.abort();
    panic!(
        "GET {} did not return 200 with health JSON within 5s; last error: {:?}",
        url, last_err
    );
}

#[tokio::test]
async fn webhook_while_not_ready_is_acknowledged() {
    let port = free_port();
    let unused_bridge_port = free_port();
    let (temp_dir, config_path) = temp_config_dir();

    let mut config = Config::default();
    config.gateway.port = port;
    config.gateway.bind = "127.0.0.1".to_string();
    config.transport.bridge_url = format!("ws://127.0.0.1:{}/ws", unused_bridge_port);
    config.transport.credentials_dir = Some(temp_dir.join("credentials"));

    tokio::spawn(async move {
        let _ = gateway::run_gateway(config, config_path).await;
    });

    let url = format!("http://127.0.0.1:{}/webhook", port);
    let client = reqwest::Client::new();
    for _ in 0..100 {
        let sent = client
            .post(&url)
            .header("content-type", "application/json")
            .body(r#"{"customer":{"phone":"+1 555 0100","name":"Ana"},"status":"completed"}"#)
            .send()
            .await;
        if let Ok(resp) = sent {
            assert_eq!(resp.status(), reqwest::StatusCode::OK);
            assert_eq!(resp.text().await.unwrap(), "OK");
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("POST {} never answered", url);
}
