//! End-to-end bridge tests over real pseudo-terminals.
//!
//! `cat` stands in for the osquery shell and a small `sh` script for the
//! JSON extension.

#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use osquery_bridge::bridge::{
    Bridge, BridgeConfig, BridgeError, BridgeOptions, EphemeralBridge, ProbePolicy, QueryChannel,
    QueryOptions, Readiness,
};

fn fake_extension() -> String {
    format!(
        "sh {}/tests/fixtures/fake_extension.sh",
        env!("CARGO_MANIFEST_DIR")
    )
}

fn fast_options() -> BridgeOptions {
    BridgeOptions {
        request_timeout: Some(Duration::from_secs(10)),
        shell_warmup: Duration::from_millis(50),
        readiness: Readiness::Probe(ProbePolicy {
            attempts: 20,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(500),
            probe_timeout: Duration::from_secs(2),
        }),
        ..BridgeOptions::default()
    }
}

fn config() -> BridgeConfig {
    BridgeConfig::new("cat", fake_extension()).with_options(fast_options())
}

fn answered_query(rows: &serde_json::Value) -> &str {
    rows[0]["query"].as_str().unwrap_or_default()
}

#[tokio::test]
async fn test_start_query_stop() {
    let bridge = Bridge::start(&config()).await.unwrap();
    assert!(bridge.is_alive());

    let labels: Vec<String> = bridge.process_ids().into_iter().map(|(l, _)| l).collect();
    assert_eq!(labels, vec!["osquery", "extension"]);

    let response = bridge.send_query("SELECT * FROM uptime").await.unwrap();
    assert_eq!(answered_query(&response.data), "SELECT * FROM uptime");

    let rows = bridge
        .send_query("SELECT pid FROM processes")
        .await
        .unwrap()
        .into_rows()
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["query"], "SELECT pid FROM processes");

    bridge.stop();
    assert!(!bridge.is_alive());
    assert!(matches!(
        bridge.send_query("SELECT 1").await,
        Err(BridgeError::Stopped)
    ));
}

#[tokio::test]
async fn test_concurrent_queries_are_not_interleaved() {
    let bridge = Arc::new(Bridge::start(&config()).await.unwrap());

    let queries: Vec<String> = (0..8).map(|i| format!("SELECT {i} AS n")).collect();
    let futures = queries.iter().map(|sql| {
        let bridge = Arc::clone(&bridge);
        async move { bridge.send_query(sql).await }
    });
    let responses = futures::future::join_all(futures).await;

    for (sql, response) in queries.iter().zip(responses) {
        assert_eq!(answered_query(&response.unwrap().data), sql);
    }
    bridge.stop();
}

#[tokio::test]
async fn test_delay_readiness() {
    let options = BridgeOptions {
        readiness: Readiness::Delay(Duration::from_millis(300)),
        ..fast_options()
    };
    let bridge = Bridge::start(&BridgeConfig::new("cat", fake_extension()).with_options(options))
        .await
        .unwrap();

    let response = bridge
        .send_query_with("SELECT * FROM os_version", &QueryOptions::new().with_timeout(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(answered_query(&response.data), "SELECT * FROM os_version");
    bridge.stop();
}

#[tokio::test]
async fn test_auxiliary_extensions_are_owned() {
    let config = config().with_auxiliary("cat");
    let bridge = Bridge::start(&config).await.unwrap();

    assert_eq!(bridge.process_ids().len(), 3);
    bridge.stop();
    assert!(bridge.process_ids().is_empty());
}

#[tokio::test]
async fn test_missing_extension_binary() {
    let config = BridgeConfig::new("cat", "/nonexistent/osquery-extension --socket /tmp/x")
        .with_options(fast_options());
    let err = Bridge::start(&config).await.err().unwrap();

    assert!(matches!(err, BridgeError::ProcessStart { ref process, .. } if process == "extension"));
}

#[tokio::test]
async fn test_extension_that_exits_is_not_ready() {
    let options = BridgeOptions {
        readiness: Readiness::Probe(ProbePolicy {
            attempts: 2,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(10),
            probe_timeout: Duration::from_millis(300),
        }),
        ..fast_options()
    };
    let config = BridgeConfig::new("cat", "true").with_options(options);

    assert!(Bridge::start(&config).await.is_err());
}

#[tokio::test]
async fn test_bridge_as_query_channel() {
    let channel: Arc<dyn QueryChannel> = Arc::new(Bridge::start(&config()).await.unwrap());

    let response = channel.send_query("SELECT * FROM users").await.unwrap();
    assert_eq!(answered_query(&response.data), "SELECT * FROM users");

    channel.stop();
    assert!(channel.send_query("SELECT * FROM users").await.is_err());
}

#[tokio::test]
async fn test_per_query_bridge_round_trips() {
    let bridge = EphemeralBridge::new(config());

    for sql in ["SELECT 1", "SELECT 2"] {
        let response = bridge.send_query(sql).await.unwrap();
        assert_eq!(answered_query(&response.data), sql);
    }

    bridge.stop();
    assert!(matches!(
        bridge.send_query("SELECT 3").await,
        Err(BridgeError::Stopped)
    ));
}
