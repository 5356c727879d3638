//! Bridge behaviour over an in-memory stream that looks like a pty.

use std::sync::Arc;
use std::time::Duration;

use osquery_bridge::bridge::{Bridge, BridgeError, BridgeOptions, QueryOptions};
use serde_json::json;
use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

/// How the fake extension reacts to each request.
#[derive(Clone, Copy)]
enum Peer {
    /// Echo the request, print noise, then answer with the SQL text.
    Noisy,
    /// Answer with a row padded to the given size.
    Padded(usize),
    /// Read requests and never answer.
    Silent,
}

fn bridge_with_peer(peer: Peer, options: BridgeOptions) -> Bridge {
    let (bridge_reader, mut peer_writer) = duplex(1024 * 1024);
    let (bridge_writer, peer_reader) = duplex(64 * 1024);

    tokio::spawn(async move {
        let mut lines = BufReader::new(peer_reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let request: serde_json::Value = serde_json::from_str(&line).unwrap_or_default();
            let sql = request["query"].as_str().unwrap_or_default().to_string();

            let output = match peer {
                Peer::Noisy => format!(
                    "{line}\r\nosquery> \r\n{{\"database\": \"not a response\"}}\r\n{{\"data\" truncated\r\n{}\r\n",
                    json!({"data": [{"sql": sql}], "status": "ok"})
                ),
                Peer::Padded(size) => format!("{}\n", json!({"data": [{"pad": "x".repeat(size)}]})),
                Peer::Silent => continue,
            };
            if peer_writer.write_all(output.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    Bridge::over_streams(bridge_reader, bridge_writer, options)
}

#[tokio::test]
async fn test_noise_and_echo_are_skipped() {
    let bridge = bridge_with_peer(Peer::Noisy, BridgeOptions::default());

    for sql in ["SELECT * FROM uptime", "SELECT name FROM osquery_registry"] {
        let rows = bridge.send_query(sql).await.unwrap().into_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["sql"], sql);
    }
}

#[tokio::test]
async fn test_concurrent_queries_match_their_responses() {
    let bridge = Arc::new(bridge_with_peer(Peer::Noisy, BridgeOptions::default()));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let bridge = Arc::clone(&bridge);
            tokio::spawn(async move {
                let sql = format!("SELECT {i} AS n");
                let response = bridge.send_query(&sql).await.unwrap();
                (sql, response)
            })
        })
        .collect();

    for handle in handles {
        let (sql, response) = handle.await.unwrap();
        assert_eq!(response.data[0]["sql"], sql.as_str());
    }
}

#[tokio::test]
async fn test_large_response_within_limit() {
    let bridge = bridge_with_peer(Peer::Padded(100_000), BridgeOptions::default());
    let rows = bridge.send_query("SELECT * FROM big").await.unwrap().into_rows().unwrap();
    assert_eq!(rows[0]["pad"].as_str().unwrap().len(), 100_000);
}

#[tokio::test]
async fn test_response_over_limit() {
    let options = BridgeOptions {
        max_line_bytes: 1024,
        ..BridgeOptions::default()
    };
    let bridge = bridge_with_peer(Peer::Padded(4096), options);

    let err = bridge.send_query("SELECT * FROM big").await.unwrap_err();
    assert!(matches!(err, BridgeError::ResponseTooLarge { limit: 1024 }));
}

#[tokio::test]
async fn test_per_call_timeout_overrides_default() {
    let options = BridgeOptions {
        request_timeout: None,
        ..BridgeOptions::default()
    };
    let bridge = bridge_with_peer(Peer::Silent, options);

    let started = tokio::time::Instant::now();
    let err = bridge
        .send_query_with("SELECT 1", &QueryOptions::new().with_timeout(Duration::from_millis(100)))
        .await
        .unwrap_err();

    assert!(matches!(err, BridgeError::Timeout(d) if d == Duration::from_millis(100)));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_caller_cancellation() {
    let bridge = bridge_with_peer(Peer::Silent, BridgeOptions::default());
    let token = CancellationToken::new();

    let cancel = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let err = bridge
        .send_query_with("SELECT 1", &QueryOptions::new().with_cancellation(token))
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Cancelled));
    assert!(!bridge.is_stopped());
}
