//! Readiness handshake with a freshly started extension.
//!
//! Each probe carries a fresh token (`SELECT '<token>' AS ready;`). A probe
//! that times out is not lost: the extension answers it once it comes up,
//! so later probes skip answers carrying older tokens. By the time the
//! current token comes back every earlier answer has been consumed, leaving
//! the channel clean for real queries.

use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use super::client::Bridge;
use super::error::{BridgeError, BridgeResult};
use super::options::{ProbePolicy, QueryOptions};
use super::protocol::QueryResponse;

const READY_COLUMN: &str = "ready";

pub(crate) fn probe_sql(token: &str) -> String {
    format!("SELECT '{token}' AS {READY_COLUMN};")
}

/// Token echoed back by a probe response, if this is one.
pub(crate) fn probe_token(response: &QueryResponse) -> Option<&str> {
    response
        .data
        .get(0)
        .and_then(|row| row.get(READY_COLUMN))
        .and_then(Value::as_str)
}

pub(crate) async fn probe(bridge: &Bridge, policy: &ProbePolicy) -> BridgeResult<()> {
    let options = QueryOptions::new().with_timeout(policy.probe_timeout);

    for attempt in 1..=policy.attempts {
        let token = Uuid::new_v4().simple().to_string();
        let sql = probe_sql(&token);

        let result = bridge
            .exchange(&sql, &options, |response| probe_token(response) == Some(token.as_str()))
            .await;

        match result {
            Ok(_) => {
                info!(attempt, "extension answered readiness probe");
                return Ok(());
            }
            Err(BridgeError::Timeout(_)) if attempt < policy.attempts => {
                let pause = policy.backoff(attempt);
                debug!(attempt, backoff = ?pause, "readiness probe timed out; retrying");
                tokio::time::sleep(pause).await;
            }
            Err(BridgeError::Timeout(_)) => {}
            // The extension exited or the bridge was stopped: retrying
            // cannot help.
            Err(e) => return Err(e),
        }
    }

    Err(BridgeError::NotReady {
        attempts: policy.attempts,
    })
}
