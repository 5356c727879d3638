//! In-memory [`QueryChannel`] for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::channel::QueryChannel;
use super::error::{BridgeError, BridgeResult};
use super::protocol::QueryResponse;

/// Answers queries from a fixed script and records what was asked.
///
/// # Example
///
/// ```ignore
/// let channel = ScriptedChannel::new()
///     .with_response("SELECT * FROM uptime", json!([{"days": "1"}]));
/// ```
#[derive(Default)]
pub struct ScriptedChannel {
    responses: HashMap<String, Value>,
    failures: HashMap<String, String>,
    queries: Mutex<Vec<String>>,
    stopped: AtomicBool,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `sql` with `{"data": data}`.
    pub fn with_response(mut self, sql: impl Into<String>, data: Value) -> Self {
        self.responses.insert(sql.into(), data);
        self
    }

    /// Fail `sql` with a `NoResponse` error.
    pub fn with_failure(mut self, sql: impl Into<String>, reason: impl Into<String>) -> Self {
        self.failures.insert(sql.into(), reason.into());
        self
    }

    /// Every query received so far, in order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

#[async_trait]
impl QueryChannel for ScriptedChannel {
    async fn send_query(&self, sql: &str) -> BridgeResult<QueryResponse> {
        if self.is_stopped() {
            return Err(BridgeError::Stopped);
        }
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(sql.to_string());
        }

        if let Some(reason) = self.failures.get(sql) {
            return Err(BridgeError::no_response(reason.clone()));
        }
        match self.responses.get(sql) {
            Some(data) => Ok(QueryResponse { data: data.clone() }),
            None => Err(BridgeError::no_response(format!("no scripted response for {sql}"))),
        }
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }
}
