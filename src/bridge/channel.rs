//! The query seam shared by bridges, the introspector and the table layer.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::client::Bridge;
use super::error::{BridgeError, BridgeResult};
use super::options::{BridgeConfig, QueryOptions};
use super::protocol::QueryResponse;

/// Something that can answer a SQL query with a `{"data": ...}` response.
#[async_trait]
pub trait QueryChannel: Send + Sync {
    /// Send one SQL statement and wait for its response.
    async fn send_query(&self, sql: &str) -> BridgeResult<QueryResponse>;

    /// Release every process behind the channel. Idempotent.
    fn stop(&self);
}

#[async_trait]
impl QueryChannel for Bridge {
    async fn send_query(&self, sql: &str) -> BridgeResult<QueryResponse> {
        self.send_query_with(sql, &QueryOptions::default()).await
    }

    fn stop(&self) {
        Bridge::stop(self)
    }
}

/// Starts a fresh osquery/extension pair for every query and tears it
/// down afterwards.
///
/// Trades startup latency on every call for not keeping processes around
/// between queries. Calls are serialized: the pairs would otherwise fight
/// over the same extension socket.
pub struct EphemeralBridge {
    config: BridgeConfig,
    in_flight: Mutex<()>,
    stopped: AtomicBool,
}

impl EphemeralBridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            in_flight: Mutex::new(()),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }
}

#[async_trait]
impl QueryChannel for EphemeralBridge {
    async fn send_query(&self, sql: &str) -> BridgeResult<QueryResponse> {
        let _turn = self.in_flight.lock().await;
        if self.stopped.load(Ordering::Acquire) {
            return Err(BridgeError::Stopped);
        }

        debug!(query = sql, "starting per-query bridge");
        let bridge = Bridge::start(&self.config).await?;
        let result = bridge.send_query(sql).await;
        bridge.stop();
        result
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }
}
