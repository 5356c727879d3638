//! The long-lived bridge to osquery and its extension.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex as StdMutex, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, BufReader};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::{BridgeError, BridgeResult};
use super::options::{BridgeConfig, BridgeOptions, QueryOptions, Readiness};
use super::protocol::{self, QueryRequest, QueryResponse};
use super::readiness;
use crate::process::{self, ProcessGuard};

type Reader = Box<dyn AsyncBufRead + Send + Unpin>;
type Writer = Box<dyn AsyncWrite + Send + Unpin>;

/// Request/response channel to the extension.
///
/// The reader is kept across queries so bytes already buffered are never
/// lost between exchanges.
struct Channel {
    reader: Reader,
    writer: Writer,
}

/// Connection to a running osquery shell and its JSON extension.
///
/// One request is in flight at a time: callers queue on an async mutex
/// around the channel, so concurrent schema and row queries are serialized.
///
/// # Example
///
/// ```ignore
/// use osquery_bridge::bridge::{Bridge, BridgeConfig};
///
/// let config = BridgeConfig::new(
///     "osqueryi --nodisable_extensions --extensions_socket /tmp/osq.em",
///     "osquery-json-extension --socket /tmp/osq.em",
/// );
/// let bridge = Bridge::start(&config).await?;
/// let response = bridge.send_query("SELECT * FROM uptime").await?;
/// bridge.stop();
/// ```
pub struct Bridge {
    channel: Mutex<Option<Channel>>,
    processes: StdMutex<Vec<ProcessGuard>>,
    lifecycle: CancellationToken,
    options: BridgeOptions,
    /// Requests written but abandoned before their response was read.
    abandoned: AtomicUsize,
}

impl Bridge {
    /// Start osquery, the extension and any auxiliary extensions, then wait
    /// until the extension is ready.
    ///
    /// Processes started before a failure are killed when their guards drop.
    pub async fn start(config: &BridgeConfig) -> BridgeResult<Self> {
        let mut guards = Vec::with_capacity(2 + config.auxiliary_commands.len());

        let shell = process::launch("osquery", &config.osquery_command)
            .map_err(|e| BridgeError::process_start("osquery", e))?;
        guards.push(shell.detach());

        debug!(warmup = ?config.options.shell_warmup, "waiting for osquery to start");
        tokio::time::sleep(config.options.shell_warmup).await;

        info!("starting osquery extension");
        let extension = process::launch("extension", &config.extension_command)
            .map_err(|e| BridgeError::process_start("extension", e))?;
        let (extension_guard, output, input) = extension.into_parts();
        guards.push(extension_guard);

        for (i, command) in config.auxiliary_commands.iter().enumerate() {
            let label = format!("extension-{}", i + 1);
            info!(process = %label, "starting auxiliary extension");
            let handle =
                process::launch(&label, command).map_err(|e| BridgeError::process_start(&label, e))?;
            guards.push(handle.detach());
        }

        let bridge = Self::assemble(
            Box::new(BufReader::new(output)),
            Box::new(input),
            guards,
            config.options.clone(),
        );

        if let Err(e) = bridge.await_ready().await {
            warn!(error = %e, "extension did not become ready");
            bridge.stop();
            return Err(e);
        }

        info!("bridge ready");
        Ok(bridge)
    }

    /// Build a bridge over an existing byte stream pair, without processes.
    ///
    /// No readiness check is performed.
    pub fn over_streams<R, W>(reader: R, writer: W, options: BridgeOptions) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::assemble(
            Box::new(BufReader::new(reader)),
            Box::new(writer),
            Vec::new(),
            options,
        )
    }

    fn assemble(reader: Reader, writer: Writer, processes: Vec<ProcessGuard>, options: BridgeOptions) -> Self {
        Self {
            channel: Mutex::new(Some(Channel { reader, writer })),
            processes: StdMutex::new(processes),
            lifecycle: CancellationToken::new(),
            options,
            abandoned: AtomicUsize::new(0),
        }
    }

    async fn await_ready(&self) -> BridgeResult<()> {
        match &self.options.readiness {
            Readiness::Delay(delay) => {
                debug!(delay = ?delay, "waiting for extension to start");
                tokio::time::sleep(*delay).await;
                Ok(())
            }
            Readiness::Probe(policy) => readiness::probe(self, policy).await,
        }
    }

    /// Send one SQL statement and wait for its response, using the bridge's
    /// default timeout.
    pub async fn send_query(&self, sql: &str) -> BridgeResult<QueryResponse> {
        self.send_query_with(sql, &QueryOptions::default()).await
    }

    /// Send one SQL statement with a per-call timeout and cancellation.
    ///
    /// A query abandoned mid-read (timeout or cancellation) leaves its
    /// response on the channel; see the [`protocol`] module docs.
    pub async fn send_query_with(&self, sql: &str, options: &QueryOptions) -> BridgeResult<QueryResponse> {
        self.exchange(sql, options, |_| true).await
    }

    /// Write `sql` and read responses until `accept` returns true.
    pub(crate) async fn exchange<F>(
        &self,
        sql: &str,
        options: &QueryOptions,
        accept: F,
    ) -> BridgeResult<QueryResponse>
    where
        F: Fn(&QueryResponse) -> bool,
    {
        if self.lifecycle.is_cancelled() {
            return Err(BridgeError::Stopped);
        }

        let timeout = options.effective_timeout(self.options.request_timeout);
        let caller = options.cancellation().cloned().unwrap_or_default();
        let written = AtomicBool::new(false);

        let result = tokio::select! {
            result = self.locked_exchange(sql, &written, accept) => result,
            _ = sleep_or_pending(timeout) => Err(BridgeError::Timeout(timeout.unwrap_or_default())),
            _ = caller.cancelled() => Err(BridgeError::Cancelled),
            _ = self.lifecycle.cancelled() => Err(BridgeError::Stopped),
        };

        if let Err(e) = &result {
            if e.may_desync() && written.load(Ordering::Acquire) {
                self.abandoned.fetch_add(1, Ordering::Relaxed);
                warn!(query = sql, error = %e, "query abandoned; a late response may be read by the next query");
            } else if e.may_desync() {
                debug!(query = sql, error = %e, "query abandoned before it was sent");
            }
        }
        result
    }

    async fn locked_exchange<F>(&self, sql: &str, written: &AtomicBool, accept: F) -> BridgeResult<QueryResponse>
    where
        F: Fn(&QueryResponse) -> bool,
    {
        let mut guard = self.channel.lock().await;
        let channel = guard.as_mut().ok_or(BridgeError::Stopped)?;

        debug!(query = sql, "sending query to extension");
        written.store(true, Ordering::Release);
        protocol::write_request(&mut channel.writer, &QueryRequest::new(sql)).await?;

        loop {
            let response = protocol::read_response(&mut channel.reader, self.options.max_line_bytes).await?;
            if accept(&response) {
                return Ok(response);
            }
            debug!("discarding response that does not belong to this query");
        }
    }

    /// Cancel the lifecycle token and kill every owned process.
    ///
    /// Any read blocked on a process fails once its terminal closes.
    /// Calling `stop` again is a no-op.
    pub fn stop(&self) {
        if self.lifecycle.is_cancelled() {
            return;
        }
        self.lifecycle.cancel();

        let mut processes = self.processes.lock().unwrap_or_else(PoisonError::into_inner);
        for process in processes.iter_mut() {
            process.close();
        }
        processes.clear();

        // An in-flight query still holds the channel; it observes the
        // cancelled token and the channel goes away with the bridge.
        if let Ok(mut channel) = self.channel.try_lock() {
            channel.take();
        }
        info!("bridge stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.lifecycle.is_cancelled()
    }

    /// Whether the bridge is running and none of its processes has exited.
    pub fn is_alive(&self) -> bool {
        if self.is_stopped() {
            return false;
        }
        let mut processes = self.processes.lock().unwrap_or_else(PoisonError::into_inner);
        !processes.iter_mut().any(ProcessGuard::has_exited)
    }

    /// Labels and pids of the processes owned by this bridge.
    pub fn process_ids(&self) -> Vec<(String, Option<u32>)> {
        let processes = self.processes.lock().unwrap_or_else(PoisonError::into_inner);
        processes
            .iter()
            .map(|p| (p.label().to_string(), p.id()))
            .collect()
    }

    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    /// Number of requests that reached the extension but were abandoned
    /// before their response was read. Each may leave a stale answer on
    /// the channel.
    pub fn abandoned_requests(&self) -> usize {
        self.abandoned.load(Ordering::Relaxed)
    }
}

async fn sleep_or_pending(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending().await,
    }
}
