//! Bridge construction and per-query options.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::protocol::DEFAULT_MAX_LINE_BYTES;

/// Default per-query timeout (30 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default pause between starting osquery and starting the extension.
pub const DEFAULT_SHELL_WARMUP: Duration = Duration::from_millis(250);

/// Everything needed to start a bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Interactive shell (`osqueryi ...`). Started only for the extension
    /// socket it creates; never queried.
    pub osquery_command: String,
    /// The extension that answers JSON queries.
    pub extension_command: String,
    /// Further extensions started after the main one and kept alive with it.
    pub auxiliary_commands: Vec<String>,
    pub options: BridgeOptions,
}

impl BridgeConfig {
    pub fn new(osquery_command: impl Into<String>, extension_command: impl Into<String>) -> Self {
        Self {
            osquery_command: osquery_command.into(),
            extension_command: extension_command.into(),
            auxiliary_commands: Vec::new(),
            options: BridgeOptions::default(),
        }
    }

    pub fn with_auxiliary(mut self, command: impl Into<String>) -> Self {
        self.auxiliary_commands.push(command.into());
        self
    }

    pub fn with_options(mut self, options: BridgeOptions) -> Self {
        self.options = options;
        self
    }
}

/// Tunables for a running bridge.
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// Applied to every query that does not override it. `None` waits forever.
    pub request_timeout: Option<Duration>,
    pub shell_warmup: Duration,
    /// Longest output line kept in memory while looking for a response.
    pub max_line_bytes: usize,
    pub readiness: Readiness,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            shell_warmup: DEFAULT_SHELL_WARMUP,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            readiness: Readiness::default(),
        }
    }
}

/// How the bridge decides the extension can take queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Sleep for a fixed time and hope the extension is up.
    Delay(Duration),
    /// Send tagged probe queries until one is answered.
    Probe(ProbePolicy),
}

impl Default for Readiness {
    fn default() -> Self {
        Self::Probe(ProbePolicy::default())
    }
}

/// Retry schedule for the readiness probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbePolicy {
    pub attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// How long a single probe waits for its answer.
    pub probe_timeout: Duration,
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
            probe_timeout: Duration::from_secs(2),
        }
    }
}

impl ProbePolicy {
    /// Pause after the given failed attempt (1-based), doubling each time.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

#[derive(Debug, Clone, Default)]
enum TimeoutPolicy {
    #[default]
    BridgeDefault,
    After(Duration),
    Never,
}

/// Per-call overrides for [`Bridge::send_query_with`](super::Bridge::send_query_with).
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    timeout: TimeoutPolicy,
    cancel: Option<CancellationToken>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = TimeoutPolicy::After(timeout);
        self
    }

    /// Wait for the response however long it takes.
    pub fn without_timeout(mut self) -> Self {
        self.timeout = TimeoutPolicy::Never;
        self
    }

    /// Abort the query when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub(crate) fn effective_timeout(&self, bridge_default: Option<Duration>) -> Option<Duration> {
        match self.timeout {
            TimeoutPolicy::BridgeDefault => bridge_default,
            TimeoutPolicy::After(timeout) => Some(timeout),
            TimeoutPolicy::Never => None,
        }
    }

    pub(crate) fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancel.as_ref()
    }
}
