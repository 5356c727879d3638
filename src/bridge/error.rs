//! Bridge error types.

use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::process::ProcessStartError;

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors that can occur while talking to the osquery processes.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// A named process could not be launched.
    #[error("failed to start {process}: {source}")]
    ProcessStart {
        /// Which process ("osquery", "extension", ...).
        process: String,
        #[source]
        source: ProcessStartError,
    },

    /// Writing to or reading from a process channel failed.
    #[error("transport error: {0}")]
    Transport(#[source] io::Error),

    /// The channel closed before a response line appeared.
    #[error("no valid response received: {reason}")]
    NoResponse {
        /// What ended the read.
        reason: String,
    },

    /// A response line exceeded the configured maximum line length.
    #[error("response line exceeds {limit} bytes")]
    ResponseTooLarge { limit: usize },

    /// The request could not be serialized.
    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),

    /// No response within the request timeout.
    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    /// The caller cancelled the query.
    #[error("query cancelled")]
    Cancelled,

    /// The bridge has been stopped.
    #[error("bridge is stopped")]
    Stopped,

    /// The extension never answered the readiness probe.
    #[error("extension not ready after {attempts} probe attempts")]
    NotReady { attempts: u32 },
}

impl BridgeError {
    pub(crate) fn process_start(process: impl Into<String>, source: ProcessStartError) -> Self {
        Self::ProcessStart {
            process: process.into(),
            source,
        }
    }

    pub(crate) fn no_response(reason: impl Into<String>) -> Self {
        Self::NoResponse {
            reason: reason.into(),
        }
    }

    /// Whether the process channel is unusable after this error.
    ///
    /// The bridge never reconnects on its own; callers seeing this should
    /// tear the bridge down and construct a new one.
    pub fn is_channel_lost(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::NoResponse { .. } | Self::Stopped
        )
    }

    /// Whether this error may leave an unread response on the channel.
    pub fn may_desync(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Cancelled)
    }
}
