//! Process launch errors.

use std::io;
use thiserror::Error;

/// Result type for process launching.
pub type ProcessResult<T> = Result<T, ProcessStartError>;

/// A named process could not be started.
#[derive(Error, Debug)]
pub enum ProcessStartError {
    /// The command line contained no program.
    #[error("empty command line")]
    EmptyCommand,

    /// The pseudo-terminal could not be allocated.
    #[error("failed to allocate pseudo-terminal: {0}")]
    Pty(#[source] io::Error),

    /// The program could not be executed.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
}
