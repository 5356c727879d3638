//! External process launching.
//!
//! Every process the bridge talks to is started on its own pseudo-terminal:
//! osquery and its extensions detect non-interactive stdio and change their
//! behaviour otherwise. A [`ProcessHandle`] bundles the child with the
//! master side of its terminal, which serves as a duplex byte channel.

mod error;
mod launcher;
pub(crate) mod pty;

pub use error::{ProcessResult, ProcessStartError};
pub use launcher::{launch, split_command, ProcessGuard, ProcessHandle};
