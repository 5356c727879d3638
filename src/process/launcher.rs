//! Spawning external commands on a pseudo-terminal.

use std::io;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, trace};

use super::error::{ProcessResult, ProcessStartError};
use super::pty;

/// A spawned process bound to the master side of its pseudo-terminal.
///
/// `output` yields whatever the process writes to stdout/stderr (plus the
/// terminal's echo of anything written to `input`); `input` feeds its stdin.
pub struct ProcessHandle {
    guard: ProcessGuard,
    output: File,
    input: File,
}

impl ProcessHandle {
    /// Label used in logs and errors ("osquery", "extension", ...).
    pub fn label(&self) -> &str {
        &self.guard.label
    }

    /// OS process id, if the process has not been reaped yet.
    pub fn id(&self) -> Option<u32> {
        self.guard.id()
    }

    /// Split into the lifetime guard and the two ends of the byte channel.
    pub fn into_parts(self) -> (ProcessGuard, File, File) {
        (self.guard, self.output, self.input)
    }

    /// Keep only the guard, draining output in the background.
    ///
    /// Used for processes that are never queried; unread pty output would
    /// otherwise fill the terminal buffer and stall the process.
    pub fn detach(self) -> ProcessGuard {
        let (guard, output, _input) = self.into_parts();
        drain_output(guard.label.clone(), output);
        guard
    }
}

/// Owns the child process; killing it closes the slave side of the pty.
pub struct ProcessGuard {
    label: String,
    child: Child,
    closed: bool,
}

impl ProcessGuard {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Whether the process has already exited on its own.
    pub fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    /// Kill the process. Closing an already closed guard is a no-op.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        match self.child.start_kill() {
            Ok(()) => debug!(process = %self.label, "killed process"),
            // Already exited and reaped.
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => {}
            Err(e) => debug!(process = %self.label, error = %e, "failed to kill process"),
        }
    }
}

/// Split a command line on whitespace into program and arguments.
///
/// There is no quoting: arguments containing spaces cannot be expressed.
pub fn split_command(command_line: &str) -> ProcessResult<(String, Vec<String>)> {
    let mut parts = command_line.split_whitespace().map(str::to_string);
    let program = parts.next().ok_or(ProcessStartError::EmptyCommand)?;
    Ok((program, parts.collect()))
}

/// Start `command_line` attached to a new pseudo-terminal.
///
/// The child runs in its own session with the pty as controlling terminal,
/// so programs that check `isatty` behave as they would interactively.
pub fn launch(label: &str, command_line: &str) -> ProcessResult<ProcessHandle> {
    let (program, args) = split_command(command_line)?;
    debug!(process = label, cmd = %program, args = ?args, "starting process");

    let pair = pty::open_pty().map_err(ProcessStartError::Pty)?;

    let child = {
        let stdin = pair.slave.try_clone().map_err(ProcessStartError::Pty)?;
        let stdout = pair.slave.try_clone().map_err(ProcessStartError::Pty)?;
        let stderr = pair.slave;

        let mut cmd = Command::new(&program);
        cmd.args(&args)
            .stdin(stdin)
            .stdout(stdout)
            .stderr(stderr)
            .kill_on_drop(true);
        // SAFETY: the hook only calls async-signal-safe functions.
        unsafe {
            cmd.pre_exec(pty::become_session_leader);
        }

        // `cmd` (and with it every parent copy of the slave) is dropped at
        // the end of this block, so the master sees a hang-up once the
        // child exits.
        cmd.spawn().map_err(|source| ProcessStartError::Spawn {
            program: program.clone(),
            source,
        })?
    };

    let master = std::fs::File::from(pair.master);
    let input = master.try_clone().map_err(ProcessStartError::Pty)?;

    debug!(process = label, pid = ?child.id(), "process started");

    Ok(ProcessHandle {
        guard: ProcessGuard {
            label: label.to_string(),
            child,
            closed: false,
        },
        output: File::from_std(master),
        input: File::from_std(input),
    })
}

/// Read and discard a process's output, logging each line at trace level.
pub(crate) fn drain_output(label: String, output: File) {
    tokio::spawn(async move {
        let mut reader = BufReader::new(output);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    trace!(process = %label, line = %String::from_utf8_lossy(&line).trim_end(), "output");
                }
                Err(e) => {
                    if !pty::is_hangup(&e) {
                        debug!(process = %label, error = %e, "output drain stopped");
                    }
                    break;
                }
            }
        }
    });
}
