//! Wire format spoken with the osquery extension.
//!
//! A request is one compact JSON object followed by a newline:
//!
//! ```text
//! {"query":"SELECT * FROM processes"}
//! ```
//!
//! The extension's terminal output mixes startup banners, log lines and the
//! pty's echo of our own request with the answer. The answer is the first
//! line that looks like `{"data": ...}` and parses as such; everything else
//! is noise.
//!
//! # Framing fragility
//!
//! There is no request id and no resynchronization. A read that is abandoned
//! (timeout, cancellation) leaves its response unread on the channel, and
//! the next exchange will take that stale line as its own answer.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace, warn};

use super::error::{BridgeError, BridgeResult};
use crate::process::pty;

/// Default upper bound for a single output line (512 KiB).
pub const DEFAULT_MAX_LINE_BYTES: usize = 512 * 1024;

/// A single row of a query result.
pub type Row = serde_json::Map<String, Value>;

/// Request sent to the extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryRequest {
    #[serde(rename = "query")]
    pub sql: String,
}

impl QueryRequest {
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into() }
    }
}

/// Response received from the extension.
///
/// `data` is passed through untouched: usually an array of row objects.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QueryResponse {
    pub data: Value,
}

impl QueryResponse {
    /// Interpret `data` as an array of row objects.
    pub fn into_rows(self) -> Result<Vec<Row>, serde_json::Error> {
        serde_json::from_value(self.data)
    }
}

/// Serialize a request into its wire line, including the trailing newline.
pub fn encode_request(request: &QueryRequest) -> BridgeResult<Vec<u8>> {
    let mut line = serde_json::to_vec(request).map_err(BridgeError::Encode)?;
    line.push(b'\n');
    Ok(line)
}

/// Write one request line and flush it.
pub async fn write_request<W>(writer: &mut W, request: &QueryRequest) -> BridgeResult<()>
where
    W: AsyncWrite + Unpin,
{
    let line = encode_request(request)?;
    writer
        .write_all(&line)
        .await
        .map_err(BridgeError::Transport)?;
    writer.flush().await.map_err(BridgeError::Transport)
}

/// Read lines until one carries a response.
///
/// Fails with [`BridgeError::NoResponse`] when the stream ends or the
/// process hangs up first, [`BridgeError::Transport`] on any other read
/// error, and [`BridgeError::ResponseTooLarge`] when the response line
/// itself exceeds `max_line_bytes`.
pub async fn read_response<R>(reader: &mut R, max_line_bytes: usize) -> BridgeResult<QueryResponse>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let mut skipped = 0usize;

    loop {
        let read = match read_bounded_line(reader, &mut line, max_line_bytes).await {
            Ok(read) => read,
            Err(e) if pty::is_hangup(&e) => {
                return Err(BridgeError::no_response(format!(
                    "process hung up after {skipped} non-response lines"
                )));
            }
            Err(e) => return Err(BridgeError::Transport(e)),
        };

        match read {
            LineRead::Eof => {
                return Err(BridgeError::no_response(format!(
                    "channel closed after {skipped} non-response lines"
                )));
            }
            LineRead::Overlong => {
                if looks_like_response(&line) {
                    return Err(BridgeError::ResponseTooLarge {
                        limit: max_line_bytes,
                    });
                }
                debug!(limit = max_line_bytes, "discarding overlong output line");
                skipped += 1;
            }
            LineRead::Line => {
                let text = trim_line_end(&line);
                if !looks_like_response(text) {
                    trace!(line = %String::from_utf8_lossy(text), "skipping output line");
                    skipped += 1;
                    continue;
                }
                match serde_json::from_slice::<QueryResponse>(text) {
                    Ok(response) => {
                        debug!(bytes = text.len(), skipped, "received response");
                        return Ok(response);
                    }
                    Err(e) => {
                        warn!(error = %e, "discarding malformed response line");
                        skipped += 1;
                    }
                }
            }
        }
    }
}

/// Cheap check that a line opens with the response object's `data` key.
fn looks_like_response(line: &[u8]) -> bool {
    match line.trim_ascii_start().strip_prefix(b"{") {
        Some(rest) => rest.trim_ascii_start().starts_with(b"\"data\""),
        None => false,
    }
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[derive(Debug, PartialEq, Eq)]
enum LineRead {
    Eof,
    Line,
    /// The line was longer than the limit; only its head was kept.
    Overlong,
}

/// Read one line into `buf`, keeping at most `max` bytes of it.
///
/// The remainder of an overlong line is consumed and dropped so the next
/// call starts on a fresh line.
async fn read_bounded_line<R>(reader: &mut R, buf: &mut Vec<u8>, max: usize) -> std::io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut overlong = false;

    loop {
        let (used, done) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(match (buf.is_empty(), overlong) {
                    (_, true) => LineRead::Overlong,
                    (true, false) => LineRead::Eof,
                    (false, false) => LineRead::Line,
                });
            }

            let (chunk, done) = match available.iter().position(|&b| b == b'\n') {
                Some(i) => (&available[..=i], true),
                None => (available, false),
            };

            if !overlong {
                let room = max.saturating_sub(buf.len());
                if chunk.len() > room {
                    buf.extend_from_slice(&chunk[..room]);
                    overlong = true;
                } else {
                    buf.extend_from_slice(chunk);
                }
            }
            (chunk.len(), done)
        };

        reader.consume(used);
        if done {
            return Ok(if overlong { LineRead::Overlong } else { LineRead::Line });
        }
    }
}
