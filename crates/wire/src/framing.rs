// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Async line framing with deadlines.
//!
//! One message per line. The read side goes through a `take` adapter so a
//! peer sending an endless unterminated line is cut off at the cap while
//! reading, not after; ring-buffer dumps are the largest legitimate
//! payload and fit comfortably under it.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::message::WireError;

/// Upper bound on a single encoded line, newline included (1 MiB).
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Read one line within `deadline`. Returns the line without its newline.
pub async fn read_line<R>(
    reader: &mut BufReader<R>,
    deadline: Duration,
) -> Result<String, WireError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut limited = reader.take(MAX_LINE_BYTES as u64);
    let n = tokio::time::timeout(deadline, limited.read_until(b'\n', &mut buf))
        .await
        .map_err(|_| WireError::Timeout)??;
    if n == 0 {
        return Err(WireError::ConnectionClosed);
    }
    // The adapter stops at the cap; a full buffer with no newline means
    // the line kept going.
    if buf.len() >= MAX_LINE_BYTES && buf.last() != Some(&b'\n') {
        return Err(WireError::Oversized(MAX_LINE_BYTES));
    }
    let line = String::from_utf8(buf)
        .map_err(|e| WireError::BadEscape(String::from_utf8_lossy(e.as_bytes()).into_owned()))?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Write one already-encoded line (terminator included) plus newline.
pub async fn write_line<W>(
    writer: &mut W,
    line: &str,
    deadline: Duration,
) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    let mut bytes = Vec::with_capacity(line.len() + 1);
    bytes.extend_from_slice(line.as_bytes());
    bytes.push(b'\n');
    tokio::time::timeout(deadline, async {
        writer.write_all(&bytes).await?;
        writer.flush().await
    })
    .await
    .map_err(|_| WireError::Timeout)??;
    Ok(())
}

#[cfg(test)]
#[path = "framing_tests.rs"]
mod tests;
