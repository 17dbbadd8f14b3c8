// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Direct (non-resilient) daemon connection.

use std::path::Path;
use std::time::Duration;

use agnt_core::ErrorKind;
use agnt_daemon::env::PROTOCOL_VERSION;
use agnt_wire::{read_line, write_line, Reply, Request};
use tokio::io::BufReader;
use tokio::net::UnixStream;

use crate::error::ClientError;

/// Default per-request deadline.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One IPC connection, already past the `HELLO` handshake.
pub struct DaemonClient {
    reader: BufReader<tokio::net::unix::OwnedReadHalf>,
    writer: tokio::net::unix::OwnedWriteHalf,
    negotiated_version: String,
}

impl DaemonClient {
    /// Dial the socket and run the handshake.
    pub async fn connect(socket_path: &Path) -> Result<Self, ClientError> {
        let stream =
            UnixStream::connect(socket_path).await.map_err(|_| ClientError::NotRunning)?;
        let (read_half, writer) = stream.into_split();
        let mut client = Self {
            reader: BufReader::new(read_half),
            writer,
            negotiated_version: String::new(),
        };

        let hello = Request::new("HELLO", vec![PROTOCOL_VERSION.to_string()]);
        let (_, terminal) = client.roundtrip(&hello, REQUEST_TIMEOUT).await?;
        match terminal {
            Reply::Ok(args) => {
                client.negotiated_version =
                    args.first().cloned().unwrap_or_else(|| PROTOCOL_VERSION.to_string());
                Ok(client)
            }
            Reply::Err { kind: ErrorKind::VersionMismatch, message } => {
                Err(ClientError::VersionMismatch(message))
            }
            Reply::Err { kind, message } => Err(ClientError::Daemon { kind, message }),
            Reply::Event { .. } => Err(ClientError::Cancelled),
        }
    }

    pub fn version(&self) -> &str {
        &self.negotiated_version
    }

    /// Send one request and collect pushed events until the terminal
    /// reply.
    pub async fn roundtrip(
        &mut self,
        request: &Request,
        deadline: Duration,
    ) -> Result<(Vec<Reply>, Reply), ClientError> {
        write_line(&mut self.writer, &request.encode(), deadline).await?;
        let mut events = Vec::new();
        loop {
            let line = read_line(&mut self.reader, deadline).await?;
            let reply = Reply::parse(&line)?;
            if reply.is_terminal() {
                return Ok((events, reply));
            }
            events.push(reply);
        }
    }

    /// Request expecting a plain `OK`; daemon errors become typed errors.
    pub async fn request_ok(
        &mut self,
        request: &Request,
        deadline: Duration,
    ) -> Result<(Vec<Reply>, Vec<String>), ClientError> {
        let (events, terminal) = self.roundtrip(request, deadline).await?;
        match terminal {
            Reply::Ok(args) => Ok((events, args)),
            Reply::Err { kind, message } => Err(ClientError::Daemon { kind, message }),
            Reply::Event { .. } => Err(ClientError::Cancelled),
        }
    }

    /// Heartbeat probe.
    pub async fn ping(&mut self, deadline: Duration) -> bool {
        let ping = Request::new("PING", vec![]);
        matches!(self.roundtrip(&ping, deadline).await, Ok((_, Reply::Ok(_))))
    }

    /// Read one pushed event line (for attached sessions / subscriptions).
    pub async fn next_event(&mut self, deadline: Duration) -> Result<Reply, ClientError> {
        let line = read_line(&mut self.reader, deadline).await?;
        Ok(Reply::parse(&line)?)
    }
}
