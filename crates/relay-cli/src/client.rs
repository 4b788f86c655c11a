// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Talks to `relayd`'s admin Unix socket: one request, one response, per
//! round trip, using the same length-prefixed JSON framing the daemon
//! reads and writes.

use relay_wire::{read_message, write_message, Request, Response};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::net::UnixStream;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("could not connect to relayd at {path}: {source}")]
    Connect { path: PathBuf, source: std::io::Error },

    #[error(transparent)]
    Protocol(#[from] relay_wire::ProtocolError),

    #[error("daemon returned an error: {0}")]
    Daemon(String),

    #[error("daemon sent an unexpected response for this request")]
    UnexpectedResponse,
}

pub struct DaemonClient {
    stream: UnixStream,
}

impl DaemonClient {
    pub async fn connect(path: &Path) -> Result<Self, ClientError> {
        let stream = UnixStream::connect(path)
            .await
            .map_err(|source| ClientError::Connect { path: path.to_path_buf(), source })?;
        Ok(DaemonClient { stream })
    }

    pub async fn call(&mut self, request: Request) -> Result<Response, ClientError> {
        let payload = relay_wire::encode(&request)?;
        write_message(&mut self.stream, &payload).await?;
        let payload = read_message(&mut self.stream).await?;
        let response: Response = relay_wire::decode(&payload)?;
        if let Response::Error { message } = response {
            return Err(ClientError::Daemon(message));
        }
        Ok(response)
    }
}
