// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The admin Unix socket server: accepts one connection at a time,
//! decodes a [`relay_wire::Request`] per round trip, dispatches it to
//! [`crate::admin`], and writes back the matching [`relay_wire::Response`].

use crate::admin;
use relay_adapters::BookkeeperClient;
use relay_rules::RuleEvaluator;
use relay_spool::Spool;
use relay_wire::{read_request, write_response, ProtocolError, Request, Response};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct AdminListener<E, B> {
    socket_path: PathBuf,
    spool: Arc<Spool>,
    evaluator: E,
    bookkeeper: B,
    started_at: Instant,
}

impl<E, B> AdminListener<E, B>
where
    E: RuleEvaluator + Clone + Send + Sync + 'static,
    B: BookkeeperClient + Clone + Send + Sync + 'static,
{
    pub fn new(socket_path: PathBuf, spool: Arc<Spool>, evaluator: E, bookkeeper: B, started_at: Instant) -> Self {
        AdminListener { socket_path, spool, evaluator, bookkeeper, started_at }
    }

    /// Binds the socket, removing a stale one left behind by a crashed
    /// prior instance, and serves connections until `cancellation` fires.
    pub async fn serve(self, cancellation: CancellationToken) -> std::io::Result<()> {
        if self.socket_path.exists() {
            warn!(path = %self.socket_path.display(), "removing stale admin socket");
            std::fs::remove_file(&self.socket_path)?;
        }
        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let listener = UnixListener::bind(&self.socket_path)?;
        info!(path = %self.socket_path.display(), "admin socket listening");

        loop {
            tokio::select! {
                _ = cancellation.cancelled() => {
                    info!("admin listener shutting down");
                    break;
                }
                accepted = listener.accept() => {
                    let (stream, _addr) = accepted?;
                    let spool = Arc::clone(&self.spool);
                    let evaluator = self.evaluator.clone();
                    let bookkeeper = self.bookkeeper.clone();
                    let started_at = self.started_at;
                    tokio::spawn(async move {
                        if let Err(err) = handle_connection(stream, &spool, evaluator, bookkeeper, started_at).await {
                            debug!(error = %err, "admin connection ended");
                        }
                    });
                }
            }
        }

        let _ = std::fs::remove_file(&self.socket_path);
        Ok(())
    }
}

async fn handle_connection<E, B>(
    mut stream: UnixStream,
    spool: &Spool,
    evaluator: E,
    bookkeeper: B,
    started_at: Instant,
) -> Result<(), ProtocolError>
where
    E: RuleEvaluator + Clone,
    B: BookkeeperClient + Clone,
{
    loop {
        let request = match read_request(&mut stream).await {
            Ok(request) => request,
            Err(ProtocolError::Io(io_err)) if io_err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(err) => return Err(err),
        };
        let response = dispatch(&request, spool, evaluator.clone(), bookkeeper.clone(), started_at).await;
        write_response(&mut stream, &response).await?;
    }
}

async fn dispatch<E, B>(request: &Request, spool: &Spool, evaluator: E, bookkeeper: B, started_at: Instant) -> Response
where
    E: RuleEvaluator,
    B: BookkeeperClient,
{
    match request {
        Request::Ping => Response::Pong,
        Request::Hello { version } => Response::Hello { version: version.clone() },
        Request::Status => match admin::status(spool, started_at) {
            Ok(status) => Response::Status { status },
            Err(err) => error_response(err),
        },
        Request::ListUnits { stage } => match admin::list_units(spool, *stage) {
            Ok(units) => Response::Units { units },
            Err(err) => error_response(err),
        },
        Request::UnitDetail { id } => match admin::unit_detail(spool, id) {
            Ok(unit) => Response::Unit { unit: unit.map(Box::new) },
            Err(err) => error_response(err),
        },
        Request::ForceComplete { id } => match admin::force_complete(spool, id) {
            Ok(()) => Response::ForceCompleted { id: id.clone() },
            Err(err) => error_response(err),
        },
        Request::Restart { id, force, with_settings } => {
            match admin::restart(spool, evaluator, bookkeeper, id, *force, with_settings.as_ref()).await {
                Ok(()) => Response::Restarted { id: id.clone() },
                Err(err) => error_response(err),
            }
        }
        Request::Delete { id } => match admin::delete(spool, id) {
            Ok(()) => Response::Deleted { id: id.clone() },
            Err(err) => error_response(err),
        },
    }
}

fn error_response(err: admin::AdminError) -> Response {
    error!(error = %err, "admin request failed");
    Response::Error { message: err.to_string() }
}
