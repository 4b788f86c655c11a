// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `relayctl status`: per-stage unit counts and halt state.

use crate::client::{ClientError, DaemonClient};
use crate::exit_error::ExitError;
use crate::output::OutputFormat;
use anyhow::bail;
use relay_wire::{Request, Response};
use std::path::Path;

pub async fn handle(socket_path: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let mut client = match DaemonClient::connect(socket_path).await {
        Ok(client) => client,
        Err(ClientError::Connect { .. }) => {
            return Err(ExitError::new(3, format!("relayd is not running (socket: {})", socket_path.display())).into());
        }
        Err(err) => return Err(err.into()),
    };
    let Response::Status { status } = client.call(Request::Status).await? else {
        bail!("daemon sent an unexpected response to Status");
    };

    crate::output::format_or_json(format, &status, || {
        println!("uptime: {}", relay_core::format_elapsed(status.uptime_secs));
        println!("units: {}", status.total_units());
        for (stage, count) in &status.stage_counts {
            println!("  {:<10} {}", stage, count);
        }
        if status.halted_stages.is_empty() {
            println!("halted: none");
        } else {
            let names: Vec<&str> = status.halted_stages.iter().map(|s| s.dir_name()).collect();
            println!("{}: {}", crate::color::header("halted"), names.join(", "));
        }
    })
}
