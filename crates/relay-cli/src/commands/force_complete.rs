// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `relayctl force-complete`: completes a study or patient aggregate
//! immediately, bypassing its configured trigger.

use crate::client::DaemonClient;
use anyhow::bail;
use relay_wire::{Request, Response};
use std::path::Path;

pub async fn handle(socket_path: &Path, id: String) -> anyhow::Result<()> {
    let mut client = DaemonClient::connect(socket_path).await?;
    let response = client.call(Request::ForceComplete { id: id.clone() }).await?;
    match response {
        Response::ForceCompleted { id } => {
            println!("{} {}", crate::color::header("force-completed"), id);
            Ok(())
        }
        _ => bail!("daemon sent an unexpected response to ForceComplete"),
    }
}
