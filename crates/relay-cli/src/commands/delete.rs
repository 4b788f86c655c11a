// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `relayctl delete`: removes a unit outright, typically from `error/` or
//! `discard/`.

use crate::client::DaemonClient;
use anyhow::bail;
use relay_wire::{Request, Response};
use std::path::Path;

pub async fn handle(socket_path: &Path, id: String) -> anyhow::Result<()> {
    let mut client = DaemonClient::connect(socket_path).await?;
    let response = client.call(Request::Delete { id: id.clone() }).await?;
    match response {
        Response::Deleted { id } => {
            println!("{} {}", crate::color::header("deleted"), id);
            Ok(())
        }
        _ => bail!("daemon sent an unexpected response to Delete"),
    }
}
