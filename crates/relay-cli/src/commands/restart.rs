// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `relayctl restart`: resets a unit sitting in `error/` and moves it back
//! for reprocessing or redispatch.

use crate::client::DaemonClient;
use anyhow::bail;
use relay_wire::{Request, Response};
use serde_json::Value;
use std::path::Path;

pub async fn handle(socket_path: &Path, id: String, force: bool, with_settings: Option<Value>) -> anyhow::Result<()> {
    let mut client = DaemonClient::connect(socket_path).await?;
    let response = client.call(Request::Restart { id: id.clone(), force, with_settings }).await?;
    match response {
        Response::Restarted { id } => {
            println!("{} {}", crate::color::header("restarted"), id);
            Ok(())
        }
        _ => bail!("daemon sent an unexpected response to Restart"),
    }
}
