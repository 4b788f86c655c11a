// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `relayctl list-units` and `relayctl unit-detail`.

use crate::client::DaemonClient;
use crate::commands::StageArg;
use crate::output::OutputFormat;
use anyhow::bail;
use relay_wire::{Request, Response};
use std::io::Write;
use std::path::Path;

pub async fn list(socket_path: &Path, stage: StageArg, format: OutputFormat) -> anyhow::Result<()> {
    let mut client = DaemonClient::connect(socket_path).await?;
    let Response::Units { units } = client.call(Request::ListUnits { stage: stage.into() }).await? else {
        bail!("daemon sent an unexpected response to ListUnits");
    };

    crate::output::handle_list(format, &units, "no units in this stage", |units, out: &mut dyn Write| {
        for unit in units {
            let rule = unit.applied_rule.as_deref().unwrap_or("-");
            let _ = writeln!(
                out,
                "{:<36} {:<10} {:<20} {}",
                unit.id,
                unit.stage.dir_name(),
                rule,
                relay_core::format_elapsed(unit.age_seconds)
            );
        }
    })
}

pub async fn detail(socket_path: &Path, id: String, format: OutputFormat) -> anyhow::Result<()> {
    let mut client = DaemonClient::connect(socket_path).await?;
    let Response::Unit { unit } = client.call(Request::UnitDetail { id: id.clone() }).await? else {
        bail!("daemon sent an unexpected response to UnitDetail");
    };

    let Some(unit) = unit else {
        println!("no unit found with id {id}");
        return Ok(());
    };

    crate::output::format_or_json(format, &unit, || {
        println!("{}: {}", crate::color::header("id"), unit.id);
        println!("stage: {}", unit.stage.dir_name());
        println!("folder: {}", unit.folder_name);
        println!("action: {:?}", unit.task.info.action);
        println!("applied rule: {}", unit.task.info.applied_rule);
        if let Some(fail_stage) = &unit.task.info.fail_stage {
            println!("fail stage: {fail_stage:?}");
        }
    })
}
