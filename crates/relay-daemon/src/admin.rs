// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Admin operations served over the Unix socket: status, unit lookup,
//! force-complete, restart, delete. Kept separate from [`crate::listener`]
//! so the wire framing and the operations themselves can be tested
//! independently.

use relay_adapters::BookkeeperClient;
use relay_core::{Stage, Task, UnitRef};
use relay_engine::restart::RestartAdmin;
use relay_rules::RuleEvaluator;
use relay_spool::Spool;
use relay_wire::{DaemonStatus, UnitDetail, UnitSummary};
use std::collections::BTreeMap;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Spool(#[from] relay_spool::SpoolError),
    #[error(transparent)]
    Task(#[from] relay_core::TaskError),
    #[error(transparent)]
    Engine(#[from] relay_engine::EngineError),
    #[error("no unit found with id {0}")]
    NotFound(String),
}

pub fn status(spool: &Spool, started_at: Instant) -> Result<DaemonStatus, AdminError> {
    let mut stage_counts = BTreeMap::new();
    let mut halted_stages = Vec::new();
    for stage in Stage::ALL {
        stage_counts.insert(stage.dir_name().to_string(), spool.folder_names(stage)?.len());
        if spool.is_halted(stage) {
            halted_stages.push(stage);
        }
    }
    Ok(DaemonStatus { uptime_secs: started_at.elapsed().as_secs(), stage_counts, halted_stages })
}

pub fn list_units(spool: &Spool, stage: Stage) -> Result<Vec<UnitSummary>, AdminError> {
    let mut units = Vec::new();
    for folder in spool.folder_names(stage)? {
        let unit = UnitRef::new(stage, spool.root(), folder);
        let task = Task::load(&unit.path).ok();
        let age_seconds = std::fs::metadata(&unit.path)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0);
        units.push(UnitSummary {
            id: task.as_ref().map(|t| t.id.as_str().to_string()).unwrap_or_else(|| unit.folder.clone()),
            stage,
            folder_name: unit.folder,
            applied_rule: task.map(|t| t.info.applied_rule),
            age_seconds,
        });
    }
    Ok(units)
}

/// Finds the unit carrying task id `id`, searching every stage's
/// top-level folders. `studies/` and `patients/` folders only carry a
/// `task.json` once their aggregate has merged at least one member, so an
/// unmerged study/patient scope is not independently addressable by id.
pub fn find_unit(spool: &Spool, id: &str) -> Result<Option<UnitRef>, AdminError> {
    for stage in Stage::ALL {
        for folder in spool.folder_names(stage)? {
            let unit = UnitRef::new(stage, spool.root(), &folder);
            if unit.folder == id {
                return Ok(Some(unit));
            }
            if let Ok(task) = Task::load(&unit.path) {
                if task.id.as_str() == id {
                    return Ok(Some(unit));
                }
            }
        }
    }
    Ok(None)
}

pub fn unit_detail(spool: &Spool, id: &str) -> Result<Option<UnitDetail>, AdminError> {
    let Some(unit) = find_unit(spool, id)? else { return Ok(None) };
    let task = Task::load(&unit.path)?;
    Ok(Some(UnitDetail { id: task.id.as_str().to_string(), stage: unit.stage, folder_name: unit.folder, task }))
}

pub fn force_complete(spool: &Spool, id: &str) -> Result<(), AdminError> {
    let unit = find_unit(spool, id)?.ok_or_else(|| AdminError::NotFound(id.to_string()))?;
    if !matches!(unit.stage, Stage::Studies | Stage::Patients) {
        return Err(AdminError::NotFound(id.to_string()));
    }
    spool.mark_complete_force(&unit.path)?;
    Ok(())
}

pub fn delete(spool: &Spool, id: &str) -> Result<(), AdminError> {
    let unit = find_unit(spool, id)?.ok_or_else(|| AdminError::NotFound(id.to_string()))?;
    let lock = spool.acquire_lock(&unit.path)?;
    std::fs::remove_dir_all(&unit.path).map_err(|source| relay_spool::SpoolError::io(&unit.path, source))?;
    // The unit folder is gone; the lock file went with it, so there is
    // nothing left for `UnitLock::release` to remove.
    std::mem::forget(lock);
    Ok(())
}

pub async fn restart<E: RuleEvaluator, B: BookkeeperClient>(
    spool: &Spool,
    evaluator: E,
    bookkeeper: B,
    id: &str,
    force: bool,
    with_settings: Option<&serde_json::Value>,
) -> Result<(), AdminError> {
    RestartAdmin::new(evaluator, bookkeeper).restart(spool, id, force, with_settings).await?;
    Ok(())
}
