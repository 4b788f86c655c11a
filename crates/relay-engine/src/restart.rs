// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator-triggered restart of a unit sitting in `error/`, in the two
//! shapes selected by `task.info.fail_stage`: resetting dispatch retry
//! state, or replaying a processing run from its `as_received/` snapshot.
//! Not a [`StageWorker`](crate::scan_loop::StageWorker) — restart is
//! invoked directly by the admin surface, not picked up by a scan loop.

use crate::error::EngineError;
use chrono::Utc;
use relay_adapters::BookkeeperClient;
use relay_core::{EventKind, FailStage, Process, Stage, Task, TaskEvent, TaskProcessing, UnitRef};
use relay_rules::RuleEvaluator;
use relay_spool::Spool;
use std::path::Path;

/// Drives the two restart shapes against a spool, consulting a
/// [`RuleEvaluator`] to regenerate `process` for a processing-failure
/// restart and emitting a `PROCESS_RESTART` event to a [`BookkeeperClient`]
/// on every successful restart.
pub struct RestartAdmin<E, B> {
    evaluator: E,
    bookkeeper: B,
}

impl<E, B> RestartAdmin<E, B>
where
    E: RuleEvaluator,
    B: BookkeeperClient,
{
    pub fn new(evaluator: E, bookkeeper: B) -> Self {
        RestartAdmin { evaluator, bookkeeper }
    }

    /// Restarts the unit currently at `error/<id>`, dispatching on its
    /// recorded `fail_stage`. `with_settings`, when given, overrides the
    /// rule's processing settings for a "reprocess with settings" restart
    /// and is only meaningful for a processing-failure restart.
    pub async fn restart(&self, spool: &Spool, id: &str, force: bool, with_settings: Option<&serde_json::Value>) -> Result<(), EngineError> {
        let unit = UnitRef::new(Stage::Error, spool.root(), id);
        let task = Task::load(&unit.path)?;
        let task_id = task.id;

        match task.info.fail_stage {
            Some(FailStage::Dispatching) => self.restart_dispatch_failure(spool, &unit, task),
            Some(FailStage::Processing) => self.restart_processing_failure(spool, &unit, task, with_settings),
            Some(FailStage::Routing) | None => Err(EngineError::NoFailStage(id.to_string())),
        }?;

        self.bookkeeper.emit(TaskEvent::new(task_id, EventKind::ProcessRestart, Utc::now())).await?;

        if force {
            self.clear_stale_processing_marker(spool, id)?;
        }
        Ok(())
    }

    fn restart_dispatch_failure(&self, spool: &Spool, unit: &UnitRef, mut task: Task) -> Result<(), EngineError> {
        let Some(dispatch) = task.dispatch.as_mut() else {
            return Err(EngineError::NoFailStage(task.id.as_str().to_string()));
        };
        dispatch.reset_for_restart();
        task.info.fail_stage = None;
        task.save(&unit.path)?;

        let lock = spool.acquire_lock(&unit.path)?;
        spool.move_unit(unit, lock, Stage::Outgoing, task.id.as_str())?;
        Ok(())
    }

    fn restart_processing_failure(
        &self,
        spool: &Spool,
        unit: &UnitRef,
        mut task: Task,
        with_settings: Option<&serde_json::Value>,
    ) -> Result<(), EngineError> {
        let as_received = unit.path.join("as_received");
        if !as_received.is_dir() {
            return Err(EngineError::NoRestartSnapshot(task.id.as_str().to_string()));
        }

        let fresh_dir = spool.stage_dir(Stage::Processing).join(task.id.as_str());
        std::fs::create_dir_all(&fresh_dir).map_err(|source| EngineError::Spool(relay_spool::SpoolError::io(&fresh_dir, source)))?;
        copy_tree(&as_received, &fresh_dir)?;

        task.process = self.regenerate_process(&task.info.applied_rule, with_settings);
        task.info.fail_stage = None;
        task.save(&fresh_dir)?;

        std::fs::remove_dir_all(&unit.path).map_err(|source| EngineError::Spool(relay_spool::SpoolError::io(&unit.path, source)))?;
        Ok(())
    }

    fn regenerate_process(&self, applied_rule: &str, with_settings: Option<&serde_json::Value>) -> Process {
        let Some(rule) = self.evaluator.rule(applied_rule) else {
            return Process::None;
        };
        let mut steps = rule.processing.clone();
        if let Some(overrides) = with_settings.and_then(|value| value.as_object()) {
            for step in &mut steps {
                merge_settings(step, overrides);
            }
        }
        match steps.len() {
            0 => Process::None,
            1 => Process::Single(Box::new(steps.remove(0))),
            _ => Process::Pipeline(steps),
        }
    }

    fn clear_stale_processing_marker(&self, spool: &Spool, id: &str) -> Result<(), EngineError> {
        let unit_path = spool.stage_dir(Stage::Processing).join(id);
        if !unit_path.exists() {
            return Ok(());
        }
        let age = spool.processing_marker_age(&unit_path)?;
        if age.is_some_and(|age| age > std::time::Duration::from_secs(300)) {
            spool.unmark_processing(&unit_path)?;
        }
        Ok(())
    }
}

fn merge_settings(step: &mut TaskProcessing, overrides: &serde_json::Map<String, serde_json::Value>) {
    for (key, value) in overrides {
        step.settings.insert(key.clone(), value.clone());
    }
}

fn copy_tree(src: &Path, dest: &Path) -> Result<(), EngineError> {
    for entry in std::fs::read_dir(src).map_err(|source| EngineError::Spool(relay_spool::SpoolError::io(src, source)))? {
        let entry = entry.map_err(|source| EngineError::Spool(relay_spool::SpoolError::io(src, source)))?;
        let to = dest.join(entry.file_name());
        if entry.path().is_dir() {
            std::fs::create_dir_all(&to).map_err(|source| EngineError::Spool(relay_spool::SpoolError::io(&to, source)))?;
            copy_tree(&entry.path(), &to)?;
        } else {
            std::fs::copy(entry.path(), &to).map_err(|source| EngineError::Spool(relay_spool::SpoolError::io(&to, source)))?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "restart_tests.rs"]
mod tests;
