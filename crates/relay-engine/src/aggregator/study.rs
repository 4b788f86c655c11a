// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Collects series belonging to a study, detects completion, and emits a
//! study-level task once the aggregate is ready.

use crate::config::ConfigSnapshot;
use crate::error::EngineError;
use crate::scan_loop::{StageOutcome, StageWorker};
use crate::tags;
use chrono::Utc;
use parking_lot::RwLock;
use relay_adapters::BookkeeperClient;
use relay_core::{
    Action, DispatchInfo, EventKind, FailStage, ForceCompleteAction, Process, Stage, StudyCompleteTrigger, StudyInfo,
    TargetName, Task, TaskEvent, TaskId, TaskInfo, TriggerScope, UidType, UnitRef,
};
use relay_rules::RuleEvaluator;
use relay_spool::Spool;

pub struct StudyAggregator<E, B> {
    evaluator: E,
    bookkeeper: B,
    complete_trigger_seconds: RwLock<u64>,
    forcecomplete_trigger_seconds: RwLock<u64>,
}

impl<E, B> StudyAggregator<E, B>
where
    E: RuleEvaluator,
    B: BookkeeperClient,
{
    pub fn new(evaluator: E, bookkeeper: B, complete_trigger_seconds: u64, forcecomplete_trigger_seconds: u64) -> Self {
        StudyAggregator {
            evaluator,
            bookkeeper,
            complete_trigger_seconds: RwLock::new(complete_trigger_seconds),
            forcecomplete_trigger_seconds: RwLock::new(forcecomplete_trigger_seconds),
        }
    }

    /// Folds any series subfolder not yet accounted for into the study
    /// task, creating the task on first arrival.
    fn merge_new_series(&self, spool: &Spool, study_dir: &std::path::Path, study_uid: &str) -> Result<Option<Task>, EngineError> {
        let mut task = match Task::load(study_dir) {
            Ok(task) => Some(task),
            Err(relay_core::TaskError::NotFound(_)) => None,
            Err(error) => return Err(error.into()),
        };

        let now = Utc::now();
        for series_name in spool_subfolders(study_dir)? {
            let series_dir = study_dir.join(&series_name);
            let series_tags = match tags::read_series_tags(&series_dir) {
                Ok(tags) => tags,
                Err(_) => continue,
            };
            let series_uid = series_tags.get("SeriesInstanceUID").cloned().unwrap_or_else(|| series_name.clone());
            let description = series_tags.get("SeriesDescription").cloned().unwrap_or_else(|| series_uid.clone());

            match &mut task {
                Some(task) => {
                    let Some(study) = task.study.as_mut() else { continue };
                    if study.received_series_uid.iter().any(|uid| uid == &series_uid) {
                        continue;
                    }
                    study.received_series.push(description);
                    study.received_series_uid.push(series_uid);
                    study.last_receive_time = now;
                }
                None => {
                    let series_task = Task::load(&series_dir).ok();
                    let (applied_rule, triggered_rules, mrn, acc) = match &series_task {
                        Some(t) => (t.info.applied_rule.clone(), t.info.triggered_rules.clone(), t.info.mrn.clone(), t.info.acc.clone()),
                        None => (String::new(), Default::default(), None, None),
                    };
                    let rule = self.evaluator.rule(&applied_rule);
                    let complete_trigger = rule.and_then(|r| r.study_complete_trigger).unwrap_or(StudyCompleteTrigger::Timeout);
                    let complete_required_series = rule.and_then(|r| r.study_complete_required_series.clone());
                    let complete_force_action = rule.and_then(|r| r.study_complete_force_action).unwrap_or(ForceCompleteAction::Ignore);

                    task = Some(Task {
                        id: TaskId::new(),
                        parent_id: None,
                        info: TaskInfo {
                            action: Action::Discard,
                            applied_rule,
                            triggered_rules,
                            uid: study_uid.to_string(),
                            uid_type: UidType::Study,
                            mrn,
                            acc,
                            fail_stage: None,
                        },
                        study: Some(StudyInfo {
                            study_uid: study_uid.to_string(),
                            creation_time: now,
                            last_receive_time: now,
                            complete_trigger,
                            complete_required_series,
                            complete_force: false,
                            complete_force_action,
                            received_series: vec![description],
                            received_series_uid: vec![series_uid],
                        }),
                        patient: None,
                        process: Process::None,
                        dispatch: None,
                    });
                }
            }
        }

        Ok(task)
    }

    fn is_complete(&self, spool: &Spool, study_dir: &std::path::Path, task: &Task) -> Result<bool, EngineError> {
        let Some(study) = task.study.as_ref() else { return Ok(false) };
        if study.complete_force || spool.has_complete_force_marker(study_dir) {
            return Ok(true);
        }
        match study.complete_trigger {
            StudyCompleteTrigger::Timeout => {
                let trigger_seconds = self
                    .evaluator
                    .rule(&task.info.applied_rule)
                    .and_then(|r| r.study_complete_trigger_seconds)
                    .unwrap_or(*self.complete_trigger_seconds.read());
                let elapsed = Utc::now().signed_duration_since(study.last_receive_time).num_seconds().max(0) as u64;
                if elapsed < trigger_seconds {
                    return Ok(false);
                }
                Ok(!self.has_pending_incoming_series(spool, &study.study_uid)?)
            }
            StudyCompleteTrigger::ReceivedSeries => {
                let required = study.complete_required_series.as_deref().unwrap_or("");
                Ok(self.evaluator.parse_completion_series(required, &study.received_series)?)
            }
        }
    }

    fn has_pending_incoming_series(&self, spool: &Spool, study_uid: &str) -> Result<bool, EngineError> {
        for folder in spool.folder_names(relay_core::Stage::Incoming)? {
            let dir = spool.stage_dir(relay_core::Stage::Incoming).join(&folder);
            if let Ok(series_tags) = tags::read_series_tags(&dir) {
                if series_tags.get("StudyInstanceUID").is_some_and(|uid| uid == study_uid) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// A study aggregate that cannot proceed because of a corrupted
    /// on-disk task record or a rule-evaluation error: recorded with
    /// `fail_stage = routing` and moved to `error/`, mirroring the series
    /// router's catch-its-own-exceptions contract. Builds a placeholder
    /// task when no merged task exists yet so the failure is still
    /// traceable.
    async fn fail_aggregation(
        &self,
        spool: &Spool,
        unit: &UnitRef,
        study_uid: &str,
        task: Option<Task>,
        reason: &str,
    ) -> Result<StageOutcome, EngineError> {
        let mut task = task.unwrap_or_else(|| Task {
            id: TaskId::new(),
            parent_id: None,
            info: TaskInfo {
                action: Action::Discard,
                applied_rule: String::new(),
                triggered_rules: Default::default(),
                uid: study_uid.to_string(),
                uid_type: UidType::Study,
                mrn: None,
                acc: None,
                fail_stage: None,
            },
            study: None,
            patient: None,
            process: Process::None,
            dispatch: None,
        });
        task.info.fail_stage = Some(FailStage::Routing);
        task.save(&unit.path)?;
        self.bookkeeper
            .emit(TaskEvent::new(task.id, EventKind::TaskError, Utc::now()).with_fail_stage(FailStage::Routing).with_message(reason))
            .await?;
        let lock = spool.acquire_lock(&unit.path)?;
        spool.move_unit(unit, lock, Stage::Error, task.id.as_str())?;
        Ok(StageOutcome::Handled)
    }
}

fn spool_subfolders(dir: &std::path::Path) -> Result<Vec<String>, EngineError> {
    let mut names = Vec::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => return Ok(names),
        Err(source) => return Err(EngineError::Spool(relay_spool::SpoolError::io(dir, source))),
    };
    for entry in entries {
        let entry = entry.map_err(|source| EngineError::Spool(relay_spool::SpoolError::io(dir, source)))?;
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

#[async_trait::async_trait]
impl<E, B> StageWorker for StudyAggregator<E, B>
where
    E: RuleEvaluator,
    B: BookkeeperClient,
{
    fn stage(&self) -> Stage {
        Stage::Studies
    }

    fn refresh(&self, snapshot: &ConfigSnapshot) {
        *self.complete_trigger_seconds.write() = snapshot.study_complete_trigger_seconds;
        *self.forcecomplete_trigger_seconds.write() = snapshot.study_forcecomplete_trigger_seconds;
    }

    /// The study aggregator owns its own readiness rule (a study folder is
    /// ready to be looked at as soon as it holds an unmerged series
    /// subfolder, even before it has a top-level `task.json`), so it
    /// bypasses [`StageWorker::scan_ready`]'s `task.json`-or-payload check.
    fn scan_ready(&self, spool: &Spool) -> Result<Vec<UnitRef>, EngineError> {
        let mut ready = Vec::new();
        for folder in spool.folder_names(Stage::Studies)? {
            let unit = UnitRef::new(Stage::Studies, spool.root(), folder);
            if unit.path.join(".lock").exists() {
                continue;
            }
            ready.push(unit);
        }
        Ok(ready)
    }

    async fn process_unit(&self, spool: &Spool, unit: UnitRef) -> Result<StageOutcome, EngineError> {
        // No lock is held while tag parsing and task merging can fail, so a
        // corrupted task record routes straight to `error/` via
        // `fail_aggregation` instead of leaving a dangling `.lock` behind.
        let study_uid = unit.folder.split('_').next().unwrap_or(&unit.folder).to_string();
        let merged = match self.merge_new_series(spool, &unit.path, &study_uid) {
            Ok(merged) => merged,
            Err(error) => return self.fail_aggregation(spool, &unit, &study_uid, None, &error.to_string()).await,
        };
        let Some(mut task) = merged else {
            return Ok(StageOutcome::Skipped);
        };

        let lock = spool.acquire_lock(&unit.path)?;
        task.save(&unit.path)?;

        let forcecomplete_trigger_seconds = self
            .evaluator
            .rule(&task.info.applied_rule)
            .and_then(|r| r.study_forcecomplete_trigger_seconds)
            .unwrap_or(*self.forcecomplete_trigger_seconds.read());
        let study_force_timed_out = task.study.as_ref().is_some_and(|study| {
            Utc::now().signed_duration_since(study.creation_time).num_seconds().max(0) as u64 >= forcecomplete_trigger_seconds
        });
        if study_force_timed_out {
            let action = task.study.as_ref().map(|study| study.complete_force_action);
            match action {
                Some(ForceCompleteAction::Ignore) => {
                    if let Some(study) = task.study.as_mut() {
                        study.complete_force = true;
                    }
                    task.save(&unit.path)?;
                }
                Some(ForceCompleteAction::Proceed) => {
                    if !spool.has_complete_force_marker(&unit.path) {
                        spool.mark_complete_force(&unit.path)?;
                        lock.release()?;
                        return Ok(StageOutcome::Handled);
                    }
                }
                Some(ForceCompleteAction::Discard) => {
                    self.bookkeeper.emit(TaskEvent::new(task.id, EventKind::TaskDiscard, Utc::now())).await?;
                    spool.move_unit(&unit, lock, Stage::Discard, task.id.as_str())?;
                    return Ok(StageOutcome::Handled);
                }
                None => {}
            }
        }

        let complete = match self.is_complete(spool, &unit.path, &task) {
            Ok(complete) => complete,
            Err(error) => {
                lock.release()?;
                return self.fail_aggregation(spool, &unit, &study_uid, Some(task), &error.to_string()).await;
            }
        };
        if !complete {
            lock.release()?;
            return Ok(StageOutcome::Skipped);
        }

        let rule = self.evaluator.rule(&task.info.applied_rule);
        let trigger_scope = rule.map(|r| r.trigger_scope).unwrap_or(TriggerScope::Study);

        if trigger_scope == TriggerScope::Patient {
            let mrn = task.info.mrn.clone().unwrap_or_else(|| study_uid.clone());
            let dest_folder = format!("{mrn}_{}/{study_uid}", task.info.applied_rule);
            task.save(&unit.path)?;
            spool.move_unit(&unit, lock, Stage::Patients, &dest_folder)?;
            return Ok(StageOutcome::Handled);
        }

        let action = rule.map(|r| r.action).unwrap_or(Action::Discard);
        let process = match rule {
            None => Process::None,
            Some(rule) => match rule.processing.len() {
                0 => Process::None,
                1 => Process::Single(Box::new(rule.processing[0].clone())),
                _ => Process::Pipeline(rule.processing.clone()),
            },
        };
        let dispatch = rule
            .and_then(|r| r.target_name.clone())
            .filter(|_| action.dispatches())
            .map(|name| DispatchInfo::new(TargetName::One(name)));

        task.info.action = action;
        task.process = process;
        task.dispatch = dispatch;
        task.save(&unit.path)?;

        let dest_stage = match action {
            Action::Route => Stage::Outgoing,
            Action::Process | Action::Both => Stage::Processing,
            Action::Notification => Stage::Success,
            Action::Discard => Stage::Discard,
        };
        if matches!(action, Action::Notification | Action::Discard) {
            let kind = if action == Action::Discard { EventKind::TaskDiscard } else { EventKind::TaskSuccess };
            self.bookkeeper.emit(TaskEvent::new(task.id, kind, Utc::now())).await?;
        }
        spool.move_unit(&unit, lock, dest_stage, task.id.as_str())?;
        Ok(StageOutcome::Handled)
    }
}

#[cfg(test)]
#[path = "study_tests.rs"]
mod tests;
