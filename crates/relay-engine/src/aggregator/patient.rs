// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Collects studies belonging to a patient, detects completion, and emits a
//! patient-level task once the aggregate is ready. Mirrors
//! [`super::study::StudyAggregator`] one scope up: instead of folding
//! series tags into a study, it folds already-merged study tasks into a
//! patient.

use crate::config::ConfigSnapshot;
use crate::error::EngineError;
use crate::scan_loop::{StageOutcome, StageWorker};
use crate::tags;
use chrono::Utc;
use parking_lot::RwLock;
use relay_adapters::BookkeeperClient;
use relay_core::{
    Action, DispatchInfo, EventKind, FailStage, ForceCompleteAction, PatientCompleteTrigger, PatientInfo, Process,
    Stage, Task, TaskEvent, TaskId, TaskInfo, TargetName, UidType, UnitRef,
};
use relay_rules::RuleEvaluator;
use relay_spool::Spool;
use std::collections::HashSet;

pub struct PatientAggregator<E, B> {
    evaluator: E,
    bookkeeper: B,
    complete_trigger_seconds: RwLock<u64>,
    forcecomplete_trigger_seconds: RwLock<u64>,
}

impl<E, B> PatientAggregator<E, B>
where
    E: RuleEvaluator,
    B: BookkeeperClient,
{
    pub fn new(evaluator: E, bookkeeper: B, complete_trigger_seconds: u64, forcecomplete_trigger_seconds: u64) -> Self {
        PatientAggregator {
            evaluator,
            bookkeeper,
            complete_trigger_seconds: RwLock::new(complete_trigger_seconds),
            forcecomplete_trigger_seconds: RwLock::new(forcecomplete_trigger_seconds),
        }
    }

    /// Folds any study subfolder not yet accounted for into the patient
    /// task, creating the task on first arrival.
    fn merge_new_studies(&self, spool: &Spool, patient_dir: &std::path::Path, mrn: &str) -> Result<Option<Task>, EngineError> {
        let mut task = match Task::load(patient_dir) {
            Ok(task) => Some(task),
            Err(relay_core::TaskError::NotFound(_)) => None,
            Err(error) => return Err(error.into()),
        };

        let now = Utc::now();
        for study_name in spool_subfolders(patient_dir)? {
            let study_dir = patient_dir.join(&study_name);
            let Ok(study_task) = Task::load(&study_dir) else { continue };
            let Some(study) = study_task.study.as_ref() else { continue };
            let modalities = distinct_modalities(&study_dir)?;

            match &mut task {
                Some(task) => {
                    let Some(patient) = task.patient.as_mut() else { continue };
                    if patient.received_studies.iter().any(|uid| uid == &study.study_uid) {
                        continue;
                    }
                    patient.received_studies.push(study.study_uid.clone());
                    patient.received_series.extend(study.received_series.iter().cloned());
                    patient.received_series_uid.extend(study.received_series_uid.iter().cloned());
                    for modality in modalities {
                        if !patient.received_modalities.contains(&modality) {
                            patient.received_modalities.push(modality);
                        }
                    }
                    patient.last_receive_time = now;
                }
                None => {
                    let rule = self.evaluator.rule(&study_task.info.applied_rule);
                    let complete_trigger = rule.and_then(|r| r.patient_complete_trigger).unwrap_or(PatientCompleteTrigger::Timeout);
                    let complete_required_studies = rule.and_then(|r| r.patient_complete_required_studies.clone());
                    let complete_force_action = rule.and_then(|r| r.patient_complete_force_action).unwrap_or(ForceCompleteAction::Ignore);

                    task = Some(Task {
                        id: TaskId::new(),
                        parent_id: None,
                        info: TaskInfo {
                            action: Action::Discard,
                            applied_rule: study_task.info.applied_rule.clone(),
                            triggered_rules: study_task.info.triggered_rules.clone(),
                            uid: mrn.to_string(),
                            uid_type: UidType::Patient,
                            mrn: Some(mrn.to_string()),
                            acc: study_task.info.acc.clone(),
                            fail_stage: None,
                        },
                        study: None,
                        patient: Some(PatientInfo {
                            mrn: mrn.to_string(),
                            creation_time: now,
                            last_receive_time: now,
                            complete_trigger,
                            complete_required_studies,
                            complete_force: false,
                            complete_force_action,
                            received_studies: vec![study.study_uid.clone()],
                            received_modalities: modalities,
                            received_series: study.received_series.clone(),
                            received_series_uid: study.received_series_uid.clone(),
                        }),
                        process: Process::None,
                        dispatch: None,
                    });
                }
            }
        }

        Ok(task)
    }

    fn is_complete(&self, spool: &Spool, patient_dir: &std::path::Path, task: &Task) -> Result<bool, EngineError> {
        let Some(patient) = task.patient.as_ref() else { return Ok(false) };
        if patient.complete_force || spool.has_complete_force_marker(patient_dir) {
            return Ok(true);
        }
        match patient.complete_trigger {
            PatientCompleteTrigger::Timeout => {
                let trigger_seconds = self
                    .evaluator
                    .rule(&task.info.applied_rule)
                    .and_then(|r| r.patient_complete_trigger_seconds)
                    .unwrap_or(*self.complete_trigger_seconds.read());
                let elapsed = Utc::now().signed_duration_since(patient.last_receive_time).num_seconds().max(0) as u64;
                if elapsed < trigger_seconds {
                    return Ok(false);
                }
                Ok(!self.has_pending_incoming_study(spool, &patient.mrn)?)
            }
            PatientCompleteTrigger::ReceivedStudies => {
                let required = patient.complete_required_studies.as_deref().unwrap_or("");
                Ok(self.evaluator.parse_completion_series(required, &patient.received_studies)?)
            }
            PatientCompleteTrigger::ReceivedModalities => {
                let required = patient.complete_required_studies.as_deref().unwrap_or("");
                Ok(self.evaluator.parse_completion_series(required, &patient.received_modalities)?)
            }
            PatientCompleteTrigger::ReceivedSeries => {
                let required = patient.complete_required_studies.as_deref().unwrap_or("");
                Ok(self.evaluator.parse_completion_series(required, &patient.received_series)?)
            }
        }
    }

    /// Whether any study still sitting in `studies/` belongs to this MRN
    /// and hasn't been promoted to `patients/` yet.
    fn has_pending_incoming_study(&self, spool: &Spool, mrn: &str) -> Result<bool, EngineError> {
        for folder in spool.folder_names(Stage::Studies)? {
            let dir = spool.stage_dir(Stage::Studies).join(&folder);
            if let Ok(study_task) = Task::load(&dir) {
                if study_task.info.mrn.as_deref() == Some(mrn) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// A patient aggregate that cannot proceed because of a corrupted
    /// on-disk task record or a rule-evaluation error: recorded with
    /// `fail_stage = routing` and moved to `error/`, mirroring
    /// [`super::study::StudyAggregator`]'s catch-its-own-exceptions
    /// contract. Builds a placeholder task when no merged task exists yet
    /// so the failure is still traceable.
    async fn fail_aggregation(
        &self,
        spool: &Spool,
        unit: &UnitRef,
        mrn: &str,
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
                uid: mrn.to_string(),
                uid_type: UidType::Patient,
                mrn: Some(mrn.to_string()),
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

fn distinct_modalities(study_dir: &std::path::Path) -> Result<Vec<String>, EngineError> {
    let mut seen = HashSet::new();
    let mut modalities = Vec::new();
    for series_name in spool_subfolders(study_dir)? {
        let series_dir = study_dir.join(&series_name);
        if let Ok(series_tags) = tags::read_series_tags(&series_dir) {
            if let Some(modality) = series_tags.get("Modality") {
                if seen.insert(modality.clone()) {
                    modalities.push(modality.clone());
                }
            }
        }
    }
    Ok(modalities)
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
impl<E, B> StageWorker for PatientAggregator<E, B>
where
    E: RuleEvaluator,
    B: BookkeeperClient,
{
    fn stage(&self) -> Stage {
        Stage::Patients
    }

    fn refresh(&self, snapshot: &ConfigSnapshot) {
        *self.complete_trigger_seconds.write() = snapshot.patient_complete_trigger_seconds;
        *self.forcecomplete_trigger_seconds.write() = snapshot.patient_forcecomplete_trigger_seconds;
    }

    /// Same readiness override as [`super::study::StudyAggregator`]: a
    /// patient folder is ready once it holds an unmerged study subfolder,
    /// even before it owns a top-level `task.json`.
    fn scan_ready(&self, spool: &Spool) -> Result<Vec<UnitRef>, EngineError> {
        let mut ready = Vec::new();
        for folder in spool.folder_names(Stage::Patients)? {
            let unit = UnitRef::new(Stage::Patients, spool.root(), folder);
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
        let mrn = unit.folder.split('_').next().unwrap_or(&unit.folder).to_string();
        let merged = match self.merge_new_studies(spool, &unit.path, &mrn) {
            Ok(merged) => merged,
            Err(error) => return self.fail_aggregation(spool, &unit, &mrn, None, &error.to_string()).await,
        };
        let Some(mut task) = merged else {
            return Ok(StageOutcome::Skipped);
        };

        let lock = spool.acquire_lock(&unit.path)?;
        task.save(&unit.path)?;

        let forcecomplete_trigger_seconds = self
            .evaluator
            .rule(&task.info.applied_rule)
            .and_then(|r| r.patient_forcecomplete_trigger_seconds)
            .unwrap_or(*self.forcecomplete_trigger_seconds.read());
        let patient_force_timed_out = task.patient.as_ref().is_some_and(|patient| {
            Utc::now().signed_duration_since(patient.creation_time).num_seconds().max(0) as u64 >= forcecomplete_trigger_seconds
        });
        if patient_force_timed_out {
            let action = task.patient.as_ref().map(|patient| patient.complete_force_action);
            match action {
                Some(ForceCompleteAction::Ignore) => {
                    if let Some(patient) = task.patient.as_mut() {
                        patient.complete_force = true;
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
                return self.fail_aggregation(spool, &unit, &mrn, Some(task), &error.to_string()).await;
            }
        };
        if !complete {
            lock.release()?;
            return Ok(StageOutcome::Skipped);
        }

        let rule = self.evaluator.rule(&task.info.applied_rule);
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
#[path = "patient_tests.rs"]
mod tests;
