// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Classifies a complete series folder in `incoming/` and makes the first
//! routing decision for it.

use crate::error::EngineError;
use crate::scan_loop::{StageOutcome, StageWorker};
use crate::tags;
use chrono::Utc;
use relay_adapters::BookkeeperClient;
use relay_core::{
    Action, DispatchInfo, EventKind, FailStage, Process, Stage, TargetName, Task, TaskEvent, TaskId, TaskInfo,
    TriggerScope, UidType, UnitRef,
};
use relay_rules::{EvaluationResult, RuleEvaluator};
use relay_spool::Spool;
use std::collections::{BTreeMap, HashMap};

/// Scans `incoming/` and turns each complete series folder into a routing
/// decision, consuming a [`RuleEvaluator`] and emitting [`TaskEvent`]s to a
/// [`BookkeeperClient`].
pub struct SeriesRouter<E, B> {
    evaluator: E,
    bookkeeper: B,
}

impl<E, B> SeriesRouter<E, B>
where
    E: RuleEvaluator,
    B: BookkeeperClient,
{
    pub fn new(evaluator: E, bookkeeper: B) -> Self {
        SeriesRouter { evaluator, bookkeeper }
    }

    /// Evaluates every scope and returns the first applied rule in
    /// series-then-study-then-patient preference, plus the union of every
    /// scope's triggered-rule map. The evaluator interface partitions rules
    /// by scope, so a single cross-scope priority order isn't directly
    /// observable; this order matches how a series is actually disposed of
    /// (acted on directly, or handed to the study aggregator, or the
    /// patient aggregator beyond that).
    fn evaluate_all_scopes(
        &self,
        tags: &HashMap<String, String>,
    ) -> Result<(Option<String>, TriggerScope, BTreeMap<String, bool>), EngineError> {
        let mut triggered = BTreeMap::new();
        let mut winner: Option<(String, TriggerScope)> = None;

        for scope in [TriggerScope::Series, TriggerScope::Study, TriggerScope::Patient] {
            let result: EvaluationResult = self.evaluator.evaluate(tags, scope)?;
            triggered.extend(result.triggered_rules);
            if winner.is_none() {
                if let Some(name) = result.applied_rule {
                    winner = Some((name, scope));
                }
            }
        }

        match winner {
            Some((name, scope)) => Ok((Some(name), scope, triggered)),
            None => Ok((None, TriggerScope::Series, triggered)),
        }
    }

    /// A series that cannot be routed because of a tag-parsing or
    /// rule-configuration problem: recorded with `fail_stage = routing`
    /// and moved straight to `error/`, matching every other stage's
    /// catch-its-own-exceptions contract. Acquires its own lock rather
    /// than reusing one from the caller, since the caller never held one
    /// across the failure that led here.
    async fn fail_routing(
        &self,
        spool: &Spool,
        unit: &UnitRef,
        uid: String,
        mrn: Option<String>,
        acc: Option<String>,
        triggered_rules: BTreeMap<String, bool>,
        reason: &str,
    ) -> Result<StageOutcome, EngineError> {
        let task = Task {
            id: TaskId::new(),
            parent_id: None,
            info: TaskInfo {
                action: Action::Discard,
                applied_rule: String::new(),
                triggered_rules,
                uid,
                uid_type: UidType::Series,
                mrn,
                acc,
                fail_stage: Some(FailStage::Routing),
            },
            study: None,
            patient: None,
            process: Process::None,
            dispatch: None,
        };
        task.save(&unit.path)?;
        self.bookkeeper
            .emit(TaskEvent::new(task.id, EventKind::TaskError, Utc::now()).with_fail_stage(FailStage::Routing).with_message(reason))
            .await?;
        let lock = spool.acquire_lock(&unit.path)?;
        spool.move_unit(unit, lock, Stage::Error, task.id.as_str())?;
        Ok(StageOutcome::Handled)
    }
}

#[async_trait::async_trait]
impl<E, B> StageWorker for SeriesRouter<E, B>
where
    E: RuleEvaluator,
    B: BookkeeperClient,
{
    fn stage(&self) -> Stage {
        Stage::Incoming
    }

    async fn process_unit(&self, spool: &Spool, unit: UnitRef) -> Result<StageOutcome, EngineError> {
        // Every step up to and including the rule lookup is pure tag
        // parsing and rule-set lookup: no lock is held while any of it can
        // fail, so a config/rule error here routes straight to `error/`
        // via `fail_routing` instead of leaving a dangling `.lock` behind.
        let series_tags = match tags::read_series_tags(&unit.path) {
            Ok(tags) => tags,
            Err(error) => {
                return self.fail_routing(spool, &unit, unit.folder.clone(), None, None, Default::default(), &error.to_string()).await;
            }
        };

        let series_uid = series_tags.get("SeriesInstanceUID").cloned().unwrap_or_else(|| unit.folder.clone());
        let mrn = series_tags.get("PatientID").cloned();
        let acc = series_tags.get("AccessionNumber").cloned();

        let (applied_rule, scope, triggered_rules) = match self.evaluate_all_scopes(&series_tags) {
            Ok(result) => result,
            Err(error) => return self.fail_routing(spool, &unit, series_uid, mrn, acc, Default::default(), &error.to_string()).await,
        };

        let now = Utc::now();

        let Some(rule_name) = applied_rule else {
            let lock = spool.acquire_lock(&unit.path)?;
            let task = Task {
                id: TaskId::new(),
                parent_id: None,
                info: TaskInfo {
                    action: Action::Discard,
                    applied_rule: String::new(),
                    triggered_rules,
                    uid: series_uid,
                    uid_type: UidType::Series,
                    mrn,
                    acc,
                    fail_stage: None,
                },
                study: None,
                patient: None,
                process: Process::None,
                dispatch: None,
            };
            task.save(&unit.path)?;
            self.bookkeeper.emit(TaskEvent::new(task.id, EventKind::TaskDiscard, now)).await?;
            spool.move_unit(&unit, lock, Stage::Discard, task.id.as_str())?;
            return Ok(StageOutcome::Handled);
        };

        let Some(rule) = self.evaluator.rule(&rule_name) else {
            return self
                .fail_routing(spool, &unit, series_uid, mrn, acc, triggered_rules, &format!("applied rule '{rule_name}' has no matching configuration entry"))
                .await;
        };

        let lock = spool.acquire_lock(&unit.path)?;
        let process = match rule.processing.len() {
            0 => Process::None,
            1 => Process::Single(Box::new(rule.processing[0].clone())),
            _ => Process::Pipeline(rule.processing.clone()),
        };
        let dispatch = rule
            .target_name
            .as_ref()
            .filter(|_| rule.action.dispatches())
            .map(|name| DispatchInfo::new(TargetName::One(name.clone())));

        let task_id = TaskId::new();
        let task = Task {
            id: task_id,
            parent_id: None,
            info: TaskInfo {
                action: rule.action,
                applied_rule: rule_name.clone(),
                triggered_rules,
                uid: series_uid.clone(),
                uid_type: UidType::Series,
                mrn,
                acc,
                fail_stage: None,
            },
            study: None,
            patient: None,
            process,
            dispatch,
        };

        self.bookkeeper.emit(TaskEvent::new(task.id, EventKind::TaskReceived, now)).await?;

        if scope == TriggerScope::Series {
            let dest_stage = match task.info.action {
                Action::Process => Stage::Processing,
                Action::Both => Stage::Processing,
                Action::Route => Stage::Outgoing,
                Action::Notification => Stage::Success,
                Action::Discard => Stage::Discard,
            };
            if matches!(task.info.action, Action::Notification | Action::Discard) {
                let kind = if task.info.action == Action::Discard { EventKind::TaskDiscard } else { EventKind::TaskSuccess };
                self.bookkeeper.emit(TaskEvent::new(task.id, kind, now)).await?;
            }
            task.save(&unit.path)?;
            spool.move_unit(&unit, lock, dest_stage, task.id.as_str())?;
        } else {
            let study_uid = series_tags.get("StudyInstanceUID").cloned().unwrap_or_else(|| series_uid.clone());
            let study_folder = format!("{study_uid}_{rule_name}");
            let dest_folder = format!("{study_folder}/{series_uid}");
            task.save(&unit.path)?;
            spool.move_unit(&unit, lock, Stage::Studies, &dest_folder)?;
        }

        Ok(StageOutcome::Handled)
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
