// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Enumerations shared between the rule evaluator, the aggregators, and the
//! task record. These are the vocabulary of a rule, not the rule-matching
//! engine itself — that lives in `relay-rules`.

use serde::{Deserialize, Serialize};

/// Terminal verb applied to a unit once its rule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Route,
    Process,
    Both,
    Notification,
    Discard,
}

impl Action {
    /// Whether this action requires the dispatcher to run.
    pub fn dispatches(self) -> bool {
        matches!(self, Action::Route | Action::Both)
    }

    /// Whether this action requires the processor to run.
    pub fn processes(self) -> bool {
        matches!(self, Action::Process | Action::Both)
    }
}

crate::simple_display! {
    Action {
        Route => "route",
        Process => "process",
        Both => "both",
        Notification => "notification",
        Discard => "discard",
    }
}

/// The aggregation level at which a rule acts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerScope {
    Series,
    Study,
    Patient,
}

crate::simple_display! {
    TriggerScope {
        Series => "series",
        Study => "study",
        Patient => "patient",
    }
}

/// The predicate that declares a study aggregate ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyCompleteTrigger {
    Timeout,
    ReceivedSeries,
}

/// The predicate that declares a patient aggregate ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatientCompleteTrigger {
    Timeout,
    ReceivedModalities,
    ReceivedStudies,
    ReceivedSeries,
}

/// What a force-completed aggregate should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForceCompleteAction {
    Ignore,
    Proceed,
    Discard,
}

/// The pipeline stage recorded in `info.fail_stage` on failure, used by
/// the restart path instead of re-inferring from `action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailStage {
    Routing,
    Processing,
    Dispatching,
}

crate::simple_display! {
    FailStage {
        Routing => "routing",
        Processing => "processing",
        Dispatching => "dispatching",
    }
}

/// The aggregation level a task currently represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UidType {
    Series,
    Study,
    Patient,
}

crate::simple_display! {
    UidType {
        Series => "series",
        Study => "study",
        Patient => "patient",
    }
}
