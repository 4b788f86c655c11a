// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Summary and detail views of a spool unit, shaped for the admin CLI
//! rather than for the on-disk task document directly.

use relay_core::{DispatchInfo, Process, Stage, Task};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitSummary {
    pub id: String,
    pub stage: Stage,
    pub folder_name: String,
    pub applied_rule: Option<String>,
    pub age_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitDetail {
    pub id: String,
    pub stage: Stage,
    pub folder_name: String,
    pub task: Task,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessSummary {
    pub step_count: usize,
    pub current_step: Option<String>,
}

impl From<&Process> for ProcessSummary {
    fn from(process: &Process) -> Self {
        let steps = process.steps();
        ProcessSummary {
            step_count: steps.len(),
            current_step: steps.first().map(|step| step.module_name.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchSummary {
    pub target_names: Vec<String>,
    pub all_succeeded: bool,
}

impl From<&DispatchInfo> for DispatchSummary {
    fn from(dispatch: &DispatchInfo) -> Self {
        DispatchSummary {
            target_names: dispatch.target_name.names().into_iter().map(String::from).collect(),
            all_succeeded: dispatch.all_succeeded(),
        }
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
