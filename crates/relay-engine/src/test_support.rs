// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixture builders shared by this crate's test modules.

use relay_core::{Action, Process, Task, TaskId, TaskInfo, UidType};

/// A minimal, valid series-level task with the given id, ready to be
/// written into any stage folder for a scan-loop or worker test.
pub fn sample_series_task(id: &str) -> Task {
    Task {
        id: TaskId::from_string(id),
        parent_id: None,
        info: TaskInfo {
            action: Action::Route,
            applied_rule: "default".to_string(),
            triggered_rules: Default::default(),
            uid: "1.2.3.4".to_string(),
            uid_type: UidType::Series,
            mrn: None,
            acc: None,
            fail_stage: None,
        },
        study: None,
        patient: None,
        process: Process::None,
        dispatch: None,
    }
}
