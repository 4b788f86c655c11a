// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The canonical `task.json` document.

use crate::dispatch::DispatchInfo;
use crate::error::TaskError;
use crate::ids::TaskId;
use crate::process::Process;
use crate::rule_types::{Action, FailStage, ForceCompleteAction, PatientCompleteTrigger, StudyCompleteTrigger, UidType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// `task.info`: routing decision metadata, present on every task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub action: Action,
    pub applied_rule: String,
    #[serde(default)]
    pub triggered_rules: BTreeMap<String, bool>,
    pub uid: String,
    pub uid_type: UidType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mrn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_stage: Option<FailStage>,
}

/// `task.study`, present iff `info.uid_type == Study`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyInfo {
    pub study_uid: String,
    pub creation_time: DateTime<Utc>,
    pub last_receive_time: DateTime<Utc>,
    pub complete_trigger: StudyCompleteTrigger,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete_required_series: Option<String>,
    #[serde(default)]
    pub complete_force: bool,
    pub complete_force_action: ForceCompleteAction,
    #[serde(default)]
    pub received_series: Vec<String>,
    #[serde(default)]
    pub received_series_uid: Vec<String>,
}

/// `task.patient`, present iff `info.uid_type == Patient`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientInfo {
    pub mrn: String,
    pub creation_time: DateTime<Utc>,
    pub last_receive_time: DateTime<Utc>,
    pub complete_trigger: PatientCompleteTrigger,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete_required_studies: Option<String>,
    #[serde(default)]
    pub complete_force: bool,
    pub complete_force_action: ForceCompleteAction,
    #[serde(default)]
    pub received_studies: Vec<String>,
    #[serde(default)]
    pub received_modalities: Vec<String>,
    #[serde(default)]
    pub received_series: Vec<String>,
    #[serde(default)]
    pub received_series_uid: Vec<String>,
}

/// The canonical unit-of-work document, persisted as `task.json` inside a
/// unit's spool folder.
///
/// Exactly one of `study`/`patient` is set, matching `info.uid_type`; this
/// invariant is checked by [`Task::validate`] rather than encoded in the
/// type itself, since `info`, `study`, and `patient` round-trip through
/// serde independently and a tagged enum would change the wire shape away
/// from the flat object the bookkeeper and processing containers expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TaskId>,
    pub info: TaskInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study: Option<StudyInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient: Option<PatientInfo>,
    #[serde(default)]
    pub process: Process,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch: Option<DispatchInfo>,
}

impl Task {
    /// Checks the "exactly one of `study | patient | (neither)`, matching
    /// `info.uid_type`" invariant.
    pub fn validate(&self) -> Result<(), TaskError> {
        let shape_ok = match self.info.uid_type {
            UidType::Series => self.study.is_none() && self.patient.is_none(),
            UidType::Study => self.study.is_some() && self.patient.is_none(),
            UidType::Patient => self.study.is_none() && self.patient.is_some(),
        };
        if !shape_ok {
            return Err(TaskError::SchemaViolation {
                path: std::path::PathBuf::from("<in-memory>"),
                reason: format!(
                    "uid_type={:?} but study.is_some()={} patient.is_some()={}",
                    self.info.uid_type,
                    self.study.is_some(),
                    self.patient.is_some()
                ),
            });
        }
        Ok(())
    }

    /// Loads `<folder>/task.json`.
    pub fn load(folder: &Path) -> Result<Task, TaskError> {
        let path = folder.join("task.json");
        let file = File::open(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                TaskError::NotFound(path.clone())
            } else {
                TaskError::Io { path: path.clone(), source }
            }
        })?;
        let reader = BufReader::new(file);
        let task: Task =
            serde_json::from_reader(reader).map_err(|source| TaskError::Parse { path: path.clone(), source })?;
        task.validate()?;
        Ok(task)
    }

    /// Saves to `<folder>/task.json`, write-tmp-then-rename for atomicity,
    /// with deterministic key ordering and two-space indent.
    pub fn save(&self, folder: &Path) -> Result<(), TaskError> {
        self.validate()?;
        let path = folder.join("task.json");
        let tmp_path = path.with_extension("json.tmp");

        {
            let file = File::create(&tmp_path).map_err(|source| TaskError::Io { path: tmp_path.clone(), source })?;
            let mut writer = BufWriter::new(file);
            let mut ser = serde_json::Serializer::with_formatter(&mut writer, serde_json::ser::PrettyFormatter::with_indent(b"  "));
            self.serialize(&mut ser).map_err(|source| TaskError::Parse { path: tmp_path.clone(), source })?;
            use std::io::Write;
            writer.flush().map_err(|source| TaskError::Io { path: tmp_path.clone(), source })?;
            let file = writer.into_inner().map_err(|e| TaskError::Io { path: tmp_path.clone(), source: e.into_error() })?;
            file.sync_all().map_err(|source| TaskError::Io { path: tmp_path.clone(), source })?;
        }

        fs::rename(&tmp_path, &path).map_err(|source| TaskError::Io { path, source })?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
