// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bookkeeper event shapes emitted on entry/success/error of a unit and
//! consumed by `relay-adapters::BookkeeperClient`.

use crate::ids::{EventId, TaskId};
use crate::rule_types::FailStage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of event a component emits as a unit moves through the spool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    TaskReceived,
    ProcessBegin,
    ProcessComplete,
    DispatchBegin,
    DispatchComplete,
    TaskSuccess,
    TaskError,
    TaskDiscard,
    ImageDownload,
    ProcessRestart,
}

/// One bookkeeper event. Every component emits one of these on entry,
/// success, and error of a unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    pub event_id: EventId,
    pub task_id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<TaskId>,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_stage: Option<FailStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl TaskEvent {
    pub fn new(task_id: TaskId, kind: EventKind, timestamp: DateTime<Utc>) -> Self {
        TaskEvent {
            event_id: EventId::new(),
            task_id,
            parent_task_id: None,
            kind,
            timestamp,
            fail_stage: None,
            message: None,
            details: serde_json::Map::new(),
        }
    }

    pub fn with_parent(mut self, parent_task_id: TaskId) -> Self {
        self.parent_task_id = Some(parent_task_id);
        self
    }

    pub fn with_fail_stage(mut self, fail_stage: FailStage) -> Self {
        self.fail_stage = Some(fail_stage);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// A structured "image download" event, carrying the digest and pull
/// duration for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageDownloadEvent {
    pub tag: String,
    pub digest: String,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
