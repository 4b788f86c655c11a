// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A synthetic self-test task as reported by the bookkeeper, with staleness
/// resolved the way `get_test_task` resolves it: a test with no `time_end`
/// that started more than [`super::ORPHAN_PROMOTION_PRE_WINDOW`] ago is
/// reported failed rather than left "running" forever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfTestTask {
    pub name: String,
    pub time_begin: DateTime<Utc>,
    pub time_end: Option<DateTime<Utc>>,
    pub status: SelfTestStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelfTestStatus {
    Running,
    Succeeded,
    Failed,
}

impl SelfTestTask {
    /// Applies the staleness rule client-side, mirroring `get_test_task`:
    /// a task with no `time_end` older than ten minutes is reclassified
    /// as failed rather than trusted as still running.
    pub fn resolve_staleness(mut self, now: DateTime<Utc>) -> Self {
        if self.time_end.is_none() && now - self.time_begin > super::ORPHAN_PROMOTION_PRE_WINDOW {
            self.status = SelfTestStatus::Failed;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn running_task_within_window_stays_running() {
        let now = Utc::now();
        let task = SelfTestTask {
            name: "ping".to_string(),
            time_begin: now - Duration::minutes(3),
            time_end: None,
            status: SelfTestStatus::Running,
        }
        .resolve_staleness(now);
        assert_eq!(task.status, SelfTestStatus::Running);
    }

    #[test]
    fn running_task_past_window_is_marked_failed() {
        let now = Utc::now();
        let task = SelfTestTask {
            name: "ping".to_string(),
            time_begin: now - Duration::minutes(11),
            time_end: None,
            status: SelfTestStatus::Running,
        }
        .resolve_staleness(now);
        assert_eq!(task.status, SelfTestStatus::Failed);
    }

    #[test]
    fn completed_task_is_left_alone() {
        let now = Utc::now();
        let task = SelfTestTask {
            name: "ping".to_string(),
            time_begin: now - Duration::minutes(30),
            time_end: Some(now - Duration::minutes(29)),
            status: SelfTestStatus::Succeeded,
        }
        .resolve_staleness(now);
        assert_eq!(task.status, SelfTestStatus::Succeeded);
    }
}
