// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The bookkeeper client collaborator: emits task/series/module events and
//! supports parent-task lookup and archive queries. The bookkeeper's own
//! HTTP surface and schema are out of scope — this module is client-only.

mod http;
mod query;
mod types;

pub use http::HttpBookkeeperClient;
pub use query::{HierarchicalQuery, GroupBy, ORPHAN_PROMOTION_POST_WINDOW, ORPHAN_PROMOTION_PRE_WINDOW};
pub use types::{SelfTestStatus, SelfTestTask};

use crate::error::AdapterError;
use async_trait::async_trait;
use relay_core::{TaskEvent, TaskId};

#[async_trait]
pub trait BookkeeperClient: Send + Sync {
    /// Emits one event, on entry, success, and error of a unit.
    async fn emit(&self, event: TaskEvent) -> Result<(), AdapterError>;

    /// Fetches events for `task_id` and every one of its subtasks.
    async fn task_events(&self, _task_id: &TaskId) -> Result<Vec<TaskEvent>, AdapterError> {
        Ok(Vec::new())
    }

    /// Synthetic self-test tasks, with staleness applied client-side to
    /// match `get_test_task`'s ">10 minutes with no time_end -> failed"
    /// rule, since the underlying query runs server-side.
    async fn list_self_tests(&self) -> Result<Vec<SelfTestTask>, AdapterError> {
        Ok(Vec::new())
    }
}
