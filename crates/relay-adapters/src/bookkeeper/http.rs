// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::query::HierarchicalQuery;
use super::types::SelfTestTask;
use super::BookkeeperClient;
use crate::error::AdapterError;
use async_trait::async_trait;
use chrono::Utc;
use relay_core::{TaskEvent, TaskId};

/// Talks to the bookkeeper over its HTTP API. The bookkeeper's own schema
/// and endpoints are out of scope; this client only needs the handful of
/// routes the orchestrator itself consumes.
#[derive(Clone)]
pub struct HttpBookkeeperClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBookkeeperClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpBookkeeperClient { client: reqwest::Client::new(), base_url: base_url.into() }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, AdapterError> {
        let response = self.client.get(format!("{}{}", self.base_url, path)).send().await?;
        if !response.status().is_success() {
            return Err(AdapterError::BookkeeperStatus(response.status()));
        }
        Ok(response.json().await?)
    }

    pub async fn query(&self, query: &HierarchicalQuery) -> Result<Vec<TaskEvent>, AdapterError> {
        let group_by = match query.group_by {
            super::query::GroupBy::Series => "series",
            super::query::GroupBy::Study => "study",
            super::query::GroupBy::Patient => "patient",
        };
        let mut path = format!("/tasks?group_by={group_by}&limit={}&offset={}", query.limit, query.offset);
        if let Some(folder) = &query.folder {
            path.push_str(&format!("&folder={folder}"));
        }
        self.get_json(&path).await
    }
}

#[async_trait]
impl BookkeeperClient for HttpBookkeeperClient {
    async fn emit(&self, event: TaskEvent) -> Result<(), AdapterError> {
        let response = self.client.post(format!("{}/events", self.base_url)).json(&event).send().await?;
        if !response.status().is_success() {
            return Err(AdapterError::BookkeeperStatus(response.status()));
        }
        Ok(())
    }

    async fn task_events(&self, task_id: &TaskId) -> Result<Vec<TaskEvent>, AdapterError> {
        // `get_task_events`: the task's own events plus every subtask's,
        // found by matching `parent_id == task_id` and recursing one level.
        let own: Vec<TaskEvent> = self.get_json(&format!("/tasks/{task_id}/events")).await?;
        let subtasks: Vec<TaskId> = self.get_json(&format!("/tasks/{task_id}/subtasks")).await?;

        let mut all = own;
        for subtask_id in subtasks {
            all.extend(self.get_json::<Vec<TaskEvent>>(&format!("/tasks/{subtask_id}/events")).await?);
        }
        Ok(all)
    }

    async fn list_self_tests(&self) -> Result<Vec<SelfTestTask>, AdapterError> {
        let tasks: Vec<SelfTestTask> = self.get_json("/self-tests").await?;
        let now = Utc::now();
        Ok(tasks.into_iter().map(|task| task.resolve_staleness(now)).collect())
    }
}
