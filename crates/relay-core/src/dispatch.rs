// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `task.dispatch`: target list and per-target retry state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One or more target names: the field may be written either as a bare
/// string or a list of strings on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetName {
    One(String),
    Many(Vec<String>),
}

impl TargetName {
    pub fn names(&self) -> Vec<&str> {
        match self {
            TargetName::One(name) => vec![name.as_str()],
            TargetName::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// Dispatch state for a single network target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetState {
    Pending,
    InFlight,
    Succeeded,
    Failed,
}

/// Per-target retry/backoff bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetStatus {
    pub state: TargetState,
    #[serde(default)]
    pub retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_retry_at: Option<DateTime<Utc>>,
}

impl TargetStatus {
    pub fn pending() -> Self {
        TargetStatus { state: TargetState::Pending, retries: 0, next_retry_at: None }
    }

    /// `Failed` is not terminal: a failed target is still retried on its
    /// backoff schedule until `retries` reaches the configured cap, at
    /// which point `DispatchInfo::any_exhausted` takes over.
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, TargetState::Succeeded)
    }
}

/// `task.dispatch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchInfo {
    pub target_name: TargetName,
    #[serde(default)]
    pub status: BTreeMap<String, TargetStatus>,
}

impl DispatchInfo {
    /// A fresh dispatch record for the given targets, all pending.
    pub fn new(target_name: TargetName) -> Self {
        let status = target_name.names().into_iter().map(|name| (name.to_string(), TargetStatus::pending())).collect();
        DispatchInfo { target_name, status }
    }

    pub fn all_succeeded(&self) -> bool {
        self.status.values().all(|status| status.state == TargetState::Succeeded)
    }

    pub fn any_exhausted(&self, retries_cap: u32) -> bool {
        self.status.values().any(|status| status.state == TargetState::Failed && status.retries >= retries_cap)
    }

    /// Resets retry state for every target, as performed on a
    /// dispatch-failure restart.
    pub fn reset_for_restart(&mut self) {
        for status in self.status.values_mut() {
            if status.state != TargetState::Succeeded {
                status.state = TargetState::Pending;
                status.retries = 0;
                status.next_retry_at = None;
            }
        }
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
