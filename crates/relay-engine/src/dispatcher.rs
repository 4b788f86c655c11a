// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sends a unit's DICOM files to every target listed in `task.dispatch`,
//! tracking per-target retry/backoff state directly in `task.json` so it
//! survives a daemon restart. Retry timing is a `next_retry_at` timestamp
//! persisted per `(task_id, target)` rather than an in-memory timer id,
//! since dispatch state must outlive the process.

use crate::config::ConfigSnapshot;
use crate::error::EngineError;
use crate::scan_loop::{StageOutcome, StageWorker};
use chrono::Utc;
use parking_lot::RwLock;
use relay_adapters::{BookkeeperClient, DispatchTarget};
use relay_core::{EventKind, FailStage, Stage, TargetState, TargetStatus, Task, TaskEvent, UnitRef};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub retries_cap: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        DispatcherSettings { retries_cap: 8, base_backoff: Duration::from_secs(30), max_backoff: Duration::from_secs(3600) }
    }
}

fn backoff_for(retries: u32, settings: &DispatcherSettings) -> Duration {
    let scaled = settings.base_backoff.saturating_mul(1u32.checked_shl(retries).unwrap_or(u32::MAX));
    scaled.min(settings.max_backoff)
}

pub struct Dispatcher<T, B> {
    target: T,
    bookkeeper: B,
    settings: RwLock<DispatcherSettings>,
}

impl<T, B> Dispatcher<T, B>
where
    T: DispatchTarget,
    B: BookkeeperClient,
{
    pub fn new(target: T, bookkeeper: B, settings: DispatcherSettings) -> Self {
        Dispatcher { target, bookkeeper, settings: RwLock::new(settings) }
    }
}

#[async_trait::async_trait]
impl<T, B> StageWorker for Dispatcher<T, B>
where
    T: DispatchTarget,
    B: BookkeeperClient,
{
    fn stage(&self) -> Stage {
        Stage::Outgoing
    }

    fn refresh(&self, snapshot: &ConfigSnapshot) {
        *self.settings.write() = DispatcherSettings {
            retries_cap: snapshot.dispatch_retries_cap,
            base_backoff: Duration::from_secs(snapshot.dispatch_base_backoff_seconds),
            max_backoff: Duration::from_secs(snapshot.dispatch_max_backoff_seconds),
        };
    }

    async fn process_unit(&self, spool: &relay_spool::Spool, unit: UnitRef) -> Result<StageOutcome, EngineError> {
        let settings = self.settings.read().clone();
        let mut task = Task::load(&unit.path)?;
        let Some(dispatch) = task.dispatch.as_mut() else {
            let lock = spool.acquire_lock(&unit.path)?;
            spool.move_unit(&unit, lock, Stage::Success, task.id.as_str())?;
            return Ok(StageOutcome::Handled);
        };

        let now = Utc::now();
        let mut touched = false;
        for target_name in dispatch.target_name.names().iter().map(|s| s.to_string()).collect::<Vec<_>>() {
            let status = dispatch.status.entry(target_name.clone()).or_insert_with(TargetStatus::pending);
            if status.is_terminal() {
                continue;
            }
            if status.next_retry_at.is_some_and(|at| at > now) {
                continue;
            }

            touched = true;
            status.state = TargetState::InFlight;
            match self.target.send(&target_name, &unit.path).await {
                Ok(()) => {
                    status.state = TargetState::Succeeded;
                    status.next_retry_at = None;
                }
                Err(error) => {
                    status.state = TargetState::Failed;
                    status.retries += 1;
                    status.next_retry_at = Some(now + chrono::Duration::from_std(backoff_for(status.retries, &settings)).unwrap_or_default());
                    tracing::warn!(target = %target_name, task_id = %task.id, error = %error, "dispatch attempt failed");
                }
            }
        }

        if !touched {
            return Ok(StageOutcome::Skipped);
        }

        let all_succeeded = dispatch.all_succeeded();
        let any_exhausted = dispatch.any_exhausted(settings.retries_cap);

        if all_succeeded {
            task.save(&unit.path)?;
            self.bookkeeper.emit(TaskEvent::new(task.id, EventKind::TaskSuccess, now)).await?;
            let lock = spool.acquire_lock(&unit.path)?;
            spool.move_unit(&unit, lock, Stage::Success, task.id.as_str())?;
            Ok(StageOutcome::Handled)
        } else if any_exhausted {
            task.info.fail_stage = Some(FailStage::Dispatching);
            task.save(&unit.path)?;
            self.bookkeeper
                .emit(TaskEvent::new(task.id, EventKind::TaskError, now).with_fail_stage(FailStage::Dispatching))
                .await?;
            let lock = spool.acquire_lock(&unit.path)?;
            spool.move_unit(&unit, lock, Stage::Error, task.id.as_str())?;
            Ok(StageOutcome::Handled)
        } else {
            task.save(&unit.path)?;
            Ok(StageOutcome::Handled)
        }
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
