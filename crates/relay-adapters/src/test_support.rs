// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake collaborator implementations for other crates' tests: stand-ins
//! for `ContainerRuntime`, `BookkeeperClient`, and `DispatchTarget` that
//! record what they were asked to do instead of touching anything real.

use crate::bookkeeper::BookkeeperClient;
use crate::dispatch_target::DispatchTarget;
use crate::error::AdapterError;
use crate::runtime::{ContainerOutcome, ContainerRuntime, ContainerSpec, PullOutcome};
use async_trait::async_trait;
use parking_lot::Mutex;
use relay_core::TaskEvent;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A [`ContainerRuntime`] that returns a fixed outcome without touching
/// Docker or Nomad, and records every spec it was asked to run.
pub struct FakeContainerRuntime {
    pub outcome: ContainerOutcome,
    pub runs: Mutex<Vec<ContainerSpec>>,
}

impl FakeContainerRuntime {
    pub fn succeeding() -> Self {
        FakeContainerRuntime {
            outcome: ContainerOutcome { exit_code: 0, logs: String::new() },
            runs: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(exit_code: i32, logs: impl Into<String>) -> Self {
        FakeContainerRuntime { outcome: ContainerOutcome { exit_code, logs: logs.into() }, runs: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl ContainerRuntime for FakeContainerRuntime {
    async fn pull(&self, _tag: &str) -> Result<PullOutcome, AdapterError> {
        Ok(PullOutcome { digest: "sha256:fake".to_string(), duration: Duration::from_millis(1) })
    }

    async fn run(&self, spec: &ContainerSpec) -> Result<ContainerOutcome, AdapterError> {
        self.runs.lock().push(spec.clone());
        Ok(self.outcome.clone())
    }
}

/// A [`BookkeeperClient`] that records every event instead of sending HTTP.
#[derive(Default)]
pub struct FakeBookkeeperClient {
    pub events: Mutex<Vec<TaskEvent>>,
}

#[async_trait]
impl BookkeeperClient for FakeBookkeeperClient {
    async fn emit(&self, event: TaskEvent) -> Result<(), AdapterError> {
        self.events.lock().push(event);
        Ok(())
    }
}

/// A [`DispatchTarget`] that fails for a configured set of target names and
/// records every send attempted against it, instead of shelling out to
/// `storescu`.
#[derive(Default)]
pub struct FakeDispatchTarget {
    pub failing_targets: Vec<String>,
    pub sends: Mutex<Vec<(String, PathBuf)>>,
}

impl FakeDispatchTarget {
    pub fn succeeding() -> Self {
        FakeDispatchTarget::default()
    }

    pub fn failing(target_name: impl Into<String>) -> Self {
        FakeDispatchTarget { failing_targets: vec![target_name.into()], sends: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl DispatchTarget for FakeDispatchTarget {
    async fn send(&self, target_name: &str, unit_dir: &Path) -> Result<(), AdapterError> {
        self.sends.lock().push((target_name.to_string(), unit_dir.to_path_buf()));
        if self.failing_targets.iter().any(|name| name == target_name) {
            return Err(AdapterError::CommandFailed { runtime: "storescu", message: "fake failure".to_string() });
        }
        Ok(())
    }
}
