// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The container runtime collaborator boundary: run a processing module's
//! container under the resolved [`SecurityPolicy`], on either Docker or
//! Nomad depending on the runtime selection rule.

mod docker;
mod nomad;

pub use docker::DockerRuntime;
pub use nomad::NomadRuntime;

use crate::error::AdapterError;
use crate::security::SecurityPolicy;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// One bind mount from the host into the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub host_path: PathBuf,
    pub container_path: String,
    pub read_only: bool,
}

impl Mount {
    pub fn rw(host_path: impl Into<PathBuf>, container_path: impl Into<String>) -> Self {
        Mount { host_path: host_path.into(), container_path: container_path.into(), read_only: false }
    }

    pub fn ro(host_path: impl Into<PathBuf>, container_path: impl Into<String>) -> Self {
        Mount { host_path: host_path.into(), container_path: container_path.into(), read_only: true }
    }
}

/// Everything a [`ContainerRuntime`] needs to run one container.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub image: String,
    /// Overrides the image's entrypoint/command when the image carries an
    /// embedded app manifest.
    pub command: Option<Vec<String>>,
    pub environment: HashMap<String, String>,
    pub mounts: Vec<Mount>,
    pub security: SecurityPolicy,
    pub network_mode: relay_core::NetworkMode,
    pub timeout: Duration,
}

/// Outcome of running one container to completion.
#[derive(Debug, Clone)]
pub struct ContainerOutcome {
    pub exit_code: i32,
    /// Timestamped, timezone-localized log lines.
    pub logs: String,
}

impl ContainerOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Digest + duration of a completed image pull, for the structured
/// "image download" event.
#[derive(Debug, Clone)]
pub struct PullOutcome {
    pub digest: String,
    pub duration: Duration,
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Pulls `tag` from the registry. Callers are expected to have already
    /// consulted an [`crate::throttle::ImagePullThrottle`].
    async fn pull(&self, tag: &str) -> Result<PullOutcome, AdapterError>;

    /// Runs a container to completion and captures its outcome. Detached +
    /// waited, never blocking in a way that would hold a spool lock for
    /// the process's own sake.
    async fn run(&self, spec: &ContainerSpec) -> Result<ContainerOutcome, AdapterError>;

    /// Whether this runtime is Nomad-backed; used by callers that need to
    /// pick Nomad-specific constraint handling.
    fn is_nomad(&self) -> bool {
        false
    }
}

/// Picks Nomad if and only if the process is itself running under Nomad
/// (`NOMAD_ALLOC_ID` set) or the configuration forces it.
pub fn select_runtime(force_nomad: bool) -> bool {
    force_nomad || std::env::var_os("NOMAD_ALLOC_ID").is_some()
}
