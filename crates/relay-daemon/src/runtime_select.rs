// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Picks and wraps the [`ContainerRuntime`] the processor and signature
//! verifier run against, so the rest of the wiring stays generic over one
//! concrete type instead of choosing per call site.

use async_trait::async_trait;
use relay_adapters::{select_runtime, AdapterError, ContainerOutcome, ContainerRuntime, ContainerSpec, DockerRuntime, NomadRuntime, PullOutcome};

#[derive(Clone)]
pub enum Runtime {
    Docker(DockerRuntime),
    Nomad(NomadRuntime),
}

impl Runtime {
    /// Nomad if `force_nomad` is set or the process itself runs under
    /// Nomad, Docker otherwise.
    pub fn pick(force_nomad: bool, nomad_base_url: Option<&str>) -> Self {
        if select_runtime(force_nomad) {
            let base_url = nomad_base_url.unwrap_or("http://127.0.0.1:4646");
            Runtime::Nomad(NomadRuntime::new(base_url))
        } else {
            Runtime::Docker(DockerRuntime::new())
        }
    }
}

#[async_trait]
impl ContainerRuntime for Runtime {
    async fn pull(&self, tag: &str) -> Result<PullOutcome, AdapterError> {
        match self {
            Runtime::Docker(r) => r.pull(tag).await,
            Runtime::Nomad(r) => r.pull(tag).await,
        }
    }

    async fn run(&self, spec: &ContainerSpec) -> Result<ContainerOutcome, AdapterError> {
        match self {
            Runtime::Docker(r) => r.run(spec).await,
            Runtime::Nomad(r) => r.run(spec).await,
        }
    }

    fn is_nomad(&self) -> bool {
        matches!(self, Runtime::Nomad(_))
    }
}
