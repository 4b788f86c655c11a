// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Docker-backed [`ContainerRuntime`], shelling out to the `docker` CLI.

use super::{ContainerOutcome, ContainerRuntime, ContainerSpec, PullOutcome};
use crate::error::AdapterError;
use async_trait::async_trait;
use std::time::Instant;
use tokio::process::Command;

#[derive(Debug, Clone, Default)]
pub struct DockerRuntime;

impl DockerRuntime {
    pub fn new() -> Self {
        DockerRuntime
    }

    async fn run_docker(&self, args: &[String]) -> Result<String, AdapterError> {
        let output = Command::new("docker")
            .args(args)
            .output()
            .await
            .map_err(|source| AdapterError::Exec { runtime: "docker", source })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if stderr.contains("No such image") || stderr.contains("manifest unknown") {
                return Err(AdapterError::ImageNotFound(args.last().cloned().unwrap_or_default()));
            }
            Err(AdapterError::CommandFailed { runtime: "docker", message: stderr })
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn pull(&self, tag: &str) -> Result<PullOutcome, AdapterError> {
        let started = Instant::now();
        self.run_docker(&["pull".to_string(), tag.to_string()]).await?;
        let digest = self
            .run_docker(&[
                "inspect".to_string(),
                "--format={{index .RepoDigests 0}}".to_string(),
                tag.to_string(),
            ])
            .await
            .unwrap_or_default();
        Ok(PullOutcome { digest, duration: started.elapsed() })
    }

    async fn run(&self, spec: &ContainerSpec) -> Result<ContainerOutcome, AdapterError> {
        let mut args = vec!["run".to_string(), "--rm".to_string()];
        args.extend(spec.security.to_docker_args());

        for mount in &spec.mounts {
            let ro = if mount.read_only { ":ro" } else { "" };
            args.push("-v".to_string());
            args.push(format!("{}:{}{}", mount.host_path.display(), mount.container_path, ro));
        }

        for (key, value) in &spec.environment {
            args.push("-e".to_string());
            args.push(format!("{key}={value}"));
        }

        match &spec.network_mode {
            relay_core::NetworkMode::Bridge => {}
            relay_core::NetworkMode::Host => {
                args.push("--network".to_string());
                args.push("host".to_string());
            }
            relay_core::NetworkMode::None => {
                args.push("--network".to_string());
                args.push("none".to_string());
            }
            relay_core::NetworkMode::Other(mode) => {
                args.push("--network".to_string());
                args.push(mode.clone());
            }
        }

        args.push(spec.image.clone());
        if let Some(command) = &spec.command {
            args.extend(command.iter().cloned());
        }

        let container_name = format!("relay-{}", uuid::Uuid::new_v4());
        args.insert(2, "--name".to_string());
        args.insert(3, container_name.clone());

        let run_result = tokio::time::timeout(spec.timeout, self.run_docker(&args)).await;

        let logs = self.run_docker(&["logs".to_string(), container_name.clone()]).await.unwrap_or_default();

        match run_result {
            Ok(Ok(_)) => Ok(ContainerOutcome { exit_code: 0, logs }),
            Ok(Err(AdapterError::CommandFailed { message, .. })) => {
                let exit_code = self
                    .run_docker(&["inspect".to_string(), "--format={{.State.ExitCode}}".to_string(), container_name])
                    .await
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1);
                tracing::warn!(message, exit_code, "container exited non-zero");
                Ok(ContainerOutcome { exit_code, logs })
            }
            Ok(Err(other)) => Err(other),
            Err(_) => {
                let _ = self.run_docker(&["kill".to_string(), container_name]).await;
                Err(AdapterError::CommandFailed {
                    runtime: "docker",
                    message: format!("container timed out after {:?}", spec.timeout),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_runtime_is_not_nomad() {
        assert!(!DockerRuntime::new().is_nomad());
    }
}
