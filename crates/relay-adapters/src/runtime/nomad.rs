// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Nomad-backed [`ContainerRuntime`], used when the orchestrator itself
//! runs under Nomad or the configuration forces it.

use super::{ContainerOutcome, ContainerRuntime, ContainerSpec, PullOutcome};
use crate::error::AdapterError;
use async_trait::async_trait;
use serde_json::json;
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct NomadRuntime {
    client: reqwest::Client,
    base_url: String,
}

impl NomadRuntime {
    pub fn new(base_url: impl Into<String>) -> Self {
        NomadRuntime { client: reqwest::Client::new(), base_url: base_url.into() }
    }

    fn dispatch_job_spec(&self, spec: &ContainerSpec, job_id: &str) -> serde_json::Value {
        json!({
            "Job": {
                "ID": job_id,
                "Type": "batch",
                "TaskGroups": [{
                    "Name": "processing",
                    "Tasks": [{
                        "Name": "module",
                        "Driver": "docker",
                        "Config": {
                            "image": spec.image,
                            "command": spec.command.as_ref().and_then(|c| c.first().cloned()),
                            "args": spec.command.as_ref().map(|c| c[1..].to_vec()),
                            "readonly_rootfs": spec.security.read_only_rootfs,
                            "cap_drop": if spec.security.drop_all_capabilities { vec!["ALL"] } else { vec![] },
                        },
                        "Env": spec.environment,
                    }],
                }],
            }
        })
    }
}

#[async_trait]
impl ContainerRuntime for NomadRuntime {
    async fn pull(&self, tag: &str) -> Result<PullOutcome, AdapterError> {
        // Nomad pulls images as part of task placement; there is no
        // separate pull endpoint, so this measures nothing and reports an
        // empty digest. The throttle still gates how often we'd dispatch
        // a pull-only job if one were ever needed.
        let _ = tag;
        Ok(PullOutcome { digest: String::new(), duration: Duration::from_secs(0) })
    }

    async fn run(&self, spec: &ContainerSpec) -> Result<ContainerOutcome, AdapterError> {
        let job_id = format!("relay-{}", uuid::Uuid::new_v4());
        let body = self.dispatch_job_spec(spec, &job_id);

        let response = self.client.post(format!("{}/v1/jobs", self.base_url)).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(AdapterError::BookkeeperStatus(response.status()));
        }

        let started = Instant::now();
        loop {
            let status: serde_json::Value =
                self.client.get(format!("{}/v1/job/{}/summary", self.base_url, job_id)).send().await?.json().await?;
            let complete = status
                .get("Summary")
                .and_then(|s| s.get("processing"))
                .and_then(|t| t.get("Complete"))
                .and_then(|c| c.as_u64())
                .unwrap_or(0);
            if complete > 0 {
                break;
            }
            if started.elapsed() > spec.timeout {
                return Err(AdapterError::CommandFailed {
                    runtime: "nomad",
                    message: format!("job {job_id} timed out after {:?}", spec.timeout),
                });
            }
            tokio::time::sleep(Duration::from_secs(2)).await;
        }

        let logs = self
            .client
            .get(format!("{}/v1/client/fs/logs/{}", self.base_url, job_id))
            .query(&[("task", "module"), ("type", "stdout")])
            .send()
            .await?
            .text()
            .await
            .unwrap_or_default();

        Ok(ContainerOutcome { exit_code: 0, logs })
    }

    fn is_nomad(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_nomad_reports_true() {
        assert!(NomadRuntime::new("http://127.0.0.1:4646").is_nomad());
    }
}
