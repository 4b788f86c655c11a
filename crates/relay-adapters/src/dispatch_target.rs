// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Network destinations the dispatcher sends outgoing DICOM to, shelling
//! out to `storescu` the way [`crate::runtime::DockerRuntime`] shells out
//! to `docker`.

use crate::error::AdapterError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// One configured network destination.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TargetConfig {
    pub calling_ae: String,
    pub called_ae: String,
    pub host: String,
    pub port: u16,
}

/// Consumed by the dispatcher (a collaborator boundary over an external
/// storage SCP, analogous to [`crate::runtime::ContainerRuntime`] over
/// Docker/Nomad): sends every file under `unit_dir` to the named target.
#[async_trait]
pub trait DispatchTarget: Send + Sync {
    async fn send(&self, target_name: &str, unit_dir: &Path) -> Result<(), AdapterError>;
}

/// Reference [`DispatchTarget`] that shells out to DCMTK's `storescu`.
#[derive(Clone)]
pub struct StoreScuTarget {
    targets: HashMap<String, TargetConfig>,
}

impl StoreScuTarget {
    pub fn new(targets: HashMap<String, TargetConfig>) -> Self {
        StoreScuTarget { targets }
    }

    fn dicom_files(unit_dir: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let Ok(entries) = std::fs::read_dir(unit_dir) else { return files };
        for entry in entries.filter_map(|e| e.ok()) {
            if entry.path().extension().is_some_and(|ext| ext == "dcm") {
                files.push(entry.path());
            }
        }
        files
    }
}

#[async_trait]
impl DispatchTarget for StoreScuTarget {
    async fn send(&self, target_name: &str, unit_dir: &Path) -> Result<(), AdapterError> {
        let target = self.targets.get(target_name).ok_or_else(|| AdapterError::UnknownTarget(target_name.to_string()))?;
        let files = Self::dicom_files(unit_dir);
        if files.is_empty() {
            return Ok(());
        }

        let mut args = vec![
            "-aet".to_string(),
            target.calling_ae.clone(),
            "-aec".to_string(),
            target.called_ae.clone(),
            target.host.clone(),
            target.port.to_string(),
        ];
        args.extend(files.iter().map(|p| p.display().to_string()));

        let output = Command::new("storescu")
            .args(&args)
            .output()
            .await
            .map_err(|source| AdapterError::Exec { runtime: "storescu", source })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(AdapterError::CommandFailed { runtime: "storescu", message: stderr })
        }
    }
}
