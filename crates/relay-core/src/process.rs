// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container processing pipeline configuration.
//!
//! `task.process` is modeled as a tagged variant over the three wire
//! shapes (absent / single object / list) so every call site folds onto
//! one path — [`Process::steps`] — instead of matching on all three.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Network namespace mode for a processing module's container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    Bridge,
    Host,
    None,
    /// Escape hatch for runtime-specific modes (e.g. a Nomad CNI name).
    #[serde(untagged)]
    Other(String),
}

/// Resource constraints passed through to the container runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_limit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_count: Option<u32>,
}

/// One step of a processing pipeline: the per-module contract a rule
/// declares for the processor to carry out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskProcessing {
    pub module_name: String,
    pub docker_tag: String,
    #[serde(default)]
    pub additional_volumes: Vec<String>,
    #[serde(default)]
    pub environment: HashMap<String, String>,
    #[serde(default)]
    pub docker_arguments: Vec<String>,
    #[serde(default)]
    pub constraints: HashMap<String, String>,
    #[serde(default)]
    pub resources: Resources,
    #[serde(default)]
    pub requires_root: bool,
    #[serde(default)]
    pub requires_persistence: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistence_folder_name: Option<String>,
    #[serde(default = "default_network_mode")]
    pub network_mode: NetworkMode,
    /// Free-form settings, including signature requirements
    /// (`require_signature`, `certificate_identity`, `certificate_oidc_issuer`).
    #[serde(default)]
    pub settings: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub retain_input_images: bool,
}

fn default_network_mode() -> NetworkMode {
    NetworkMode::Bridge
}

impl TaskProcessing {
    /// Whether `settings.require_signature` is truthy.
    pub fn requires_signature(&self) -> bool {
        self.settings.get("require_signature").and_then(|v| v.as_bool()).unwrap_or(false)
    }

    pub fn certificate_identity(&self) -> Option<&str> {
        self.settings.get("certificate_identity").and_then(|v| v.as_str())
    }

    pub fn certificate_oidc_issuer(&self) -> Option<&str> {
        self.settings.get("certificate_oidc_issuer").and_then(|v| v.as_str())
    }
}

/// `task.process`: absent, a single module, or an ordered pipeline.
///
/// Every consumer iterates via [`Process::steps`] instead of matching on
/// the three historical shapes directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Process {
    None,
    Single(Box<TaskProcessing>),
    Pipeline(Vec<TaskProcessing>),
}

impl Default for Process {
    fn default() -> Self {
        Process::None
    }
}

impl Process {
    /// Ordered list of steps, regardless of the wire shape.
    pub fn steps(&self) -> &[TaskProcessing] {
        match self {
            Process::None => &[],
            Process::Single(step) => std::slice::from_ref(step),
            Process::Pipeline(steps) => steps,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps().is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps().len()
    }

    /// Narrow this process to just one step, as written into a module
    /// container's view of `task.json` mid-pipeline.
    pub fn narrowed_to(&self, index: usize) -> Process {
        match self.steps().get(index) {
            Some(step) => Process::Single(Box::new(step.clone())),
            None => Process::None,
        }
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
