// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide configuration, loaded once at daemon startup and re-read
//! into a fresh, immutable [`ConfigSnapshot`] at the top of each worker
//! loop's scan iteration rather than mutated in place.

use chrono_tz::Tz;
use relay_adapters::TargetConfig;
use relay_rules::RuleSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingLogsConfig {
    #[serde(default)]
    pub logs_file_store: Option<PathBuf>,
    #[serde(default)]
    pub discard_logs: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub spool_root: PathBuf,
    #[serde(default = "default_study_complete_trigger_seconds")]
    pub study_complete_trigger_seconds: u64,
    #[serde(default = "default_forcecomplete_trigger_seconds")]
    pub study_forcecomplete_trigger_seconds: u64,
    #[serde(default = "default_patient_complete_trigger_seconds")]
    pub patient_complete_trigger_seconds: u64,
    #[serde(default = "default_forcecomplete_trigger_seconds")]
    pub patient_forcecomplete_trigger_seconds: u64,
    #[serde(default)]
    pub processing_runtime_force_nomad: bool,
    #[serde(default)]
    pub support_root_modules: bool,
    #[serde(default = "default_chown_helper_image")]
    pub chown_helper_image: String,
    #[serde(default)]
    pub processing_logs: ProcessingLogsConfig,
    #[serde(default = "default_timezone")]
    pub server_time: String,
    #[serde(default = "default_timezone")]
    pub local_time: String,
    #[serde(default = "default_dispatch_retries_cap")]
    pub dispatch_retries_cap: u32,
    #[serde(default = "default_dispatch_base_backoff_seconds")]
    pub dispatch_base_backoff_seconds: u64,
    #[serde(default = "default_dispatch_max_backoff_seconds")]
    pub dispatch_max_backoff_seconds: u64,
    #[serde(default)]
    pub dispatch_targets: HashMap<String, TargetConfig>,
    pub rules: RuleSet,

    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    pub bookkeeper_url: String,
    #[serde(default)]
    pub signature_verifier_image: Option<String>,
    #[serde(default)]
    pub nomad_base_url: Option<String>,
}

fn default_study_complete_trigger_seconds() -> u64 {
    60
}

fn default_forcecomplete_trigger_seconds() -> u64 {
    3600
}

fn default_patient_complete_trigger_seconds() -> u64 {
    300
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_chown_helper_image() -> String {
    "busybox:1.36".to_string()
}

fn default_dispatch_retries_cap() -> u32 {
    8
}

fn default_dispatch_base_backoff_seconds() -> u64 {
    30
}

fn default_dispatch_max_backoff_seconds() -> u64 {
    3600
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/var/run/relay/relayd.sock")
}

fn default_poll_interval_ms() -> u64 {
    2000
}

impl Config {
    pub fn from_toml(source: &str) -> Result<Config, crate::error::EngineError> {
        toml::from_str(source).map_err(|e| crate::error::EngineError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Config, crate::error::EngineError> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| crate::error::EngineError::Config(format!("reading {}: {e}", path.display())))?;
        Self::from_toml(&source)
    }

    pub fn server_tz(&self) -> Tz {
        self.server_time.parse().unwrap_or(chrono_tz::UTC)
    }

    pub fn local_tz(&self) -> Tz {
        self.local_time.parse().unwrap_or(chrono_tz::UTC)
    }
}

impl Default for ProcessingLogsConfig {
    fn default() -> Self {
        ProcessingLogsConfig { logs_file_store: None, discard_logs: false }
    }
}

/// An immutable view of [`Config`] handed to a worker loop iteration. A
/// thin newtype rather than a type alias so call sites read as "the
/// snapshot for this iteration" instead of "the mutable config".
#[derive(Debug, Clone)]
pub struct ConfigSnapshot(std::sync::Arc<Config>);

impl ConfigSnapshot {
    pub fn new(config: Config) -> Self {
        ConfigSnapshot(std::sync::Arc::new(config))
    }
}

impl std::ops::Deref for ConfigSnapshot {
    type Target = Config;
    fn deref(&self) -> &Config {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_fields_are_absent() {
        let config = Config::from_toml(
            r#"
            spool_root = "/spool"
            bookkeeper_url = "http://localhost:8080"
            [rules]
        "#,
        )
        .unwrap();
        assert_eq!(config.study_complete_trigger_seconds, 60);
        assert_eq!(config.server_time, "UTC");
        assert!(!config.support_root_modules);
        assert_eq!(config.chown_helper_image, "busybox:1.36");
        assert_eq!(config.socket_path, std::path::PathBuf::from("/var/run/relay/relayd.sock"));
    }

    #[test]
    fn unknown_timezone_falls_back_to_utc() {
        let config = Config::from_toml(
            r#"
            spool_root = "/spool"
            bookkeeper_url = "http://localhost:8080"
            server_time = "Not/A/Zone"
            [rules]
        "#,
        )
        .unwrap();
        assert_eq!(config.server_tz(), chrono_tz::UTC);
    }
}
