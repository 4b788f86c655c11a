// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use relay_core::TaskError;
use relay_rules::RuleError;
use relay_spool::SpoolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Spool(#[from] SpoolError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Adapter(#[from] relay_adapters::AdapterError),

    #[error("missing DICOM tag sidecar at {0}")]
    MissingTagSidecar(std::path::PathBuf),

    #[error("malformed DICOM tag sidecar at {0}: {1}")]
    MalformedTagSidecar(std::path::PathBuf, serde_json::Error),

    #[error("no as_received/ snapshot for {0}, cannot restart a processing failure")]
    NoRestartSnapshot(String),

    #[error("task {0} has no fail_stage recorded, cannot determine restart shape")]
    NoFailStage(String),

    #[error("stale .processing marker for {0}, pass force=true to clear it")]
    StaleProcessingMarker(String),

    #[error("config error: {0}")]
    Config(String),
}
