// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpoolError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is already locked")]
    AlreadyLocked { path: PathBuf },

    #[error("{path} is not ready (no task.json and no payload yet)")]
    NotReady { path: PathBuf },

    #[error("task error: {0}")]
    Task(#[from] relay_core::TaskError),
}

impl SpoolError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SpoolError::Io { path: path.into(), source }
    }
}
