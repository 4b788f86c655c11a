// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The nine well-known spool stages and a reference to a unit living
//! inside one of them.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One of the nine well-known directories under the spool root.
///
/// Progress across stages is monotonic except via the explicit restart
/// path: a unit never skips a stage and never regresses except when an
/// operator restarts it from `error/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Incoming,
    Studies,
    Patients,
    Processing,
    Outgoing,
    Success,
    Error,
    Discard,
    /// Job-queue style auxiliary folder used by the restart admin for
    /// staged operator requests.
    Jobs,
}

impl Stage {
    /// All nine stages, in the order a healthy unit visits them.
    pub const ALL: [Stage; 9] = [
        Stage::Incoming,
        Stage::Studies,
        Stage::Patients,
        Stage::Processing,
        Stage::Outgoing,
        Stage::Success,
        Stage::Error,
        Stage::Discard,
        Stage::Jobs,
    ];

    /// Directory name under the spool root.
    pub fn dir_name(self) -> &'static str {
        match self {
            Stage::Incoming => "incoming",
            Stage::Studies => "studies",
            Stage::Patients => "patients",
            Stage::Processing => "processing",
            Stage::Outgoing => "outgoing",
            Stage::Success => "success",
            Stage::Error => "error",
            Stage::Discard => "discard",
            Stage::Jobs => "jobs",
        }
    }

    /// Whether this stage supports a `.halt` marker at its root (only
    /// `processing/` and `outgoing/` do).
    pub fn supports_halt(self) -> bool {
        matches!(self, Stage::Processing | Stage::Outgoing)
    }

    /// The terminal stages a unit can end its life in.
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Success | Stage::Error | Stage::Discard)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// A reference to a unit folder living in some stage of the spool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitRef {
    pub stage: Stage,
    /// Folder name. Before the first hop this may be a bare series UID or
    /// a throwaway UUID; from the first `task.json` write onward it is the
    /// task's [`crate::TaskId`].
    pub folder: String,
    pub path: PathBuf,
}

impl UnitRef {
    pub fn new(stage: Stage, root: &std::path::Path, folder: impl Into<String>) -> Self {
        let folder = folder.into();
        let path = root.join(stage.dir_name()).join(&folder);
        Self { stage, folder, path }
    }
}
