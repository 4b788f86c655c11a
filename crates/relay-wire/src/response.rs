// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::{DaemonStatus, UnitDetail, UnitSummary};
use serde::{Deserialize, Serialize};

/// Response from the daemon back to the admin CLI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    Pong,

    Hello { version: String },

    Ok,

    Error { message: String },

    Status { status: DaemonStatus },

    Units { units: Vec<UnitSummary> },

    Unit { unit: Option<Box<UnitDetail>> },

    Deleted { id: String },

    Restarted { id: String },

    ForceCompleted { id: String },
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
