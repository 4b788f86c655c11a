// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Requests the admin CLI sends to the daemon over the Unix socket.

use relay_core::Stage;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check.
    Ping,

    /// Version handshake.
    Hello { version: String },

    /// Overall daemon status: per-stage counts, halt state, uptime.
    Status,

    /// Lists the units sitting in one stage's directory.
    ListUnits { stage: Stage },

    /// Fetches one unit's full task document.
    UnitDetail { id: String },

    /// Forces a study or patient to complete immediately, bypassing its
    /// configured trigger, the way an operator would from the queue view.
    ForceComplete { id: String },

    /// Resets a unit's dispatch state and moves it back to `incoming` for
    /// reprocessing, optionally overriding its processing settings.
    /// `force` additionally clears a stale (> 5 minute old) `.processing`
    /// marker left behind in the destination stage.
    Restart {
        id: String,
        #[serde(default)]
        force: bool,
        #[serde(default)]
        with_settings: Option<Value>,
    },

    /// Deletes a unit outright (from `error` or `discard`, typically).
    Delete { id: String },
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
