// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon-wide status: per-stage unit counts and halt state.

use relay_core::Stage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaemonStatus {
    pub uptime_secs: u64,
    /// Unit count per stage, keyed by directory name.
    pub stage_counts: BTreeMap<String, usize>,
    pub halted_stages: Vec<Stage>,
}

impl DaemonStatus {
    pub fn total_units(&self) -> usize {
        self.stage_counts.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_units_sums_all_stages() {
        let status = DaemonStatus {
            uptime_secs: 42,
            stage_counts: BTreeMap::from([("incoming".to_string(), 3), ("success".to_string(), 7)]),
            halted_stages: vec![],
        };
        assert_eq!(status.total_units(), 10);
    }
}
