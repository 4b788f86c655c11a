// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-tag image-pull throttle: a process-global map `tag ->
//! last_pull_time`, mutated only by the processor loop.
//!
//! Owned by the processor rather than a global static, so it can be
//! constructed fresh per test and shared via `Arc` across the processor's
//! worker loop iterations in production.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(3600);

pub struct ImagePullThrottle {
    last_pull: Mutex<HashMap<String, Instant>>,
    min_interval: Duration,
}

impl Default for ImagePullThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}

impl ImagePullThrottle {
    pub fn new(min_interval: Duration) -> Self {
        ImagePullThrottle { last_pull: Mutex::new(HashMap::new()), min_interval }
    }

    /// Whether `tag` is due for a pull at `now`: never pulled, or the last
    /// pull is older than the configured minimum interval.
    pub fn should_pull(&self, tag: &str, now: Instant) -> bool {
        match self.last_pull.lock().get(tag) {
            Some(last) => now.saturating_duration_since(*last) >= self.min_interval,
            None => true,
        }
    }

    pub fn record_pull(&self, tag: &str, now: Instant) {
        self.last_pull.lock().insert(tag.to_string(), now);
    }
}

#[cfg(test)]
#[path = "throttle_tests.rs"]
mod tests;
