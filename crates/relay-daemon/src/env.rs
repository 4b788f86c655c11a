// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon binary.

use std::path::PathBuf;

/// Path to the TOML config file: `RELAY_CONFIG` > `/etc/relay/relayd.toml`.
pub fn config_path() -> PathBuf {
    std::env::var("RELAY_CONFIG").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("/etc/relay/relayd.toml"))
}

/// Directory for the daemon's own lock file and log output, distinct from
/// the spool root the engine scans: `RELAY_STATE_DIR` > `/var/run/relay`.
pub fn state_dir() -> PathBuf {
    std::env::var("RELAY_STATE_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("/var/run/relay"))
}

/// Overrides `tracing_subscriber::EnvFilter`'s default when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "info"
}
