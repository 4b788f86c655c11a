// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A generic polling driver shared by every stage's worker loop: poll the
//! spool for ready units, process each in folder-name order, sleep, repeat
//! until cancelled.

use crate::config::{Config, ConfigSnapshot};
use crate::error::EngineError;
use relay_core::{Stage, UnitRef};
use relay_spool::Spool;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// What happened to one unit during a scan.
#[derive(Debug)]
pub enum StageOutcome {
    /// The unit moved on, stayed put awaiting more input, or was otherwise
    /// handled without incident.
    Handled,
    /// The unit's folder is locked or not yet ready; skip it this scan.
    Skipped,
}

/// One pipeline stage's scan behavior. Implementors own no mutable state
/// across calls beyond what they construct fresh per `process_unit` —
/// cross-unit state lives on disk in `task.json`, not in shared in-memory
/// state between stages.
#[async_trait::async_trait]
pub trait StageWorker: Send + Sync {
    /// The stage this worker scans.
    fn stage(&self) -> Stage;

    /// Units in this stage eligible for this scan, already filtered for
    /// locks and readiness.
    fn scan_ready(&self, spool: &Spool) -> Result<Vec<UnitRef>, EngineError> {
        Ok(spool.scan_ready(self.stage())?)
    }

    /// Handles one unit. Implementors acquire the unit's lock themselves so
    /// that failure paths (moving to `error/`) can still release it.
    async fn process_unit(&self, spool: &Spool, unit: UnitRef) -> Result<StageOutcome, EngineError>;

    /// Applies a freshly re-read [`ConfigSnapshot`] at the start of a scan
    /// iteration. Most workers have nothing hot-reloadable and keep the
    /// default no-op; stages with operator-tunable knobs (aggregation
    /// trigger windows, dispatch retry policy) override this.
    fn refresh(&self, _snapshot: &ConfigSnapshot) {}
}

/// Runs `worker`'s scan loop until `cancellation` fires, sleeping
/// `poll_interval` between scans. A halted stage (`.halt` marker present)
/// idles without dropping in-flight work. When `config_path` is set, the
/// config file is re-read fresh at the top of every iteration and handed
/// to `worker.refresh` as an immutable [`ConfigSnapshot`], so a changed
/// trigger window or retry policy takes effect without a daemon restart.
pub async fn run_scan_loop(
    worker: &dyn StageWorker,
    spool: &Spool,
    poll_interval: Duration,
    cancellation: &CancellationToken,
    config_path: Option<&Path>,
) {
    loop {
        if cancellation.is_cancelled() {
            return;
        }

        if let Some(path) = config_path {
            match Config::load(path) {
                Ok(config) => worker.refresh(&ConfigSnapshot::new(config)),
                Err(error) => tracing::error!(stage = %worker.stage(), %error, "failed to reload configuration"),
            }
        }

        if !spool.is_halted(worker.stage()) {
            match worker.scan_ready(spool) {
                Ok(units) => {
                    for unit in units {
                        if cancellation.is_cancelled() {
                            return;
                        }
                        let folder = unit.folder.clone();
                        match worker.process_unit(spool, unit).await {
                            Ok(StageOutcome::Handled) => {}
                            Ok(StageOutcome::Skipped) => {
                                tracing::debug!(stage = %worker.stage(), folder, "skipped unit");
                            }
                            Err(error) => {
                                tracing::error!(stage = %worker.stage(), folder, %error, "unit processing failed");
                            }
                        }
                    }
                }
                Err(error) => {
                    tracing::error!(stage = %worker.stage(), %error, "scan failed");
                }
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            _ = cancellation.cancelled() => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use relay_core::Task;
    use std::sync::Arc;

    struct CountingWorker {
        stage: Stage,
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait::async_trait]
    impl StageWorker for CountingWorker {
        fn stage(&self) -> Stage {
            self.stage
        }

        async fn process_unit(&self, _spool: &Spool, unit: UnitRef) -> Result<StageOutcome, EngineError> {
            self.seen.lock().push(unit.folder);
            Ok(StageOutcome::Handled)
        }
    }

    fn write_task(folder: &std::path::Path, id: &str) {
        std::fs::create_dir_all(folder).unwrap();
        let task = crate::test_support::sample_series_task(id);
        task.save(folder).unwrap();
        let _ = Task::load(folder).unwrap();
    }

    #[tokio::test]
    async fn loop_exits_promptly_once_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let spool = Spool::new(dir.path());
        spool.ensure_layout().unwrap();
        write_task(&spool.stage_dir(Stage::Incoming).join("u1"), "tsk-1");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let worker = CountingWorker { stage: Stage::Incoming, seen: seen.clone() };
        let token = CancellationToken::new();
        token.cancel();

        run_scan_loop(&worker, &spool, Duration::from_millis(10), &token, None).await;
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn one_pass_processes_all_ready_units() {
        let dir = tempfile::tempdir().unwrap();
        let spool = Spool::new(dir.path());
        spool.ensure_layout().unwrap();
        write_task(&spool.stage_dir(Stage::Incoming).join("u1"), "tsk-1");
        write_task(&spool.stage_dir(Stage::Incoming).join("u2"), "tsk-2");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let worker = CountingWorker { stage: Stage::Incoming, seen: seen.clone() };
        let token = CancellationToken::new();

        let handle = tokio::spawn({
            let token = token.clone();
            async move {
                run_scan_loop(&worker, &spool, Duration::from_millis(10), &token, None).await;
            }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
        handle.await.unwrap();

        let mut names = seen.lock().clone();
        names.sort();
        assert_eq!(names, vec!["u1".to_string(), "u2".to_string()]);
    }

    struct RefreshCountingWorker {
        refreshes: Arc<Mutex<Vec<u64>>>,
    }

    #[async_trait::async_trait]
    impl StageWorker for RefreshCountingWorker {
        fn stage(&self) -> Stage {
            Stage::Incoming
        }

        async fn process_unit(&self, _spool: &Spool, _unit: UnitRef) -> Result<StageOutcome, EngineError> {
            Ok(StageOutcome::Handled)
        }

        fn refresh(&self, snapshot: &ConfigSnapshot) {
            self.refreshes.lock().push(snapshot.study_complete_trigger_seconds);
        }
    }

    #[tokio::test]
    async fn a_config_path_is_re_read_and_handed_to_refresh_each_iteration() {
        let dir = tempfile::tempdir().unwrap();
        let spool = Spool::new(dir.path());
        spool.ensure_layout().unwrap();

        let config_path = dir.path().join("relayd.toml");
        std::fs::write(
            &config_path,
            r#"
            spool_root = "/spool"
            bookkeeper_url = "http://localhost:8080"
            study_complete_trigger_seconds = 42
            [rules]
        "#,
        )
        .unwrap();

        let refreshes = Arc::new(Mutex::new(Vec::new()));
        let worker = RefreshCountingWorker { refreshes: refreshes.clone() };
        let token = CancellationToken::new();

        let handle = tokio::spawn({
            let token = token.clone();
            async move {
                run_scan_loop(&worker, &spool, Duration::from_millis(10), &token, Some(&config_path)).await;
            }
        });
        tokio::time::sleep(Duration::from_millis(25)).await;
        token.cancel();
        handle.await.unwrap();

        let seen = refreshes.lock();
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|&value| value == 42));
    }
}
