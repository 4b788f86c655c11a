// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(not(test), forbid(unsafe_code))]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

//! relay-daemon: wires the stage workers and the admin socket together
//! into one long-running process, `relayd`.

pub mod admin;
pub mod env;
pub mod listener;
pub mod runtime_select;
pub mod verifier;

use relay_adapters::{HttpBookkeeperClient, StoreScuTarget};
use relay_engine::dispatcher::{Dispatcher, DispatcherSettings};
use relay_engine::processor::{Processor, ProcessorSettings};
use relay_engine::router::SeriesRouter;
use relay_engine::aggregator::{PatientAggregator, StudyAggregator};
use relay_engine::{run_scan_loop, Config, EngineError, StageWorker};
use relay_rules::ConfigRuleEvaluator;
use relay_spool::Spool;
use runtime_select::Runtime;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::info;
use verifier::Verifier;

/// Everything the daemon needs to run, built once from [`Config`] at
/// startup and shared across every spawned task.
pub struct Daemon {
    pub config: Config,
    pub config_path: PathBuf,
    pub spool: Arc<Spool>,
    pub evaluator: ConfigRuleEvaluator,
    pub bookkeeper: HttpBookkeeperClient,
    pub runtime: Runtime,
    pub verifier: Verifier,
    pub dispatch_target: StoreScuTarget,
    pub started_at: Instant,
}

impl Daemon {
    pub fn build(config: Config, config_path: PathBuf) -> Result<Self, EngineError> {
        let spool = Arc::new(Spool::new(&config.spool_root));
        spool.ensure_layout()?;

        let evaluator = ConfigRuleEvaluator::new(config.rules.clone());
        let bookkeeper = HttpBookkeeperClient::new(&config.bookkeeper_url);
        let runtime = Runtime::pick(config.processing_runtime_force_nomad, config.nomad_base_url.as_deref());
        let verifier = Verifier::new(runtime.clone(), config.signature_verifier_image.clone());
        let dispatch_target = StoreScuTarget::new(config.dispatch_targets.clone());

        Ok(Daemon { config, config_path, spool, evaluator, bookkeeper, runtime, verifier, dispatch_target, started_at: Instant::now() })
    }

    fn processor_settings(&self) -> ProcessorSettings {
        ProcessorSettings {
            support_root_modules: self.config.support_root_modules,
            discard_logs: self.config.processing_logs.discard_logs,
            chown_helper_image: self.config.chown_helper_image.clone(),
            ..ProcessorSettings::default()
        }
    }

    fn dispatcher_settings(&self) -> DispatcherSettings {
        DispatcherSettings {
            retries_cap: self.config.dispatch_retries_cap,
            base_backoff: Duration::from_secs(self.config.dispatch_base_backoff_seconds),
            max_backoff: Duration::from_secs(self.config.dispatch_max_backoff_seconds),
        }
    }

    fn workers(&self) -> Vec<Arc<dyn StageWorker>> {
        vec![
            Arc::new(SeriesRouter::new(self.evaluator.clone(), self.bookkeeper.clone())),
            Arc::new(StudyAggregator::new(
                self.evaluator.clone(),
                self.bookkeeper.clone(),
                self.config.study_complete_trigger_seconds,
                self.config.study_forcecomplete_trigger_seconds,
            )),
            Arc::new(PatientAggregator::new(
                self.evaluator.clone(),
                self.bookkeeper.clone(),
                self.config.patient_complete_trigger_seconds,
                self.config.patient_forcecomplete_trigger_seconds,
            )),
            Arc::new(Processor::new(self.runtime.clone(), self.bookkeeper.clone(), self.verifier.clone(), self.processor_settings())),
            Arc::new(Dispatcher::new(self.dispatch_target.clone(), self.bookkeeper.clone(), self.dispatcher_settings())),
        ]
    }

    /// Spawns one scan loop per stage worker plus the admin listener, and
    /// runs until `cancellation` fires.
    pub async fn run(self, cancellation: CancellationToken) -> std::io::Result<()> {
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let socket_path = self.config.socket_path.clone();
        let config_path = self.config_path.clone();
        let spool = Arc::clone(&self.spool);
        let evaluator = self.evaluator.clone();
        let started_at = self.started_at;
        let workers = self.workers();

        let mut handles = Vec::new();
        for worker in workers {
            let spool = Arc::clone(&spool);
            let cancellation = cancellation.clone();
            let config_path = config_path.clone();
            handles.push(tokio::spawn(async move {
                info!(stage = ?worker.stage(), "starting scan loop");
                run_scan_loop(worker.as_ref(), &spool, poll_interval, &cancellation, Some(&config_path)).await;
            }));
        }

        let admin = listener::AdminListener::new(socket_path, spool, evaluator, self.bookkeeper.clone(), started_at);
        handles.push(tokio::spawn(async move {
            if let Err(err) = admin.serve(cancellation).await {
                tracing::error!(error = %err, "admin listener exited with an error");
            }
        }));

        for handle in handles {
            let _ = handle.await;
        }
        Ok(())
    }
}
