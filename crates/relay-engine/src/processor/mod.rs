// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runs a unit's container processing pipeline inside `processing/<id>/`.

mod fs_ops;

use crate::error::EngineError;
use crate::scan_loop::{StageOutcome, StageWorker};
use chrono::Utc;
use relay_adapters::{AdapterError, BookkeeperClient, ContainerRuntime, ContainerSpec, ImagePullThrottle, Mount, SecurityPolicy, SignatureVerifier};
use relay_core::{Action, EventKind, FailStage, NetworkMode, Process, Stage, TaskEvent, UnitRef};
use relay_spool::Spool;
use std::path::Path;
use std::time::{Duration, Instant};

/// Runtime-level knobs the processor needs beyond what a single
/// [`TaskProcessing`](relay_core::TaskProcessing) step carries.
pub struct ProcessorSettings {
    pub uid: u32,
    pub gid: u32,
    pub support_root_modules: bool,
    pub discard_logs: bool,
    pub container_timeout: Duration,
    /// Image for the privileged helper container that chowns `out/` back
    /// to `uid:gid` after each module run, since a module allowed to run
    /// as root leaves output owned by a UID the processor itself has no
    /// permission to reclaim.
    pub chown_helper_image: String,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        ProcessorSettings {
            uid: 1000,
            gid: 1000,
            support_root_modules: false,
            discard_logs: false,
            container_timeout: Duration::from_secs(3600),
            chown_helper_image: "busybox:1.36".to_string(),
        }
    }
}

pub struct Processor<R, B, V> {
    runtime: R,
    bookkeeper: B,
    verifier: V,
    throttle: ImagePullThrottle,
    settings: ProcessorSettings,
}

impl<R, B, V> Processor<R, B, V>
where
    R: ContainerRuntime,
    B: BookkeeperClient,
    V: SignatureVerifier,
{
    pub fn new(runtime: R, bookkeeper: B, verifier: V, settings: ProcessorSettings) -> Self {
        Processor { runtime, bookkeeper, verifier, throttle: ImagePullThrottle::default(), settings }
    }

    async fn fail_unit(&self, spool: &Spool, unit: &UnitRef, mut task: relay_core::Task, reason: &str) -> Result<StageOutcome, EngineError> {
        task.info.fail_stage = Some(FailStage::Processing);
        task.save(&unit.path)?;
        let lock = spool.acquire_lock(&unit.path)?;
        spool.unmark_processing(&unit.path)?;
        self.bookkeeper
            .emit(TaskEvent::new(task.id, EventKind::TaskError, Utc::now()).with_fail_stage(FailStage::Processing).with_message(reason))
            .await?;
        spool.move_unit(unit, lock, Stage::Error, task.id.as_str())?;
        Ok(StageOutcome::Handled)
    }

    /// Runs a privileged helper container that `chown -R`s `dir` back to
    /// the invoker's `uid:gid`. A module allowed to run as root (an
    /// embedded app manifest, or `requires_root`) otherwise leaves `out/`
    /// owned by a UID the processor's own, unprivileged process can't
    /// reclaim on its own.
    async fn chown_back(&self, dir: &Path) -> Result<(), EngineError> {
        let spec = ContainerSpec {
            image: self.settings.chown_helper_image.clone(),
            command: Some(vec!["chown".to_string(), "-R".to_string(), format!("{}:{}", self.settings.uid, self.settings.gid), "/tmp/output".to_string()]),
            environment: Default::default(),
            mounts: vec![Mount::rw(dir, "/tmp/output")],
            security: SecurityPolicy::privileged(),
            network_mode: NetworkMode::None,
            timeout: self.settings.container_timeout,
        };
        let outcome = self.runtime.run(&spec).await?;
        if !outcome.succeeded() {
            return Err(AdapterError::CommandFailed { runtime: "chown-helper", message: outcome.logs }.into());
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl<R, B, V> StageWorker for Processor<R, B, V>
where
    R: ContainerRuntime,
    B: BookkeeperClient,
    V: SignatureVerifier,
{
    fn stage(&self) -> Stage {
        Stage::Processing
    }

    async fn process_unit(&self, spool: &Spool, unit: UnitRef) -> Result<StageOutcome, EngineError> {
        let mut task = relay_core::Task::load(&unit.path)?;
        // Held only long enough to set `.processing`; the marker itself
        // (not `.lock`) is what keeps the scan loop from picking this unit
        // up again while the container run, which can take hours, is in
        // flight.
        let start_lock = spool.acquire_lock(&unit.path)?;
        spool.mark_processing(&unit.path)?;
        start_lock.release()?;

        let in_dir = unit.path.join("in");
        let out_dir = unit.path.join("out");
        let as_received_dir = unit.path.join("as_received");
        fs_ops::snapshot_as_received(&unit.path, &as_received_dir)?;
        fs_ops::move_top_level_files(&unit.path, &in_dir)?;
        std::fs::create_dir_all(&out_dir).map_err(|source| EngineError::Spool(relay_spool::SpoolError::io(&out_dir, source)))?;

        let input_count = fs_ops::count_dicom_files(&in_dir)?;
        self.bookkeeper
            .emit(TaskEvent::new(task.id, EventKind::ProcessBegin, Utc::now()).with_message(format!("{input_count} input files")))
            .await?;

        let steps: Vec<_> = task.process.steps().to_vec();
        let mut outputs: Vec<(String, serde_json::Value)> = Vec::new();
        let first_step_retains = steps.first().is_some_and(|step| step.retain_input_images);
        if first_step_retains {
            fs_ops::copy_tree(&in_dir, &unit.path.join("input_files"))?;
        }

        for (index, step) in steps.iter().enumerate() {
            if self.throttle.should_pull(&step.docker_tag, Instant::now()) {
                let started = Instant::now();
                let pull = match self.runtime.pull(&step.docker_tag).await {
                    Ok(pull) => pull,
                    Err(error) => return self.fail_unit(spool, &unit, task, &error.to_string()).await,
                };
                self.throttle.record_pull(&step.docker_tag, Instant::now());
                self.bookkeeper
                    .emit(
                        TaskEvent::new(task.id, EventKind::ImageDownload, Utc::now())
                            .with_message(format!("{} digest={} took={:?}", step.docker_tag, pull.digest, started.elapsed())),
                    )
                    .await?;
            }

            if step.requires_signature() {
                let identity = step.certificate_identity().unwrap_or_default();
                let issuer = step.certificate_oidc_issuer().unwrap_or_default();
                if let Err(error) = self.verifier.verify(&step.docker_tag, identity, issuer).await {
                    return self.fail_unit(spool, &unit, task, &error.to_string()).await;
                }
            }

            // An embedded app manifest would normally be discovered by
            // inspecting the image itself; lacking that, a module declares
            // its override directly in `settings.app_manifest_command`.
            let manifest_command = step
                .settings
                .get("app_manifest_command")
                .and_then(|value| value.as_array())
                .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect::<Vec<_>>());
            let requires_root = step.requires_root || manifest_command.is_some();

            if requires_root && !self.settings.support_root_modules {
                return self.fail_unit(spool, &unit, task, "module requires root but root modules are disabled").await;
            }

            let security = if requires_root {
                SecurityPolicy::locked_down(self.settings.uid, self.settings.gid).allowing_root()
            } else {
                SecurityPolicy::locked_down(self.settings.uid, self.settings.gid)
            };

            let mut environment = step.environment.clone();
            environment.insert("MERCURE_IN_DIR".to_string(), "/tmp/data".to_string());
            environment.insert("MERCURE_OUT_DIR".to_string(), "/tmp/output".to_string());
            environment.insert("MONAI_DATA_PATH".to_string(), "/tmp/data".to_string());
            environment.insert("HOLOSCAN_INPUT_PATH".to_string(), "/tmp/data".to_string());
            environment.insert("HOLOSCAN_OUTPUT_PATH".to_string(), "/tmp/output".to_string());

            let mut mounts = vec![Mount::rw(&in_dir, "/tmp/data"), Mount::rw(&out_dir, "/tmp/output")];
            if step.requires_persistence {
                let persistence_dir = persistence_dir_for(&unit.path, step.persistence_folder_name.as_deref());
                std::fs::create_dir_all(&persistence_dir)
                    .map_err(|source| EngineError::Spool(relay_spool::SpoolError::io(&persistence_dir, source)))?;
                mounts.push(Mount::rw(&persistence_dir, "/tmp/persistence"));
            }

            fs_ops::make_group_writable(&in_dir)?;

            let spec = ContainerSpec {
                image: step.docker_tag.clone(),
                command: manifest_command,
                environment,
                mounts,
                security,
                network_mode: step.network_mode.clone(),
                timeout: self.settings.container_timeout,
            };

            task.process = task.process.narrowed_to(index);
            task.save(&in_dir)?;

            self.bookkeeper.emit(TaskEvent::new(task.id, EventKind::ProcessBegin, Utc::now()).with_message(step.module_name.clone())).await?;
            let outcome = match self.runtime.run(&spec).await {
                Ok(outcome) => outcome,
                Err(error) => return self.fail_unit(spool, &unit, task, &error.to_string()).await,
            };

            if !self.settings.discard_logs {
                self.bookkeeper
                    .emit(TaskEvent::new(task.id, EventKind::ProcessComplete, Utc::now()).with_message(outcome.logs.clone()))
                    .await?;
            }

            if !outcome.succeeded() {
                return self.fail_unit(spool, &unit, task, &format!("module {} exited {}", step.module_name, outcome.exit_code)).await;
            }

            if let Err(error) = self.chown_back(&out_dir).await {
                return self.fail_unit(spool, &unit, task, &error.to_string()).await;
            }

            fs_ops::make_group_writable(&out_dir)?;

            let module_output = fs_ops::read_result_json(&out_dir)?.unwrap_or(serde_json::Value::Null);
            outputs.push((step.module_name.clone(), module_output));

            if index + 1 < steps.len() {
                fs_ops::rotate_out_to_in(&in_dir, &out_dir)?;
            }
        }

        task.process = Process::Pipeline(steps.clone());
        fs_ops::write_pipeline_result(&out_dir, &outputs)?;
        task.save(&out_dir)?;

        let output_count = fs_ops::count_dicom_files(&out_dir)?;
        self.bookkeeper
            .emit(TaskEvent::new(task.id, EventKind::ProcessComplete, Utc::now()).with_message(format!("{output_count} output files")))
            .await?;

        if first_step_retains {
            fs_ops::restore_input_files(&unit.path, &in_dir)?;
        }
        let _ = std::fs::remove_dir_all(&as_received_dir);

        let lock = spool.acquire_lock(&unit.path)?;
        spool.unmark_processing(&unit.path)?;
        let dest_stage = if task.info.action == Action::Both { Stage::Outgoing } else { Stage::Success };
        spool.move_unit(&unit, lock, dest_stage, task.id.as_str())?;
        Ok(StageOutcome::Handled)
    }
}

fn persistence_dir_for(unit_path: &Path, folder_name: Option<&str>) -> std::path::PathBuf {
    unit_path.join("persistence").join(folder_name.unwrap_or("default"))
}

#[cfg(test)]
#[path = "processor_tests.rs"]
mod tests;
