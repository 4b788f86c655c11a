// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end fixtures exercising the spool directory protocol across
//! stage boundaries, against a temp spool and fake `ContainerRuntime`/
//! `BookkeeperClient`/`DispatchTarget` adapters. Each scenario drives real
//! stage workers (`SeriesRouter`, `StudyAggregator`, `PatientAggregator`,
//! `Processor`, `Dispatcher`) with a real `ConfigRuleEvaluator`, so the
//! rule-matching and completion-expression grammar are exercised exactly
//! as a deployed daemon would use them, not through a fake evaluator.

use relay_adapters::runtime::{ContainerOutcome, ContainerSpec, PullOutcome};
use relay_adapters::test_support::{FakeBookkeeperClient, FakeContainerRuntime, FakeDispatchTarget};
use relay_adapters::{AdapterError, BookkeeperClient, ContainerRuntime, SignatureVerifier};
use relay_core::{
    Action, ForceCompleteAction, NetworkMode, Process, Resources, Stage, StudyCompleteTrigger, StudyInfo, Task,
    TaskEvent, TaskId, TaskInfo, TaskProcessing, UidType, UnitRef,
};
use relay_engine::aggregator::{PatientAggregator, StudyAggregator};
use relay_engine::dispatcher::{Dispatcher, DispatcherSettings};
use relay_engine::processor::{Processor, ProcessorSettings};
use relay_engine::router::SeriesRouter;
use relay_engine::{StageOutcome, StageWorker};
use relay_rules::{ConfigRuleEvaluator, RuleSet};
use relay_spool::Spool;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn new_spool() -> (tempfile::TempDir, Spool) {
    let dir = tempfile::tempdir().unwrap();
    let spool = Spool::new(dir.path());
    spool.ensure_layout().unwrap();
    (dir, spool)
}

fn write_series(dir: &Path, folder: &str, tags: &str) -> std::path::PathBuf {
    let series_dir = dir.join(folder);
    fs::create_dir_all(&series_dir).unwrap();
    fs::write(series_dir.join("1.dcm.tags"), tags).unwrap();
    fs::write(series_dir.join("1.dcm"), b"dicom-bytes").unwrap();
    series_dir
}

fn evaluator(toml: &str) -> ConfigRuleEvaluator {
    ConfigRuleEvaluator::new(RuleSet::from_toml(toml).unwrap())
}

fn processing_step(name: &str) -> TaskProcessing {
    TaskProcessing {
        module_name: name.to_string(),
        docker_tag: format!("registry/{name}:latest"),
        additional_volumes: vec![],
        environment: Default::default(),
        docker_arguments: vec![],
        constraints: Default::default(),
        resources: Resources::default(),
        requires_root: false,
        requires_persistence: false,
        persistence_folder_name: None,
        network_mode: NetworkMode::Bridge,
        settings: Default::default(),
        retain_input_images: false,
    }
}

fn processing_task(process: Process, action: Action) -> Task {
    Task {
        id: TaskId::new(),
        parent_id: None,
        info: TaskInfo {
            action,
            applied_rule: "r1".to_string(),
            triggered_rules: Default::default(),
            uid: "1.2.3".to_string(),
            uid_type: UidType::Series,
            mrn: None,
            acc: None,
            fail_stage: None,
        },
        study: None,
        patient: None,
        process,
        dispatch: None,
    }
}

/// A minimal merged study-level task, as the study aggregator would have
/// written it into `patients/<mrn>_<rule>/<study_uid>/task.json` once its
/// series had completed.
fn merged_study_task(study_uid: &str, rule_name: &str, mrn: &str, received_series_uid: Vec<String>) -> Task {
    let now = chrono::Utc::now();
    Task {
        id: TaskId::new(),
        parent_id: None,
        info: TaskInfo {
            action: Action::Route,
            applied_rule: rule_name.to_string(),
            triggered_rules: Default::default(),
            uid: study_uid.to_string(),
            uid_type: UidType::Study,
            mrn: Some(mrn.to_string()),
            acc: None,
            fail_stage: None,
        },
        study: Some(StudyInfo {
            study_uid: study_uid.to_string(),
            creation_time: now,
            last_receive_time: now,
            complete_trigger: StudyCompleteTrigger::Timeout,
            complete_required_series: None,
            complete_force: false,
            complete_force_action: ForceCompleteAction::Ignore,
            received_series: received_series_uid.clone(),
            received_series_uid,
        }),
        patient: None,
        process: Process::None,
        dispatch: None,
    }
}

/// (1) A single route-only series moves `incoming/ -> outgoing/<id> ->
/// success/<id>` once the dispatcher's target succeeds.
#[tokio::test]
async fn single_series_routes_straight_through_to_success() {
    let (dir, spool) = new_spool();
    write_series(
        &spool.stage_dir(Stage::Incoming),
        "1.2.3",
        r#"{"SeriesInstanceUID":"1.2.3","StudyInstanceUID":"1.2.study","Modality":"CT"}"#,
    );

    let rules = evaluator(
        r#"
        [rules.route_ct]
        action = "route"
        trigger_scope = "series"
        target_name = "pacs-a"

        [[rules.route_ct.conditions]]
        kind = "modality_in"
        modalities = ["CT"]
        "#,
    );
    let router = SeriesRouter::new(rules, FakeBookkeeperClient::default());
    let unit = UnitRef::new(Stage::Incoming, dir.path(), "1.2.3");
    let outcome = router.process_unit(&spool, unit).await.unwrap();
    assert!(matches!(outcome, StageOutcome::Handled));

    let outgoing = spool.folder_names(Stage::Outgoing).unwrap();
    assert_eq!(outgoing.len(), 1);
    let task_id = outgoing[0].clone();

    let dispatcher = Dispatcher::new(FakeDispatchTarget::succeeding(), FakeBookkeeperClient::default(), DispatcherSettings::default());
    let unit = UnitRef::new(Stage::Outgoing, dir.path(), task_id.clone());
    let outcome = dispatcher.process_unit(&spool, unit).await.unwrap();
    assert!(matches!(outcome, StageOutcome::Handled));

    let dest = spool.stage_dir(Stage::Success).join(&task_id);
    assert!(dest.exists());
    let task = Task::load(&dest).unwrap();
    assert!(task.dispatch.unwrap().all_succeeded());
}

/// (2) A study with `study_complete_trigger_seconds = 0` is complete as
/// soon as its one series arrives and no sibling is still sitting in
/// `incoming/`.
#[tokio::test]
async fn study_completes_on_timeout_once_no_sibling_series_are_pending() {
    let (dir, spool) = new_spool();
    let study_uid = "1.2.study";
    let study_dir = spool.stage_dir(Stage::Studies).join(format!("{study_uid}_mri_brain"));
    write_series(
        &study_dir,
        "1.2.series.1",
        &format!(r#"{{"SeriesInstanceUID":"1.2.series.1","StudyInstanceUID":"{study_uid}","SeriesDescription":"T1"}}"#),
    );

    let rules = evaluator(
        r#"
        [rules.mri_brain]
        action = "route"
        trigger_scope = "study"
        study_complete_trigger = "timeout"
        study_complete_trigger_seconds = 0
        study_complete_force_action = "ignore"
        target_name = "pacs-a"
        "#,
    );
    let aggregator = StudyAggregator::new(rules, FakeBookkeeperClient::default(), 60, 86_400);
    let unit = UnitRef::new(Stage::Studies, dir.path(), format!("{study_uid}_mri_brain"));
    let outcome = aggregator.process_unit(&spool, unit).await.unwrap();

    assert!(matches!(outcome, StageOutcome::Handled));
    assert_eq!(spool.folder_names(Stage::Outgoing).unwrap().len(), 1);
}

/// (3) A study configured with `study_complete_trigger = "received_series"`
/// and required expression `"T1 and T2"` stays in `studies/` until both
/// named series have arrived.
#[tokio::test]
async fn study_waits_for_both_named_series_before_completing() {
    let (dir, spool) = new_spool();
    let study_uid = "1.2.study";
    let study_folder = format!("{study_uid}_mri_brain");
    let study_dir = spool.stage_dir(Stage::Studies).join(&study_folder);
    write_series(
        &study_dir,
        "1.2.series.t1",
        &format!(r#"{{"SeriesInstanceUID":"1.2.series.t1","StudyInstanceUID":"{study_uid}","SeriesDescription":"T1"}}"#),
    );

    let rules = evaluator(
        r#"
        [rules.mri_brain]
        action = "route"
        trigger_scope = "study"
        study_complete_trigger = "received_series"
        study_complete_required_series = "T1 and T2"
        study_complete_force_action = "ignore"
        target_name = "pacs-a"
        "#,
    );
    let aggregator = StudyAggregator::new(rules, FakeBookkeeperClient::default(), 300, 86_400);
    let unit = UnitRef::new(Stage::Studies, dir.path(), study_folder.clone());
    let outcome = aggregator.process_unit(&spool, unit).await.unwrap();
    assert!(matches!(outcome, StageOutcome::Skipped));
    assert!(spool.folder_names(Stage::Outgoing).unwrap().is_empty());

    write_series(
        &study_dir,
        "1.2.series.t2",
        &format!(r#"{{"SeriesInstanceUID":"1.2.series.t2","StudyInstanceUID":"{study_uid}","SeriesDescription":"T2"}}"#),
    );
    let unit = UnitRef::new(Stage::Studies, dir.path(), study_folder);
    let outcome = aggregator.process_unit(&spool, unit).await.unwrap();
    assert!(matches!(outcome, StageOutcome::Handled));
    assert_eq!(spool.folder_names(Stage::Outgoing).unwrap().len(), 1);
}

/// (4) Two studies sharing an MRN are folded into one patient aggregate
/// once both are present, per a `received_studies` completion expression.
#[tokio::test]
async fn patient_aggregates_two_studies_sharing_an_mrn() {
    let (dir, spool) = new_spool();
    let mrn = "mrn1";
    let patient_folder = format!("{mrn}_mri_brain_patient");
    let patient_dir = spool.stage_dir(Stage::Patients).join(&patient_folder);

    let rules = evaluator(
        r#"
        [rules.mri_brain_patient]
        action = "route"
        trigger_scope = "patient"
        patient_complete_trigger = "received_studies"
        patient_complete_required_studies = "study1 and study2"
        patient_complete_force_action = "ignore"
        target_name = "pacs-a"
        "#,
    );

    for (study_uid, series_uid) in [("study1", "1.2.series.1"), ("study2", "1.2.series.2")] {
        let study_dir = patient_dir.join(study_uid);
        let series_dir = study_dir.join(series_uid);
        fs::create_dir_all(&series_dir).unwrap();
        fs::write(
            series_dir.join("1.dcm.tags"),
            format!(r#"{{"SeriesInstanceUID":"{series_uid}","StudyInstanceUID":"{study_uid}","Modality":"MR"}}"#),
        )
        .unwrap();

        let study_task = merged_study_task(study_uid, "mri_brain_patient", mrn, vec![series_uid.to_string()]);
        study_task.save(&study_dir).unwrap();
    }

    let aggregator = PatientAggregator::new(rules, FakeBookkeeperClient::default(), 86_400, 86_400);
    let unit = UnitRef::new(Stage::Patients, dir.path(), patient_folder);
    let outcome = aggregator.process_unit(&spool, unit).await.unwrap();
    assert!(matches!(outcome, StageOutcome::Handled));

    let outgoing = spool.folder_names(Stage::Outgoing).unwrap();
    assert_eq!(outgoing.len(), 1);
    let task = Task::load(&spool.stage_dir(Stage::Outgoing).join(&outgoing[0])).unwrap();
    let patient = task.patient.unwrap();
    assert_eq!(patient.received_studies.len(), 2);
    assert_eq!(patient.received_modalities, vec!["MR".to_string()]);
}

/// (5) A two-module processing pipeline rotates `out/` into `in/` between
/// steps and writes an ordered `result.json`.
#[tokio::test]
async fn two_step_pipeline_writes_ordered_pipeline_result() {
    let (dir, spool) = new_spool();
    let task = processing_task(Process::Pipeline(vec![processing_step("m1"), processing_step("m2")]), Action::Process);
    let unit_dir = spool.stage_dir(Stage::Processing).join(task.id.as_str());
    fs::create_dir_all(&unit_dir).unwrap();
    fs::write(unit_dir.join("1.2.3#1.dcm"), b"dicom-bytes").unwrap();
    task.save(&unit_dir).unwrap();

    let processor = Processor::new(
        FakeContainerRuntime::succeeding(),
        FakeBookkeeperClient::default(),
        AlwaysOkVerifier,
        ProcessorSettings::default(),
    );
    let unit = UnitRef::new(Stage::Processing, dir.path(), task.id.as_str());
    let outcome = processor.process_unit(&spool, unit).await.unwrap();
    assert!(matches!(outcome, StageOutcome::Handled));

    let dest = spool.stage_dir(Stage::Success).join(task.id.as_str());
    let result: serde_json::Value = serde_json::from_str(&fs::read_to_string(dest.join("out").join("result.json")).unwrap()).unwrap();
    let entries = result.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0][0], "m1");
    assert_eq!(entries[1][0], "m2");
}

struct AlwaysOkVerifier;

#[async_trait::async_trait]
impl SignatureVerifier for AlwaysOkVerifier {
    async fn verify(&self, _image: &str, _identity: &str, _issuer: &str) -> Result<(), AdapterError> {
        Ok(())
    }
}

struct AlwaysRejectVerifier;

#[async_trait::async_trait]
impl SignatureVerifier for AlwaysRejectVerifier {
    async fn verify(&self, image: &str, _identity: &str, _issuer: &str) -> Result<(), AdapterError> {
        Err(AdapterError::SignatureVerificationFailed { image: image.to_string(), reason: "certificate identity mismatch".to_string() })
    }
}

/// A [`ContainerRuntime`] that counts how many times it was asked to run a
/// container; shared via `Arc` so the test keeps a handle after the
/// runtime itself is moved into a [`Processor`].
#[derive(Clone, Default)]
struct CountingRuntime {
    runs: Arc<Mutex<u32>>,
}

#[async_trait::async_trait]
impl ContainerRuntime for CountingRuntime {
    async fn pull(&self, _tag: &str) -> Result<PullOutcome, AdapterError> {
        Ok(PullOutcome { digest: "sha256:fake".to_string(), duration: Duration::from_millis(1) })
    }

    async fn run(&self, _spec: &ContainerSpec) -> Result<ContainerOutcome, AdapterError> {
        *self.runs.lock().unwrap() += 1;
        Ok(ContainerOutcome { exit_code: 0, logs: String::new() })
    }
}

/// A [`BookkeeperClient`] that records emitted events behind a shared
/// handle, for the same cross-move-visibility reason as [`CountingRuntime`].
#[derive(Clone, Default)]
struct RecordingBookkeeper {
    events: Arc<Mutex<Vec<TaskEvent>>>,
}

#[async_trait::async_trait]
impl BookkeeperClient for RecordingBookkeeper {
    async fn emit(&self, event: TaskEvent) -> Result<(), AdapterError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// (6) A module requiring a signature whose verifier rejects the image
/// never starts a container run; the unit lands in `error/` with
/// `fail_stage = processing` and a bookkeeper error event is recorded.
#[tokio::test]
async fn signed_module_rejection_never_starts_the_container() {
    let (dir, spool) = new_spool();
    let mut signed_step = processing_step("signed-module");
    signed_step.settings.insert("require_signature".to_string(), serde_json::json!(true));
    signed_step.settings.insert("certificate_identity".to_string(), serde_json::json!("someone@example.com"));
    let task = processing_task(Process::Single(Box::new(signed_step)), Action::Process);

    let unit_dir = spool.stage_dir(Stage::Processing).join(task.id.as_str());
    fs::create_dir_all(&unit_dir).unwrap();
    fs::write(unit_dir.join("1.2.3#1.dcm"), b"dicom-bytes").unwrap();
    task.save(&unit_dir).unwrap();

    let runtime = CountingRuntime::default();
    let bookkeeper = RecordingBookkeeper::default();
    let processor = Processor::new(runtime.clone(), bookkeeper.clone(), AlwaysRejectVerifier, ProcessorSettings::default());
    let unit = UnitRef::new(Stage::Processing, dir.path(), task.id.as_str());
    let outcome = processor.process_unit(&spool, unit).await.unwrap();
    assert!(matches!(outcome, StageOutcome::Handled));

    assert_eq!(*runtime.runs.lock().unwrap(), 0);

    let dest = spool.stage_dir(Stage::Error).join(task.id.as_str());
    let reloaded = Task::load(&dest).unwrap();
    assert_eq!(reloaded.info.fail_stage, Some(relay_core::FailStage::Processing));

    let events = bookkeeper.events.lock().unwrap();
    assert!(events.iter().any(|event| event.kind == relay_core::EventKind::TaskError));
}
