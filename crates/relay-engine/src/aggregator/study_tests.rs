use super::*;
use relay_adapters::test_support::FakeBookkeeperClient;
use relay_core::UnitRef;
use relay_rules::{EvaluationResult, RuleError};
use std::collections::HashMap;
use std::fs;

struct FakeEvaluator {
    rules: HashMap<String, relay_rules::RuleConfig>,
}

impl RuleEvaluator for FakeEvaluator {
    fn evaluate(&self, _tags: &HashMap<String, String>, _scope: TriggerScope) -> Result<EvaluationResult, RuleError> {
        Ok(EvaluationResult { triggered_rules: Default::default(), applied_rule: None, discard: true })
    }

    fn rule(&self, name: &str) -> Option<&relay_rules::RuleConfig> {
        self.rules.get(name)
    }
}

fn evaluator_with(name: &str, rule: relay_rules::RuleConfig) -> FakeEvaluator {
    let mut rules = HashMap::new();
    rules.insert(name.to_string(), rule);
    FakeEvaluator { rules }
}

fn base_rule(trigger_scope: TriggerScope) -> relay_rules::RuleConfig {
    relay_rules::RuleConfig {
        action: Action::Route,
        trigger_scope,
        conditions: vec![],
        study_complete_trigger: Some(StudyCompleteTrigger::Timeout),
        study_complete_required_series: None,
        study_complete_trigger_seconds: None,
        study_forcecomplete_trigger_seconds: None,
        study_complete_force_action: Some(ForceCompleteAction::Ignore),
        patient_complete_trigger: None,
        patient_complete_required_studies: None,
        patient_complete_trigger_seconds: None,
        patient_forcecomplete_trigger_seconds: None,
        patient_complete_force_action: None,
        target_name: Some("pacs-a".to_string()),
        processing: vec![],
    }
}

fn write_series(study_dir: &std::path::Path, series_uid: &str, study_uid: &str) {
    let series_dir = study_dir.join(series_uid);
    fs::create_dir_all(&series_dir).unwrap();
    fs::write(
        series_dir.join("1.dcm.tags"),
        format!(r#"{{"SeriesInstanceUID":"{series_uid}","StudyInstanceUID":"{study_uid}","SeriesDescription":"ax t1"}}"#),
    )
    .unwrap();
}

#[tokio::test]
async fn first_series_arrival_creates_the_study_task() {
    let dir = tempfile::tempdir().unwrap();
    let spool = Spool::new(dir.path());
    spool.ensure_layout().unwrap();

    let study_uid = "1.2.study";
    let study_folder = format!("{study_uid}_r1");
    let study_dir = spool.stage_dir(Stage::Studies).join(&study_folder);
    write_series(&study_dir, "1.2.series.1", study_uid);

    let evaluator = evaluator_with("r1", base_rule(TriggerScope::Study));
    let aggregator = StudyAggregator::new(evaluator, FakeBookkeeperClient::default(), 300, 86_400);

    let unit = UnitRef::new(Stage::Studies, dir.path(), study_folder.clone());
    let outcome = aggregator.process_unit(&spool, unit).await.unwrap();
    assert!(matches!(outcome, StageOutcome::Skipped));

    let task = Task::load(&study_dir).unwrap();
    let study = task.study.unwrap();
    assert_eq!(study.received_series_uid, vec!["1.2.series.1".to_string()]);
}

#[tokio::test]
async fn second_series_merges_into_existing_study_task() {
    let dir = tempfile::tempdir().unwrap();
    let spool = Spool::new(dir.path());
    spool.ensure_layout().unwrap();

    let study_uid = "1.2.study";
    let study_folder = format!("{study_uid}_r1");
    let study_dir = spool.stage_dir(Stage::Studies).join(&study_folder);
    write_series(&study_dir, "1.2.series.1", study_uid);

    let evaluator = evaluator_with("r1", base_rule(TriggerScope::Study));
    let aggregator = StudyAggregator::new(evaluator, FakeBookkeeperClient::default(), 300, 86_400);
    let unit = UnitRef::new(Stage::Studies, dir.path(), study_folder.clone());
    aggregator.process_unit(&spool, unit).await.unwrap();

    write_series(&study_dir, "1.2.series.2", study_uid);
    let unit = UnitRef::new(Stage::Studies, dir.path(), study_folder.clone());
    let outcome = aggregator.process_unit(&spool, unit).await.unwrap();
    assert!(matches!(outcome, StageOutcome::Skipped));

    let task = Task::load(&study_dir).unwrap();
    let study = task.study.unwrap();
    assert_eq!(study.received_series_uid.len(), 2);
}

#[tokio::test]
async fn timeout_trigger_completes_once_no_incoming_series_are_pending() {
    let dir = tempfile::tempdir().unwrap();
    let spool = Spool::new(dir.path());
    spool.ensure_layout().unwrap();

    let study_uid = "1.2.study";
    let study_folder = format!("{study_uid}_r1");
    let study_dir = spool.stage_dir(Stage::Studies).join(&study_folder);
    write_series(&study_dir, "1.2.series.1", study_uid);

    let mut rule = base_rule(TriggerScope::Study);
    rule.study_complete_trigger_seconds = Some(0);
    let evaluator = evaluator_with("r1", rule);
    let aggregator = StudyAggregator::new(evaluator, FakeBookkeeperClient::default(), 300, 86_400);
    let unit = UnitRef::new(Stage::Studies, dir.path(), study_folder.clone());
    let outcome = aggregator.process_unit(&spool, unit).await.unwrap();

    assert!(matches!(outcome, StageOutcome::Handled));
    assert!(spool.stage_dir(Stage::Outgoing).read_dir().unwrap().next().is_some());
}

#[tokio::test]
async fn received_series_trigger_completes_on_matching_expression() {
    let dir = tempfile::tempdir().unwrap();
    let spool = Spool::new(dir.path());
    spool.ensure_layout().unwrap();

    let study_uid = "1.2.study";
    let study_folder = format!("{study_uid}_r1");
    let study_dir = spool.stage_dir(Stage::Studies).join(&study_folder);
    write_series(&study_dir, "1.2.series.1", study_uid);

    let mut rule = base_rule(TriggerScope::Study);
    rule.study_complete_trigger = Some(StudyCompleteTrigger::ReceivedSeries);
    rule.study_complete_required_series = Some("ax t1".to_string());
    let evaluator = evaluator_with("r1", rule);
    let aggregator = StudyAggregator::new(evaluator, FakeBookkeeperClient::default(), 300, 86_400);
    let unit = UnitRef::new(Stage::Studies, dir.path(), study_folder.clone());
    let outcome = aggregator.process_unit(&spool, unit).await.unwrap();
    assert!(matches!(outcome, StageOutcome::Handled));
}

#[tokio::test]
async fn force_proceed_action_marks_complete_force_instead_of_acting_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let spool = Spool::new(dir.path());
    spool.ensure_layout().unwrap();

    let study_uid = "1.2.study";
    let study_folder = format!("{study_uid}_r1");
    let study_dir = spool.stage_dir(Stage::Studies).join(&study_folder);
    write_series(&study_dir, "1.2.series.1", study_uid);

    let mut rule = base_rule(TriggerScope::Study);
    rule.study_complete_trigger_seconds = Some(u64::MAX);
    rule.study_forcecomplete_trigger_seconds = Some(0);
    rule.study_complete_force_action = Some(ForceCompleteAction::Proceed);
    let evaluator = evaluator_with("r1", rule);
    let aggregator = StudyAggregator::new(evaluator, FakeBookkeeperClient::default(), u64::MAX, 0);
    let unit = UnitRef::new(Stage::Studies, dir.path(), study_folder.clone());
    let outcome = aggregator.process_unit(&spool, unit).await.unwrap();
    assert!(matches!(outcome, StageOutcome::Handled));
    assert!(spool.has_complete_force_marker(&study_dir));
}

#[tokio::test]
async fn corrupted_task_record_moves_to_error_without_leaving_a_lock() {
    let dir = tempfile::tempdir().unwrap();
    let spool = Spool::new(dir.path());
    spool.ensure_layout().unwrap();

    let study_uid = "1.2.study";
    let study_folder = format!("{study_uid}_r1");
    let study_dir = spool.stage_dir(Stage::Studies).join(&study_folder);
    write_series(&study_dir, "1.2.series.1", study_uid);
    fs::write(study_dir.join("task.json"), b"not json").unwrap();

    let evaluator = evaluator_with("r1", base_rule(TriggerScope::Study));
    let aggregator = StudyAggregator::new(evaluator, FakeBookkeeperClient::default(), 300, 86_400);
    let unit = UnitRef::new(Stage::Studies, dir.path(), study_folder.clone());
    let outcome = aggregator.process_unit(&spool, unit).await.unwrap();
    assert!(matches!(outcome, StageOutcome::Handled));

    assert!(!study_dir.exists());
    let error_entries = spool.folder_names(Stage::Error).unwrap();
    assert_eq!(error_entries.len(), 1);
    let task = Task::load(&spool.stage_dir(Stage::Error).join(&error_entries[0])).unwrap();
    assert_eq!(task.info.fail_stage, Some(relay_core::FailStage::Routing));
    assert!(!spool.stage_dir(Stage::Error).join(&error_entries[0]).join(".lock").exists());
}

#[tokio::test]
async fn patient_scope_rule_moves_into_nested_patient_folder() {
    let dir = tempfile::tempdir().unwrap();
    let spool = Spool::new(dir.path());
    spool.ensure_layout().unwrap();

    let study_uid = "1.2.study";
    let study_folder = format!("{study_uid}_r1");
    let study_dir = spool.stage_dir(Stage::Studies).join(&study_folder);
    write_series(&study_dir, "1.2.series.1", study_uid);

    let mut rule = base_rule(TriggerScope::Patient);
    rule.study_complete_trigger_seconds = Some(0);
    let evaluator = evaluator_with("r1", rule);
    let aggregator = StudyAggregator::new(evaluator, FakeBookkeeperClient::default(), 0, 86_400);
    let unit = UnitRef::new(Stage::Studies, dir.path(), study_folder.clone());
    let outcome = aggregator.process_unit(&spool, unit).await.unwrap();
    assert!(matches!(outcome, StageOutcome::Handled));

    let patients_dir = spool.stage_dir(Stage::Patients);
    let has_nested_study = fs::read_dir(&patients_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .any(|e| e.path().join(study_uid).exists());
    assert!(has_nested_study);
}

#[tokio::test]
async fn refresh_lowers_the_trigger_window_for_the_next_iteration() {
    let dir = tempfile::tempdir().unwrap();
    let spool = Spool::new(dir.path());
    spool.ensure_layout().unwrap();

    let study_uid = "1.2.study";
    let study_folder = format!("{study_uid}_r1");
    let study_dir = spool.stage_dir(Stage::Studies).join(&study_folder);
    write_series(&study_dir, "1.2.series.1", study_uid);

    let rule = base_rule(TriggerScope::Study);
    let evaluator = evaluator_with("r1", rule);
    let aggregator = StudyAggregator::new(evaluator, FakeBookkeeperClient::default(), u64::MAX, 86_400);

    let config = crate::Config::from_toml(
        r#"
        spool_root = "/spool"
        bookkeeper_url = "http://localhost:8080"
        study_complete_trigger_seconds = 0
        [rules]
    "#,
    )
    .unwrap();
    aggregator.refresh(&crate::config::ConfigSnapshot::new(config));

    let unit = UnitRef::new(Stage::Studies, dir.path(), study_folder.clone());
    let outcome = aggregator.process_unit(&spool, unit).await.unwrap();
    assert!(matches!(outcome, StageOutcome::Handled));
    assert!(spool.stage_dir(Stage::Outgoing).read_dir().unwrap().next().is_some());
}
