use super::*;

fn sample_step(name: &str) -> TaskProcessing {
    TaskProcessing {
        module_name: name.to_string(),
        docker_tag: "registry.example/algo:1.0".to_string(),
        additional_volumes: vec![],
        environment: HashMap::new(),
        docker_arguments: vec![],
        constraints: HashMap::new(),
        resources: Resources::default(),
        requires_root: false,
        requires_persistence: false,
        persistence_folder_name: None,
        network_mode: NetworkMode::Bridge,
        settings: serde_json::Map::new(),
        retain_input_images: false,
    }
}

#[test]
fn none_has_no_steps() {
    assert!(Process::None.is_empty());
    assert_eq!(Process::None.steps().len(), 0);
}

#[test]
fn single_has_one_step() {
    let process = Process::Single(Box::new(sample_step("segment")));
    assert_eq!(process.len(), 1);
    assert_eq!(process.steps()[0].module_name, "segment");
}

#[test]
fn pipeline_iterates_in_order() {
    let process = Process::Pipeline(vec![sample_step("segment"), sample_step("report")]);
    let names: Vec<&str> = process.steps().iter().map(|step| step.module_name.as_str()).collect();
    assert_eq!(names, vec!["segment", "report"]);
}

#[test]
fn narrowed_to_produces_single_step_view() {
    let process = Process::Pipeline(vec![sample_step("segment"), sample_step("report")]);
    let narrowed = process.narrowed_to(1);
    match narrowed {
        Process::Single(step) => assert_eq!(step.module_name, "report"),
        other => panic!("expected Single, got {other:?}"),
    }
}

#[test]
fn narrowed_to_out_of_range_is_none() {
    let process = Process::Single(Box::new(sample_step("segment")));
    assert_eq!(process.narrowed_to(5), Process::None);
}

#[test]
fn requires_signature_reads_settings() {
    let mut step = sample_step("verify");
    step.settings.insert("require_signature".to_string(), serde_json::Value::Bool(true));
    step.settings.insert(
        "certificate_identity".to_string(),
        serde_json::Value::String("deploy@example.com".to_string()),
    );
    assert!(step.requires_signature());
    assert_eq!(step.certificate_identity(), Some("deploy@example.com"));
}

#[test]
fn untagged_process_roundtrips_through_json() {
    let process = Process::Pipeline(vec![sample_step("segment")]);
    let json = serde_json::to_string(&process).unwrap();
    let parsed: Process = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, process);
}
