use super::*;
use std::collections::HashMap;

const SAMPLE_TOML: &str = r#"
[rules.mri_brain]
action = "route"
trigger_scope = "study"
study_complete_trigger = "received_series"
study_complete_required_series = "T1 and T2"
study_complete_force_action = "proceed"

[[rules.mri_brain.conditions]]
kind = "modality_in"
modalities = ["MR"]

[rules.fallback]
action = "discard"
trigger_scope = "series"
"#;

#[test]
fn parses_rules_in_declaration_order() {
    let set = RuleSet::from_toml(SAMPLE_TOML).unwrap();
    let names: Vec<&str> = set.rules.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["mri_brain", "fallback"]);
}

#[test]
fn modality_condition_matches() {
    let set = RuleSet::from_toml(SAMPLE_TOML).unwrap();
    let rule = set.get("mri_brain").unwrap();
    let mut tags = HashMap::new();
    tags.insert("Modality".to_string(), "MR".to_string());
    assert!(rule.matches(&tags));

    tags.insert("Modality".to_string(), "CT".to_string());
    assert!(!rule.matches(&tags));
}

#[test]
fn rule_with_no_conditions_always_matches() {
    let set = RuleSet::from_toml(SAMPLE_TOML).unwrap();
    let rule = set.get("fallback").unwrap();
    assert!(rule.matches(&HashMap::new()));
}
