// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TOML-configured rule set.

use indexmap::IndexMap;
use relay_core::{Action, ForceCompleteAction, PatientCompleteTrigger, StudyCompleteTrigger, TriggerScope};
use serde::{Deserialize, Serialize};

/// A single tag predicate. All predicates on a rule are ANDed together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TagCondition {
    /// Tag is present with exactly this value.
    Equals { tag: String, value: String },
    /// Tag is present with any value.
    Present { tag: String },
    /// Tag `Modality` is one of the listed values.
    ModalityIn { modalities: Vec<String> },
}

impl TagCondition {
    fn matches(&self, tags: &std::collections::HashMap<String, String>) -> bool {
        match self {
            TagCondition::Equals { tag, value } => tags.get(tag).is_some_and(|v| v == value),
            TagCondition::Present { tag } => tags.contains_key(tag),
            TagCondition::ModalityIn { modalities } => {
                tags.get("Modality").is_some_and(|m| modalities.iter().any(|candidate| candidate == m))
            }
        }
    }
}

/// One configured rule: action, trigger_scope, completion criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub action: Action,
    pub trigger_scope: TriggerScope,
    #[serde(default)]
    pub conditions: Vec<TagCondition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study_complete_trigger: Option<StudyCompleteTrigger>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study_complete_required_series: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study_complete_trigger_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study_forcecomplete_trigger_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study_complete_force_action: Option<ForceCompleteAction>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_complete_trigger: Option<PatientCompleteTrigger>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_complete_required_studies: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_complete_trigger_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_forcecomplete_trigger_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_complete_force_action: Option<ForceCompleteAction>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,
    #[serde(default)]
    pub processing: Vec<relay_core::TaskProcessing>,
}

impl RuleConfig {
    pub fn matches(&self, tags: &std::collections::HashMap<String, String>) -> bool {
        self.conditions.iter().all(|condition| condition.matches(tags))
    }
}

/// The full configured rule set, in priority order (first match in
/// declaration order wins as `applied_rule`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub rules: IndexMap<String, RuleConfig>,
}

impl RuleSet {
    pub fn from_toml(source: &str) -> Result<RuleSet, toml::de::Error> {
        toml::from_str(source)
    }

    pub fn get(&self, name: &str) -> Option<&RuleConfig> {
        self.rules.get(name)
    }
}

#[cfg(test)]
#[path = "rule_set_tests.rs"]
mod tests;
