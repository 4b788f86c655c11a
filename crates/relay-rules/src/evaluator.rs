// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The rule evaluator collaborator interface and its TOML-configured
//! reference implementation.

use crate::completion_expr;
use crate::error::RuleError;
use crate::rule_set::{RuleConfig, RuleSet};
use relay_core::TriggerScope;
use std::collections::{BTreeMap, HashMap};

/// Result of evaluating every rule against one unit's tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationResult {
    /// Every rule's match status, keyed by rule name; written through to
    /// `task.info.triggered_rules`.
    pub triggered_rules: BTreeMap<String, bool>,
    /// The first matching rule in declaration order, if any.
    pub applied_rule: Option<String>,
    /// True if no rule triggered.
    pub discard: bool,
}

/// Consumed by the series router and the study/patient aggregators. A
/// collaborator boundary: this crate ships one reference implementation
/// (tag equality/presence/modality-list matching), not a general
/// DICOM-tag expression language.
pub trait RuleEvaluator: Send + Sync {
    /// `evaluate(tags, rule_set) -> { triggered_rules, discard }`, scoped
    /// to rules whose `trigger_scope` matches `scope`.
    fn evaluate(&self, tags: &HashMap<String, String>, scope: TriggerScope) -> Result<EvaluationResult, RuleError>;

    /// Looks up a rule's static configuration by name.
    fn rule(&self, name: &str) -> Option<&RuleConfig>;

    /// `parse_completion_series(required_expr, received_list) -> bool`.
    fn parse_completion_series(&self, required_expr: &str, received: &[String]) -> Result<bool, RuleError> {
        Ok(completion_expr::parse_completion_series(required_expr, received)?)
    }
}

/// Reference [`RuleEvaluator`] backed by a TOML [`RuleSet`].
#[derive(Clone)]
pub struct ConfigRuleEvaluator {
    rule_set: RuleSet,
}

impl ConfigRuleEvaluator {
    pub fn new(rule_set: RuleSet) -> Self {
        ConfigRuleEvaluator { rule_set }
    }
}

impl RuleEvaluator for ConfigRuleEvaluator {
    fn evaluate(&self, tags: &HashMap<String, String>, scope: TriggerScope) -> Result<EvaluationResult, RuleError> {
        let mut triggered_rules = BTreeMap::new();
        let mut applied_rule = None;

        for (name, rule) in &self.rule_set.rules {
            if rule.trigger_scope != scope {
                continue;
            }
            let matched = rule.matches(tags);
            triggered_rules.insert(name.clone(), matched);
            if matched && applied_rule.is_none() {
                applied_rule = Some(name.clone());
            }
        }

        Ok(EvaluationResult { discard: applied_rule.is_none(), triggered_rules, applied_rule })
    }

    fn rule(&self, name: &str) -> Option<&RuleConfig> {
        self.rule_set.get(name)
    }
}

#[cfg(test)]
#[path = "evaluator_tests.rs"]
mod tests;
