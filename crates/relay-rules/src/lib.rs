// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! relay-rules: the rule evaluator collaborator interface, its
//! TOML-configured reference implementation, and the completion-series
//! boolean expression language.

pub mod completion_expr;
pub mod error;
pub mod evaluator;
pub mod rule_set;

pub use completion_expr::{parse_completion_series, Expr, ExprError};
pub use error::RuleError;
pub use evaluator::{ConfigRuleEvaluator, EvaluationResult, RuleEvaluator};
pub use rule_set::{RuleConfig, RuleSet, TagCondition};
