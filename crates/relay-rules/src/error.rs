// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Surfaced by the rule evaluator when a rule's configuration can't
/// support an evaluation it was matched into; the unit is routed to
/// `error/`.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("failed to parse rule set: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("rule '{rule}' is misconfigured: {reason}")]
    Misconfigured { rule: String, reason: String },

    #[error("completion expression error: {0}")]
    Expression(#[from] crate::completion_expr::ExprError),
}
