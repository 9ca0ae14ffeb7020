//! Parsed rule statements.
//!
//! A ruleblock's text parses into an ordered list of rules. Three shapes
//! exist: **fetch** derives a per-subject value from the event table,
//! **compute** derives one from previously assigned variables, and **bind**
//! pulls a variable materialised by another ruleblock's output table.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Property sentinel: `_` in rule text stands for the `val` column.
pub const PROPERTY_SENTINEL: &str = "_";

/// A single parsed rule, in order of appearance within its ruleblock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Rule {
    Fetch(FetchRule),
    Compute(ComputeRule),
    Bind(BindRule),
}

impl Rule {
    /// The variable this rule assigns.
    pub fn variable(&self) -> &str {
        match self {
            Self::Fetch(r) => &r.variable,
            Self::Compute(r) => &r.variable,
            Self::Bind(r) => &r.variable,
        }
    }

    /// Free variable names used by this rule, populated during linking.
    pub fn references(&self) -> &BTreeSet<String> {
        match self {
            Self::Fetch(r) => &r.references,
            Self::Compute(r) => &r.references,
            Self::Bind(r) => &r.references,
        }
    }

    /// Mutable access to the reference set, used by the linker.
    pub fn references_mut(&mut self) -> &mut BTreeSet<String> {
        match self {
            Self::Fetch(r) => &mut r.references,
            Self::Compute(r) => &mut r.references,
            Self::Bind(r) => &mut r.references,
        }
    }
}

/// Derive a per-subject value from the long-format event table.
///
/// Surface shape: `name => table.attrSpec.property.function(params)[.where(pred)]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRule {
    /// The variable assigned by this rule.
    pub variable: String,

    /// Source event table, conventionally `eadv`.
    pub table: String,

    /// Attribute patterns; a bare name, or a SQL-LIKE pattern containing `%`.
    /// Never empty.
    pub attributes: Vec<String>,

    /// Column to project: `val`, `dt`, or the sentinel `_` meaning `val`.
    pub property: String,

    /// Operator name, one of the fetch operator catalogue.
    pub function: String,

    /// Operator parameter tokens. Arguments may contain balanced parentheses
    /// and unquoted commas inside nested calls.
    #[serde(default)]
    pub params: Vec<String>,

    /// Optional textual WHERE-clause fragment from `.where(...)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,

    /// Free variable names used by the predicate.
    #[serde(default)]
    pub references: BTreeSet<String>,
}

impl FetchRule {
    /// The projected event-table column with the `_` sentinel resolved.
    pub fn resolved_property(&self) -> &str {
        if self.property == PROPERTY_SENTINEL {
            "val"
        } else {
            &self.property
        }
    }
}

/// One arm of a compute rule: `{predicate => value}`.
///
/// An arm without a predicate (`{ => value }`) is the ELSE arm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeBranch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
    pub value: String,
}

impl ComputeBranch {
    pub fn new(predicate: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            predicate: Some(predicate.into()),
            value: value.into(),
        }
    }

    /// Create an ELSE arm.
    pub fn otherwise(value: impl Into<String>) -> Self {
        Self {
            predicate: None,
            value: value.into(),
        }
    }

    /// Whether this is the ELSE arm.
    pub fn is_else(&self) -> bool {
        self.predicate.is_none()
    }
}

/// Derive a per-subject value with first-match-wins CASE logic over
/// previously assigned variables.
///
/// Surface shape: `name : {pred => value}, {pred => value}, { => else };`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeRule {
    /// The variable assigned by this rule.
    pub variable: String,

    /// Conditions in textual order; the first matching arm wins.
    pub branches: Vec<ComputeBranch>,

    /// Free variable names used across all predicates and return values.
    #[serde(default)]
    pub references: BTreeSet<String>,
}

/// Pull a variable from another ruleblock's materialised output table.
///
/// Surface shape: `local => rout_<block>.<var>.<prop>.bind();`. The
/// `rout_` prefix is obligatory in the surface syntax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindRule {
    /// The local variable assigned by this rule.
    pub variable: String,

    /// The ruleblock whose output table is read (without the `rout_` prefix).
    pub source_ruleblock: String,

    /// The variable (output column) read from the source table.
    pub source_variable: String,

    /// Property token carried from the surface syntax. Does not change the
    /// projected column: a bind always selects the source variable's column.
    pub property: String,

    /// The sole reference is the source variable.
    #[serde(default)]
    pub references: BTreeSet<String>,
}
