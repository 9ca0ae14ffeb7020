//! Core data model for the Picorules clinical rule compiler.
//!
//! Picorules is a small domain-specific rule language for clinical decision
//! support: a rule text derives per-subject values from a long-format event
//! table (`eid`, `att`, `dt`, `val`). This crate holds everything needed to
//! describe compiler inputs and read its outputs without pulling in the
//! compiler itself:
//!
//! - [`RuleblockInput`] - a named unit of rule source text
//! - [`Rule`] - the parsed statement union (fetch / compute / bind)
//! - [`Dialect`] - supported SQL targets and their naming rules
//! - [`Diagnostic`] - the error/warning record on the result surface
//! - [`CompiledAt`] - the RFC 3339 compilation timestamp
//!
//! The compiler pipeline lives in the `picorules-compiler` crate.

pub mod dialect;
pub mod error;
pub mod rule;
pub mod ruleblock;
pub mod time;

pub use dialect::Dialect;
pub use error::{CoreError, Diagnostic, Result};
pub use rule::{BindRule, ComputeBranch, ComputeRule, FetchRule, Rule, PROPERTY_SENTINEL};
pub use ruleblock::{ParsedRuleblock, RuleblockInput, MAX_NAME_LENGTH, MAX_TEXT_SIZE};
pub use time::CompiledAt;
