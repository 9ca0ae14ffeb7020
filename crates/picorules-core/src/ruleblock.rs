//! Ruleblock records and input validation.

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::rule::Rule;

/// Maximum length of a ruleblock name.
pub const MAX_NAME_LENGTH: usize = 100;

/// Maximum size of a ruleblock's rule source, in bytes (1 MiB).
pub const MAX_TEXT_SIZE: usize = 1024 * 1024;

/// Ruleblock name grammar: `[a-z_][a-z0-9_]*`
static NAME_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[a-z_][a-z0-9_]*$").expect("Invalid ruleblock name regex")
});

/// A ruleblock as supplied to the compiler: a named unit of rule source
/// text that compiles to one SQL program and one output table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleblockInput {
    /// Ruleblock name, `[a-z_][a-z0-9_]*`, 1..=100 chars, unique per batch.
    pub name: String,

    /// Rule source text, at most 1 MiB.
    pub text: String,

    /// Inactive ruleblocks still parse but may be filtered out.
    #[serde(default = "default_is_active")]
    pub is_active: bool,
}

fn default_is_active() -> bool {
    true
}

impl RuleblockInput {
    /// Create an active ruleblock.
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            is_active: true,
        }
    }

    /// Mark this ruleblock inactive.
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Check the name grammar, the name length bound and the text ceiling.
    pub fn validate(&self) -> Result<()> {
        if self.name.len() > MAX_NAME_LENGTH {
            return Err(CoreError::RuleblockNameTooLong {
                name: self.name.clone(),
                length: self.name.len(),
                max: MAX_NAME_LENGTH,
            });
        }
        if !NAME_REGEX.is_match(&self.name) {
            return Err(CoreError::invalid_ruleblock_name(&self.name));
        }
        if self.text.len() > MAX_TEXT_SIZE {
            return Err(CoreError::RuleblockTextTooLarge {
                name: self.name.clone(),
                size: self.text.len(),
                max: MAX_TEXT_SIZE,
            });
        }
        Ok(())
    }
}

/// A ruleblock after parsing: its rules in order of appearance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedRuleblock {
    pub name: String,
    pub is_active: bool,
    pub rules: Vec<Rule>,
}

impl ParsedRuleblock {
    /// Variables assigned by this ruleblock, in source-rule order.
    pub fn variables(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.variable()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        for name in ["ckd", "rb1", "_internal", "a", "lab_results_v2"] {
            let rb = RuleblockInput::new(name, "");
            assert!(rb.validate().is_ok(), "expected {name} to validate");
        }
    }

    #[test]
    fn test_invalid_names() {
        for name in ["", "Ckd", "1rb", "rb-1", "rb.1", "RB", "rb 1"] {
            let rb = RuleblockInput::new(name, "");
            assert!(
                matches!(rb.validate(), Err(CoreError::InvalidRuleblockName(_))),
                "expected {name:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_name_length_bounds() {
        let rb = RuleblockInput::new("a".repeat(100), "");
        assert!(rb.validate().is_ok());

        let rb = RuleblockInput::new("a".repeat(101), "");
        assert!(matches!(
            rb.validate(),
            Err(CoreError::RuleblockNameTooLong { length: 101, .. })
        ));
    }

    #[test]
    fn test_text_size_ceiling() {
        let rb = RuleblockInput::new("rb1", "x".repeat(MAX_TEXT_SIZE));
        assert!(rb.validate().is_ok());

        let rb = RuleblockInput::new("rb1", "x".repeat(MAX_TEXT_SIZE + 1));
        assert!(matches!(
            rb.validate(),
            Err(CoreError::RuleblockTextTooLarge { .. })
        ));
    }

    #[test]
    fn test_is_active_default() {
        let rb: RuleblockInput =
            serde_json::from_value(serde_json::json!({"name": "rb1", "text": ""})).unwrap();
        assert!(rb.is_active);

        let rb: RuleblockInput = serde_json::from_value(
            serde_json::json!({"name": "rb1", "text": "", "isActive": false}),
        )
        .unwrap();
        assert!(!rb.is_active);

        assert!(!RuleblockInput::new("rb1", "").inactive().is_active);
    }
}
