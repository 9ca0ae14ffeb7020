use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core error types for Picorules model validation
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid ruleblock name: {0}")]
    InvalidRuleblockName(String),

    #[error("Ruleblock name too long: {name} ({length} chars, maximum {max})")]
    RuleblockNameTooLong {
        name: String,
        length: usize,
        max: usize,
    },

    #[error("Ruleblock text too large: {name} ({size} bytes, maximum {max})")]
    RuleblockTextTooLarge {
        name: String,
        size: usize,
        max: usize,
    },

    #[error("Duplicate ruleblock name: {0}")]
    DuplicateRuleblock(String),

    #[error("Unknown dialect: {0}")]
    UnknownDialect(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a new InvalidRuleblockName error
    pub fn invalid_ruleblock_name(name: impl Into<String>) -> Self {
        Self::InvalidRuleblockName(name.into())
    }

    /// Create a new DuplicateRuleblock error
    pub fn duplicate_ruleblock(name: impl Into<String>) -> Self {
        Self::DuplicateRuleblock(name.into())
    }

    /// Create a new UnknownDialect error
    pub fn unknown_dialect(tag: impl Into<String>) -> Self {
        Self::UnknownDialect(tag.into())
    }

    /// Create a new InvalidTimestamp error
    pub fn invalid_timestamp(message: impl Into<String>) -> Self {
        Self::InvalidTimestamp(message.into())
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// A diagnostic carried on the compiler's result surface.
///
/// Both errors and warnings use this shape: a human-readable message plus
/// an optional ruleblock attribution and source line. The compiler returns
/// diagnostics by value and never raises across its public boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Human-readable description of the problem.
    pub message: String,

    /// Name of the ruleblock the diagnostic refers to, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ruleblock: Option<String>,

    /// One-based source line within the ruleblock text, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl Diagnostic {
    /// Create a diagnostic with a message only.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ruleblock: None,
            line: None,
        }
    }

    /// Create a diagnostic attributed to a ruleblock.
    pub fn for_ruleblock(message: impl Into<String>, ruleblock: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ruleblock: Some(ruleblock.into()),
            line: None,
        }
    }

    /// Attach a source line to this diagnostic.
    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.ruleblock {
            Some(rb) => write!(f, "[{rb}] {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}
