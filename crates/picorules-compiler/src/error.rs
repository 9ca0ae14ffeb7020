//! Compiler error types.
//!
//! Every failure is collected into the returned diagnostic list; the
//! compiler never raises across its public boundary. A single fatal error
//! short-circuits the pipeline (see `compile`).

use picorules_core::{CoreError, Diagnostic};
use thiserror::Error;

/// Errors that can occur while compiling a batch of ruleblocks
#[derive(Debug, Error)]
pub enum CompileError {
    /// Input validation failure (name grammar, size ceiling, dialect tag)
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A fetch statement did not match the expected shape
    #[error("Invalid fetch statement in ruleblock '{ruleblock}': {segment}")]
    InvalidFetch { ruleblock: String, segment: String },

    /// A compute statement had a malformed assignment prefix
    #[error("Invalid compute statement in ruleblock '{ruleblock}': {segment}")]
    InvalidCompute { ruleblock: String, segment: String },

    /// A compute statement carried no `{... => ...}` arms
    #[error("Compute statement has no arms in ruleblock '{ruleblock}': {segment}")]
    EmptyCompute { ruleblock: String, segment: String },

    /// A bind statement did not match the `rout_<block>.<var>.<prop>.bind()` shape
    #[error("Invalid bind statement in ruleblock '{ruleblock}': {segment}")]
    InvalidBind { ruleblock: String, segment: String },

    /// The cross-ruleblock dependency graph contains a cycle.
    /// The message prefix is load-bearing: callers match on it.
    #[error("Circular dependency: {path}")]
    CircularDependency { path: String },

    /// A fetch rule named an operator outside the catalogue
    #[error("Unsupported function '{function}' in ruleblock '{ruleblock}'")]
    UnsupportedFunction { ruleblock: String, function: String },
}

impl CompileError {
    /// The ruleblock this error is attributed to, when known.
    pub fn ruleblock(&self) -> Option<&str> {
        match self {
            Self::InvalidFetch { ruleblock, .. }
            | Self::InvalidCompute { ruleblock, .. }
            | Self::EmptyCompute { ruleblock, .. }
            | Self::InvalidBind { ruleblock, .. }
            | Self::UnsupportedFunction { ruleblock, .. } => Some(ruleblock),
            Self::Core(_) | Self::CircularDependency { .. } => None,
        }
    }

    /// Convert into the public diagnostic record.
    pub fn into_diagnostic(self) -> Diagnostic {
        let ruleblock = self.ruleblock().map(str::to_string);
        Diagnostic {
            message: self.to_string(),
            ruleblock,
            line: None,
        }
    }
}

/// Convenience result type for compiler stages
pub type Result<T> = std::result::Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_dependency_message_prefix() {
        let err = CompileError::CircularDependency {
            path: "rb1 -> rb2 -> rb1".to_string(),
        };
        assert!(err.to_string().starts_with("Circular dependency"));
        assert_eq!(err.to_string(), "Circular dependency: rb1 -> rb2 -> rb1");
    }

    #[test]
    fn test_ruleblock_attribution() {
        let err = CompileError::InvalidFetch {
            ruleblock: "ckd".to_string(),
            segment: "x => bad".to_string(),
        };
        assert_eq!(err.ruleblock(), Some("ckd"));

        let err = CompileError::CircularDependency {
            path: "a -> a".to_string(),
        };
        assert_eq!(err.ruleblock(), None);
    }

    #[test]
    fn test_into_diagnostic() {
        let err = CompileError::UnsupportedFunction {
            ruleblock: "g".to_string(),
            function: "frobnicate".to_string(),
        };
        let diag = err.into_diagnostic();
        assert_eq!(diag.ruleblock.as_deref(), Some("g"));
        assert!(diag.message.contains("frobnicate"));
        assert_eq!(diag.line, None);
    }

    #[test]
    fn test_core_error_passthrough() {
        let err: CompileError = CoreError::invalid_ruleblock_name("Bad").into();
        assert_eq!(err.to_string(), "Invalid ruleblock name: Bad");
    }
}
