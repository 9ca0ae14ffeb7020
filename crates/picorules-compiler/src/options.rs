//! Compilation options.

use picorules_core::Dialect;
use serde::{Deserialize, Serialize};

/// Options controlling a single compile call.
///
/// `dialect` is required; everything else defaults to "compile everything".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOptions {
    /// Target SQL dialect.
    pub dialect: Dialect,

    /// Keep ruleblocks with `isActive=false` in the compiled set. They are
    /// parsed either way.
    #[serde(default = "default_include_inactive")]
    pub include_inactive: bool,

    /// Case-insensitive ruleblock name filter; empty means "all".
    #[serde(default)]
    pub subset: Vec<String>,

    /// Keep only the transitive consumers (descendants) of these ruleblocks.
    #[serde(default)]
    pub prune_inputs: Vec<String>,

    /// Keep only the transitive sources (ancestors) of these ruleblocks.
    #[serde(default)]
    pub prune_outputs: Vec<String>,

    /// Overrides the textual rendering of `sysdate` in generated SQL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_sysdate: Option<String>,
}

fn default_include_inactive() -> bool {
    false
}

impl CompileOptions {
    /// Create options for a dialect with every other option at its default.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            include_inactive: default_include_inactive(),
            subset: Vec::new(),
            prune_inputs: Vec::new(),
            prune_outputs: Vec::new(),
            static_sysdate: None,
        }
    }

    /// Restrict compilation to the named ruleblocks.
    pub fn with_subset(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.subset = names.into_iter().map(Into::into).collect();
        self
    }

    /// Keep only the transitive consumers of the named ruleblocks.
    pub fn with_prune_inputs(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.prune_inputs = names.into_iter().map(Into::into).collect();
        self
    }

    /// Keep only the transitive sources of the named ruleblocks.
    pub fn with_prune_outputs(
        mut self,
        names: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.prune_outputs = names.into_iter().map(Into::into).collect();
        self
    }
}
