//! Picorules compiler.
//!
//! Picorules is a small domain-specific rule language for clinical
//! decision support: rule texts (*ruleblocks*) derive per-subject values
//! from a long-format event table and reference each other through bind
//! statements, forming a computation DAG. This crate compiles a batch of
//! ruleblocks into a topologically ordered sequence of SQL programs, one
//! per ruleblock, targeting Oracle PL/SQL, SQL Server T-SQL or
//! PostgreSQL.
//!
//! # Pipeline
//!
//! - validation: name grammar and size ceilings
//! - parser: rule text to typed statements (fetch / compute / bind)
//! - linker: references, dependency graph, cycle detection, order
//! - transformer: subset filtering and ancestor/descendant pruning
//! - generator: dialect-parameterised SQL emission
//! - [`manifest`]: structural description of the compiled set
//!
//! Compilation is a single pure function call: no I/O, no SQL execution,
//! no shared state. Failures are returned by value; the compiler never
//! panics across its public boundary.
//!
//! # Example
//!
//! ```
//! use picorules_compiler::{compile, CompileOptions};
//! use picorules_core::{Dialect, RuleblockInput};
//!
//! let ruleblocks = vec![RuleblockInput::new(
//!     "ckd",
//!     "egfr_last => eadv.lab_bld_egfr.val.last();\n\
//!      has_ckd : {egfr_last < 60 => 1}, {=> 0};",
//! )];
//! let result = compile(&ruleblocks, &CompileOptions::new(Dialect::Oracle));
//! assert!(result.success);
//! assert_eq!(result.sql.len(), 1);
//! assert!(result.sql[0].contains("CREATE TABLE ROUT_CKD AS"));
//! ```

pub mod error;
mod generator;
mod linker;
pub mod manifest;
pub mod options;
mod parser;
mod scan;
mod transform;

use indexmap::IndexSet;
use picorules_core::{CoreError, ParsedRuleblock, Rule};
use serde::{Deserialize, Serialize};

pub use error::CompileError;
pub use manifest::{Manifest, ManifestEntry, MANIFEST_VERSION};
pub use options::CompileOptions;

// The model types callers need alongside the compiler.
pub use picorules_core::{Diagnostic, Dialect, RuleblockInput};

/// Structural counts for one compile call. Timing is out of scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileMetrics {
    /// Ruleblocks supplied.
    pub input_ruleblocks: usize,
    /// Ruleblocks emitted after filtering and pruning.
    pub compiled_ruleblocks: usize,
    pub fetch_rules: usize,
    pub compute_rules: usize,
    pub bind_rules: usize,
    /// Dependency edges between present ruleblocks.
    pub dependency_edges: usize,
}

/// Everything a compile call returns. `errors` and `warnings` are carried
/// by value; a fatal error yields `success=false` and an empty `sql` list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResult {
    pub success: bool,
    /// One SQL program per emitted ruleblock, in execution order.
    pub sql: Vec<String>,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<CompileMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<Manifest>,
}

impl CompileResult {
    fn failure(error: CompileError, warnings: Vec<Diagnostic>) -> Self {
        Self {
            success: false,
            sql: Vec::new(),
            errors: vec![error.into_diagnostic()],
            warnings,
            metrics: None,
            manifest: None,
        }
    }
}

/// Compile a batch of ruleblocks into dependency-ordered SQL.
///
/// The emitted list is topologically ordered: for any bind of ruleblock
/// `B` by ruleblock `A`, the SQL for `B` precedes the SQL for `A`;
/// ruleblocks without an ordering relation keep their input order.
pub fn compile(ruleblocks: &[RuleblockInput], options: &CompileOptions) -> CompileResult {
    tracing::info!(
        ruleblocks = ruleblocks.len(),
        dialect = options.dialect.as_str(),
        "Compiling ruleblock batch"
    );

    let mut warnings = Vec::new();

    if let Err(err) = validate_batch(ruleblocks) {
        return CompileResult::failure(err.into(), warnings);
    }

    // Parse everything, inactive ruleblocks included.
    let mut parsed = Vec::with_capacity(ruleblocks.len());
    for input in ruleblocks {
        match parser::parse_ruleblock(input) {
            Ok(outcome) => {
                warnings.extend(outcome.warnings);
                parsed.push(outcome.ruleblock);
            }
            Err(err) => return CompileResult::failure(err, warnings),
        }
    }

    if !options.include_inactive {
        parsed.retain(|rb| rb.is_active);
    }

    let linked = match linker::link(parsed) {
        Ok(linked) => linked,
        Err(err) => return CompileResult::failure(err, warnings),
    };

    let dependency_edges = linked.graph.values().map(IndexSet::len).sum();
    let transformed = transform::transform(linked.ruleblocks.clone(), &linked.graph, options);

    let generated = match generator::generate(&transformed, options) {
        Ok(generated) => generated,
        Err(err) => return CompileResult::failure(err, warnings),
    };

    let manifest = manifest::build_manifest(options.dialect, &generated, &linked);
    let metrics = build_metrics(ruleblocks.len(), &transformed, dependency_edges);

    tracing::info!(
        compiled = generated.len(),
        "Compilation finished"
    );

    CompileResult {
        success: true,
        sql: generated.into_iter().map(|g| g.sql).collect(),
        errors: Vec::new(),
        warnings,
        metrics: Some(metrics),
        manifest: Some(manifest),
    }
}

/// Name grammar, size ceilings and batch-level uniqueness.
fn validate_batch(ruleblocks: &[RuleblockInput]) -> Result<(), CoreError> {
    let mut seen: IndexSet<&str> = IndexSet::new();
    for input in ruleblocks {
        input.validate()?;
        if !seen.insert(input.name.as_str()) {
            return Err(CoreError::duplicate_ruleblock(&input.name));
        }
    }
    Ok(())
}

fn build_metrics(
    input_ruleblocks: usize,
    compiled: &[ParsedRuleblock],
    dependency_edges: usize,
) -> CompileMetrics {
    let mut metrics = CompileMetrics {
        input_ruleblocks,
        compiled_ruleblocks: compiled.len(),
        dependency_edges,
        ..Default::default()
    };
    for block in compiled {
        for rule in &block.rules {
            match rule {
                Rule::Fetch(_) => metrics.fetch_rules += 1,
                Rule::Compute(_) => metrics.compute_rules += 1,
                Rule::Bind(_) => metrics.bind_rules += 1,
            }
        }
    }
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_batch_rejects_duplicates() {
        let batch = vec![
            RuleblockInput::new("rb1", ""),
            RuleblockInput::new("rb1", ""),
        ];
        assert!(matches!(
            validate_batch(&batch),
            Err(CoreError::DuplicateRuleblock(_))
        ));
    }

    #[test]
    fn test_validate_batch_rejects_bad_name() {
        let batch = vec![RuleblockInput::new("Bad-Name", "")];
        assert!(validate_batch(&batch).is_err());
    }

    #[test]
    fn test_metrics_counts_rule_kinds() {
        let batch = vec![RuleblockInput::new(
            "rb1",
            "a => eadv.att1.val.last(); b : {a > 1 => 1}, {=> 0}; c => rout_other.x.val.bind();",
        )];
        let result = compile(&batch, &CompileOptions::new(Dialect::Oracle));
        assert!(result.success);
        let metrics = result.metrics.unwrap();
        assert_eq!(metrics.input_ruleblocks, 1);
        assert_eq!(metrics.compiled_ruleblocks, 1);
        assert_eq!(metrics.fetch_rules, 1);
        assert_eq!(metrics.compute_rules, 1);
        assert_eq!(metrics.bind_rules, 1);
        assert_eq!(metrics.dependency_edges, 0);
    }
}
