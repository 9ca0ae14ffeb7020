//! Compilation manifest.
//!
//! A structural description of the compiled set: one entry per emitted
//! ruleblock with its execution order, output table, dependencies and
//! output variables, plus the dependency graph as an adjacency mapping.
//! The manifest is plain data; writing it anywhere is the caller's affair.

use indexmap::IndexMap;
use picorules_core::{CompiledAt, Dialect};
use serde::{Deserialize, Serialize};

use crate::generator::GeneratedRuleblock;
use crate::linker::LinkedBatch;

/// Manifest format version.
pub const MANIFEST_VERSION: &str = "1.0.0";

/// One emitted ruleblock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    /// Ruleblock name as supplied.
    pub ruleblock_id: String,

    /// Position in the execution sequence; equals `sql_index`.
    pub execution_order: usize,

    /// The dialect's effective output table name.
    pub target_table: String,

    /// Ruleblocks this one binds, restricted to the emitted set.
    pub dependencies: Vec<String>,

    /// Logical output variables in source-rule order. Dv-family variables
    /// appear once, under the logical name.
    pub output_variables: Vec<String>,

    /// Index into the returned SQL list.
    pub sql_index: usize,
}

/// The manifest for one compile call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub version: String,
    pub dialect: Dialect,
    pub compiled_at: CompiledAt,
    pub total_ruleblocks: usize,
    pub entries: Vec<ManifestEntry>,

    /// Adjacency over the emitted ruleblocks.
    pub dependency_graph: IndexMap<String, Vec<String>>,
}

/// Walk the generated list and describe it.
pub(crate) fn build_manifest(
    dialect: Dialect,
    generated: &[GeneratedRuleblock],
    linked: &LinkedBatch,
) -> Manifest {
    let emitted: Vec<&str> = generated.iter().map(|g| g.name.as_str()).collect();

    let dependencies_of = |name: &str| -> Vec<String> {
        linked
            .graph
            .get(name)
            .map(|deps| {
                deps.iter()
                    .filter(|dep| emitted.contains(&dep.as_str()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    };

    let entries = generated
        .iter()
        .enumerate()
        .map(|(index, block)| ManifestEntry {
            ruleblock_id: block.name.clone(),
            execution_order: index,
            target_table: dialect.target_table(&block.name),
            dependencies: dependencies_of(&block.name),
            output_variables: block.output_variables.clone(),
            sql_index: index,
        })
        .collect();

    let dependency_graph = generated
        .iter()
        .map(|block| (block.name.clone(), dependencies_of(&block.name)))
        .collect();

    Manifest {
        version: MANIFEST_VERSION.to_string(),
        dialect,
        compiled_at: CompiledAt::now_utc(),
        total_ruleblocks: generated.len(),
        entries,
        dependency_graph,
    }
}
