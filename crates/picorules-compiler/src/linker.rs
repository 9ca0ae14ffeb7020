//! Linker: reference extraction, dependency graph, execution order.
//!
//! Operates on the parsed batch. Each rule's free variable references are
//! collected; bind rules additionally contribute inter-ruleblock edges.
//! The graph is held in insertion-ordered adjacency maps so the
//! topological order is deterministic across runs: nodes are visited in
//! input order, dependencies first, and reverse postorder is emitted.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use indexmap::{IndexMap, IndexSet};
use picorules_core::{ParsedRuleblock, Rule};

use crate::error::{CompileError, Result};

/// Identifiers never treated as variable references: logical connectives,
/// word-spelled comparison operators, CASE keywords, literals, `sysdate`,
/// and the built-in aggregate/operator names. Dialect-specific functions
/// outside this list (`power`, `sqrt`, ...) leak into reference sets;
/// downstream only keys on known variable and ruleblock names, which
/// tolerates the leak.
const STOPLIST: &[&str] = &[
    // logical connectives and word operators
    "and", "or", "not", "in", "like", "between", "is",
    // case expression keywords
    "case", "when", "then", "else", "end",
    // literals and system values
    "null", "true", "false", "sysdate",
    "lower__bound__dt", "upper__bound__dt",
    // built-in aggregates and fetch operators
    "max", "min", "sum", "avg", "count", "median", "last", "first", "exists",
    "distinct_count", "nth", "lastdv", "firstdv", "maxldv", "minldv", "minfdv",
    "max_neg_delta_dv", "serialize", "serialize2", "serializedv", "serializedv2",
    "regr_slope", "regr_intercept", "regr_r2", "stats_mode", "temporal_regularity",
    // common scalar functions of the expression sub-language
    "nvl", "coalesce", "nullif", "abs", "round", "trunc", "floor", "ceil",
    "greatest", "least", "greatest_date", "least_date", "to_char", "to_number",
    "substr", "upper", "lower", "length",
];

/// Event-table column names, never variable references in fetch predicates.
const EVENT_COLUMNS: &[&str] = &["eid", "att", "dt", "val", "loc"];

static IDENTIFIER_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\b[a-z_][a-z0-9_]*\b").expect("Invalid identifier regex")
});

static BACKTICK_LITERAL_REGEX: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"`[^`]*`").expect("Invalid backtick literal regex"));

/// The linked batch: ruleblocks in execution order with populated
/// reference sets, plus the dependency graph over present nodes.
#[derive(Debug)]
pub(crate) struct LinkedBatch {
    /// Topologically ordered: dependencies precede dependents; otherwise
    /// input order.
    pub ruleblocks: Vec<ParsedRuleblock>,

    /// Adjacency over present ruleblocks: name -> ruleblocks it binds.
    /// Binds to absent ruleblocks contribute no edge.
    pub graph: IndexMap<String, IndexSet<String>>,
}

/// Link a parsed batch: populate references, build the dependency graph,
/// reject cycles, and order the ruleblocks for execution.
pub(crate) fn link(mut ruleblocks: Vec<ParsedRuleblock>) -> Result<LinkedBatch> {
    for block in &mut ruleblocks {
        for rule in &mut block.rules {
            let refs = extract_references(rule);
            *rule.references_mut() = refs;
        }
    }

    let graph = build_graph(&ruleblocks);
    detect_cycles(&graph)?;
    let order = topological_order(&graph);

    tracing::debug!(
        ruleblocks = ruleblocks.len(),
        edges = graph.values().map(IndexSet::len).sum::<usize>(),
        "Linked ruleblock batch"
    );

    // Reorder the parsed blocks to match the execution order.
    let mut by_name: IndexMap<String, ParsedRuleblock> = ruleblocks
        .into_iter()
        .map(|rb| (rb.name.clone(), rb))
        .collect();
    let ordered = order
        .into_iter()
        .filter_map(|name| by_name.shift_remove(&name))
        .collect();

    Ok(LinkedBatch {
        ruleblocks: ordered,
        graph,
    })
}

/// Free variable names used by a rule.
///
/// Compute rules scan every predicate and return value; fetch rules scan
/// the predicate only, excluding event-table columns; a bind's sole
/// reference is its source variable.
fn extract_references(rule: &Rule) -> BTreeSet<String> {
    match rule {
        Rule::Fetch(f) => {
            let mut refs = BTreeSet::new();
            if let Some(pred) = &f.predicate {
                for ident in free_identifiers(pred) {
                    if !EVENT_COLUMNS.contains(&ident.as_str()) {
                        refs.insert(ident);
                    }
                }
            }
            refs
        }
        Rule::Compute(c) => {
            let mut refs = BTreeSet::new();
            for branch in &c.branches {
                if let Some(pred) = &branch.predicate {
                    refs.extend(free_identifiers(pred));
                }
                refs.extend(free_identifiers(&branch.value));
            }
            refs
        }
        Rule::Bind(b) => BTreeSet::from([b.source_variable.clone()]),
    }
}

/// Scan an expression for identifiers outside string literals and the
/// stoplist.
fn free_identifiers(expr: &str) -> BTreeSet<String> {
    let without_literals = BACKTICK_LITERAL_REGEX.replace_all(expr, " ");
    IDENTIFIER_REGEX
        .find_iter(&without_literals)
        .map(|m| m.as_str().to_string())
        .filter(|ident| !STOPLIST.contains(&ident.as_str()))
        .collect()
}

/// One node per present ruleblock; edge `A -> B` when A binds a variable
/// from B and B is present in the batch.
fn build_graph(ruleblocks: &[ParsedRuleblock]) -> IndexMap<String, IndexSet<String>> {
    let present: IndexSet<&str> = ruleblocks.iter().map(|rb| rb.name.as_str()).collect();

    let mut graph: IndexMap<String, IndexSet<String>> = ruleblocks
        .iter()
        .map(|rb| (rb.name.clone(), IndexSet::new()))
        .collect();

    for block in ruleblocks {
        for rule in &block.rules {
            if let Rule::Bind(bind) = rule {
                if present.contains(bind.source_ruleblock.as_str())
                    && bind.source_ruleblock != block.name
                {
                    graph
                        .get_mut(&block.name)
                        .expect("graph has a node per ruleblock")
                        .insert(bind.source_ruleblock.clone());
                }
            }
        }
    }

    graph
}

#[derive(Clone, Copy, PartialEq)]
enum Colour {
    White,
    Grey,
    Black,
}

/// Depth-first colouring. On meeting a grey successor the path is
/// reconstructed into an arrow-joined cycle description.
fn detect_cycles(graph: &IndexMap<String, IndexSet<String>>) -> Result<()> {
    let mut colours: IndexMap<&str, Colour> =
        graph.keys().map(|n| (n.as_str(), Colour::White)).collect();
    let mut path: Vec<&str> = Vec::new();

    fn visit<'a>(
        node: &'a str,
        graph: &'a IndexMap<String, IndexSet<String>>,
        colours: &mut IndexMap<&'a str, Colour>,
        path: &mut Vec<&'a str>,
    ) -> Result<()> {
        colours[node] = Colour::Grey;
        path.push(node);
        for dep in &graph[node] {
            match colours[dep.as_str()] {
                Colour::White => visit(dep, graph, colours, path)?,
                Colour::Grey => {
                    let start = path
                        .iter()
                        .position(|n| *n == dep.as_str())
                        .unwrap_or_default();
                    let mut cycle: Vec<&str> = path[start..].to_vec();
                    cycle.push(dep.as_str());
                    return Err(CompileError::CircularDependency {
                        path: cycle.join(" -> "),
                    });
                }
                Colour::Black => {}
            }
        }
        path.pop();
        colours[node] = Colour::Black;
        Ok(())
    }

    for node in graph.keys() {
        if colours[node.as_str()] == Colour::White {
            visit(node, graph, &mut colours, &mut path)?;
        }
    }
    Ok(())
}

/// Reverse postorder of a DFS that recurses into dependencies first.
/// Roots are visited in input order and already-placed nodes skipped, so
/// unrelated ruleblocks keep their original relative order.
fn topological_order(graph: &IndexMap<String, IndexSet<String>>) -> Vec<String> {
    let mut placed: IndexSet<&str> = IndexSet::new();
    let mut order: Vec<String> = Vec::new();

    fn visit<'a>(
        node: &'a str,
        graph: &'a IndexMap<String, IndexSet<String>>,
        placed: &mut IndexSet<&'a str>,
        order: &mut Vec<String>,
    ) {
        if placed.contains(node) {
            return;
        }
        placed.insert(node);
        for dep in &graph[node] {
            visit(dep, graph, placed, order);
        }
        order.push(node.to_string());
    }

    for node in graph.keys() {
        visit(node, graph, &mut placed, &mut order);
    }
    order
}
