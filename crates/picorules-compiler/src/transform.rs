//! Transformer: subset filtering and graph pruning.
//!
//! Applied to the topologically ordered list, in order: the case-insensitive
//! `subset` filter, then ancestor/descendant pruning driven by
//! `pruneOutputs` / `pruneInputs`. Both filter the ordered list in place,
//! so execution order is preserved.

use indexmap::{IndexMap, IndexSet};
use picorules_core::ParsedRuleblock;

use crate::options::CompileOptions;

/// Apply subset and prune options to the ordered ruleblock list.
pub(crate) fn transform(
    ordered: Vec<ParsedRuleblock>,
    graph: &IndexMap<String, IndexSet<String>>,
    options: &CompileOptions,
) -> Vec<ParsedRuleblock> {
    let mut kept = ordered;

    if !options.subset.is_empty() {
        let subset: IndexSet<String> = options
            .subset
            .iter()
            .map(|n| n.to_lowercase())
            .collect();
        kept.retain(|rb| subset.contains(&rb.name.to_lowercase()));
    }

    let keep = prune_set(graph, &options.prune_inputs, &options.prune_outputs);
    if let Some(keep) = keep {
        kept.retain(|rb| keep.contains(&rb.name.to_lowercase()));
    }

    tracing::debug!(kept = kept.len(), "Transformed ruleblock list");
    kept
}

/// The set of (lowercase) names to keep, or `None` when no pruning was
/// requested.
///
/// `Anc(O)` walks outgoing edges from the outputs (the sources they depend
/// on, outputs included); `Desc(I)` walks reverse edges from the inputs
/// (the consumers, inputs included). Given both, the kept set is the
/// intersection.
fn prune_set(
    graph: &IndexMap<String, IndexSet<String>>,
    prune_inputs: &[String],
    prune_outputs: &[String],
) -> Option<IndexSet<String>> {
    let ancestors = (!prune_outputs.is_empty()).then(|| closure(graph, prune_outputs, false));
    let descendants = (!prune_inputs.is_empty()).then(|| closure(graph, prune_inputs, true));

    match (ancestors, descendants) {
        (None, None) => None,
        (Some(a), None) => Some(a),
        (None, Some(d)) => Some(d),
        (Some(a), Some(d)) => Some(a.intersection(&d).cloned().collect()),
    }
}

/// Transitive closure from the seeds over the graph (or its reverse).
/// Seeds absent from the graph contribute nothing. All comparisons are on
/// lowercase names.
fn closure(
    graph: &IndexMap<String, IndexSet<String>>,
    seeds: &[String],
    reverse: bool,
) -> IndexSet<String> {
    let edges: IndexMap<String, IndexSet<String>> = if reverse {
        let mut reversed: IndexMap<String, IndexSet<String>> = graph
            .keys()
            .map(|n| (n.clone(), IndexSet::new()))
            .collect();
        for (from, deps) in graph {
            for to in deps {
                reversed
                    .get_mut(to)
                    .expect("graph edges stay within present nodes")
                    .insert(from.clone());
            }
        }
        reversed
    } else {
        graph.clone()
    };

    let mut reached: IndexSet<String> = IndexSet::new();
    let mut stack: Vec<String> = seeds
        .iter()
        .map(|s| s.to_lowercase())
        .filter(|s| edges.contains_key(s))
        .collect();

    while let Some(node) = stack.pop() {
        if !reached.insert(node.clone()) {
            continue;
        }
        for next in &edges[&node] {
            if !reached.contains(next) {
                stack.push(next.clone());
            }
        }
    }
    reached
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linker::link;
    use crate::parser::parse_ruleblock;
    use picorules_core::{Dialect, RuleblockInput};

    fn chain_batch() -> (Vec<ParsedRuleblock>, IndexMap<String, IndexSet<String>>) {
        // Data flows a -> b -> c -> d; `unrelated` stands alone.
        let texts = [
            ("a", "x => eadv.att1.val.last();".to_string()),
            ("b", "x => rout_a.x.val.bind();".to_string()),
            ("c", "x => rout_b.x.val.bind();".to_string()),
            ("d", "x => rout_c.x.val.bind();".to_string()),
            ("unrelated", "x => eadv.att2.val.last();".to_string()),
        ];
        let parsed = texts
            .iter()
            .map(|(name, text)| {
                parse_ruleblock(&RuleblockInput::new(*name, text.clone()))
                    .expect("parse failed")
                    .ruleblock
            })
            .collect();
        let linked = link(parsed).unwrap();
        (linked.ruleblocks, linked.graph)
    }

    fn names(blocks: &[ParsedRuleblock]) -> Vec<&str> {
        blocks.iter().map(|rb| rb.name.as_str()).collect()
    }

    fn options() -> CompileOptions {
        CompileOptions::new(Dialect::Oracle)
    }

    #[test]
    fn test_no_options_is_identity() {
        let (ordered, graph) = chain_batch();
        let kept = transform(ordered, &graph, &options());
        assert_eq!(names(&kept), vec!["a", "b", "c", "d", "unrelated"]);
    }

    #[test]
    fn test_subset_is_case_insensitive() {
        let (ordered, graph) = chain_batch();
        let kept = transform(ordered, &graph, &options().with_subset(["B", "D"]));
        assert_eq!(names(&kept), vec!["b", "d"]);
    }

    #[test]
    fn test_subset_with_absent_name_keeps_nothing() {
        let (ordered, graph) = chain_batch();
        let kept = transform(ordered, &graph, &options().with_subset(["nope"]));
        assert!(kept.is_empty());
    }

    #[test]
    fn test_empty_subset_means_all() {
        let (ordered, graph) = chain_batch();
        let kept = transform(ordered, &graph, &options().with_subset(Vec::<String>::new()));
        assert_eq!(kept.len(), 5);
    }

    #[test]
    fn test_prune_outputs_keeps_ancestors() {
        let (ordered, graph) = chain_batch();
        let kept = transform(ordered, &graph, &options().with_prune_outputs(["c"]));
        assert_eq!(names(&kept), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_prune_inputs_keeps_descendants() {
        let (ordered, graph) = chain_batch();
        let kept = transform(ordered, &graph, &options().with_prune_inputs(["c"]));
        assert_eq!(names(&kept), vec!["c", "d"]);
    }

    #[test]
    fn test_prune_both_is_path_intersection() {
        let (ordered, graph) = chain_batch();
        let kept = transform(
            ordered,
            &graph,
            &options().with_prune_inputs(["b"]).with_prune_outputs(["d"]),
        );
        assert_eq!(names(&kept), vec!["b", "c", "d"]);
    }

    #[test]
    fn test_prune_with_absent_seed_keeps_nothing() {
        let (ordered, graph) = chain_batch();
        let kept = transform(ordered, &graph, &options().with_prune_outputs(["ghost"]));
        assert!(kept.is_empty());
    }

    #[test]
    fn test_prune_is_case_insensitive() {
        let (ordered, graph) = chain_batch();
        let kept = transform(ordered, &graph, &options().with_prune_outputs(["C"]));
        assert_eq!(names(&kept), vec!["a", "b", "c"]);
    }
}
