//! Per-rule fragment bodies.
//!
//! Every fetch operator reads from the same source relation: the event
//! table restricted by the attribute filter and the optional translated
//! predicate. When a predicate references a variable assigned earlier in
//! the same ruleblock, the source joins the subject set and the prior
//! fragments so those variables are in scope, uniformly in all three
//! dialects.
//!
//! The operator templates live here once; dialect differences are routed
//! through the strategy's helper record (casts, date arithmetic, string
//! aggregation) or, for the two shapes that differ structurally (median,
//! regression), through strategy methods.

use picorules_core::{BindRule, ComputeRule, FetchRule};

use super::expression::ExpressionTranslator;
use super::{sql_quote, DialectStrategy, EmittedFragment, Regression};
use crate::error::{CompileError, Result};
use crate::scan::split_top_level;

/// Operators whose fragment carries both a value and its date.
const DV_FUNCTIONS: &[&str] = &[
    "lastdv",
    "firstdv",
    "maxldv",
    "minldv",
    "minfdv",
    "max_neg_delta_dv",
];

/// Build the fragment for a fetch rule.
pub(crate) fn fetch_fragment(
    strategy: &dyn DialectStrategy,
    translator: &ExpressionTranslator<'_>,
    ruleblock: &str,
    rule: &FetchRule,
    priors: &[EmittedFragment],
) -> Result<EmittedFragment> {
    let src = fetch_source(strategy, translator, rule, priors);
    let var = rule.variable.as_str();
    let prop = rule.resolved_property();
    // `dt` is never cast to numeric.
    let numeric_prop = if prop == "dt" {
        prop.to_string()
    } else {
        strategy.cast_numeric(prop)
    };
    let numeric_val = strategy.cast_numeric("val");

    let select = match rule.function.as_str() {
        "last" => ranked_single(var, prop, "dt DESC, att ASC, val ASC", "1", &src),
        "first" => ranked_single(var, prop, "dt ASC, att ASC, val ASC", "1", &src),
        "nth" => {
            let k = rule
                .params
                .first()
                .and_then(|p| p.parse::<u32>().ok())
                .unwrap_or(1);
            ranked_single(
                var,
                prop,
                "dt DESC, att ASC, val ASC",
                &k.to_string(),
                &src,
            )
        }
        "count" => group_aggregate(var, "COUNT(*)", &src),
        "distinct_count" => group_aggregate(var, &format!("COUNT(DISTINCT {prop})"), &src),
        "sum" => group_aggregate(var, &format!("SUM({numeric_prop})"), &src),
        "avg" => group_aggregate(var, &format!("AVG({numeric_prop})"), &src),
        "min" => group_aggregate(var, &format!("MIN({min_max_prop})", min_max_prop = min_max_property(strategy, prop)), &src),
        "max" => group_aggregate(var, &format!("MAX({min_max_prop})", min_max_prop = min_max_property(strategy, prop)), &src),
        "median" => strategy.median_select(&src, &numeric_prop, var),
        "exists" => exists_select(strategy, var, &src),
        "stats_mode" => stats_mode_select(var, &src),
        "lastdv" => ranked_dv(var, "dt DESC, att ASC, val ASC", &src),
        "firstdv" => ranked_dv(var, "dt ASC, att ASC, val ASC", &src),
        "maxldv" => ranked_dv(
            var,
            &format!("{} DESC, dt DESC, att ASC", strategy.order_numeric("val")),
            &src,
        ),
        "minldv" => ranked_dv(
            var,
            &format!("{} ASC, dt DESC, att ASC", strategy.order_numeric("val")),
            &src,
        ),
        "minfdv" => ranked_dv(
            var,
            &format!("{} ASC, dt ASC, att ASC", strategy.order_numeric("val")),
            &src,
        ),
        "max_neg_delta_dv" => max_neg_delta_select(var, &numeric_val, &src),
        "serialize" => serialize_select(strategy, var, "val", &rule.params, &src),
        "serialize2" => {
            serialize_select(strategy, var, &strategy.cast_string("val"), &rule.params, &src)
        }
        "serializedv" => {
            let element = strategy.concat(&[
                strategy.cast_string("val"),
                "'~'".to_string(),
                strategy.format_date("dt"),
            ]);
            serialize_select(strategy, var, &element, &rule.params, &src)
        }
        "serializedv2" => {
            let element = serializedv2_element(strategy, translator, rule.params.first());
            let agg = strategy.string_agg(&element, ",", "dt");
            group_aggregate(var, &agg, &src)
        }
        "regr_slope" => strategy.regression_select(Regression::Slope, &src, var),
        "regr_intercept" => strategy.regression_select(Regression::Intercept, &src, var),
        "regr_r2" => strategy.regression_select(Regression::R2, &src, var),
        "temporal_regularity" => temporal_regularity_select(strategy, var, &src),
        other => {
            return Err(CompileError::UnsupportedFunction {
                ruleblock: ruleblock.to_string(),
                function: other.to_string(),
            })
        }
    };

    Ok(EmittedFragment {
        variable: rule.variable.clone(),
        select,
        is_dv: DV_FUNCTIONS.contains(&rule.function.as_str()),
    })
}

/// Build the fragment for a compute rule: first-match-wins CASE over the
/// subject set joined with every previously assigned variable.
pub(crate) fn compute_fragment(
    strategy: &dyn DialectStrategy,
    translator: &ExpressionTranslator<'_>,
    rule: &ComputeRule,
    priors: &[EmittedFragment],
) -> EmittedFragment {
    let mut whens = Vec::new();
    let mut else_value: Option<String> = None;
    for branch in &rule.branches {
        match &branch.predicate {
            Some(pred) => whens.push(format!(
                "WHEN {} THEN {}",
                translator.translate(pred),
                translator.translate(&branch.value)
            )),
            None => {
                if else_value.is_none() {
                    else_value = Some(translator.translate(&branch.value));
                }
            }
        }
    }

    // A compute with only an ELSE arm is a plain constant expression; a
    // CASE without WHEN arms is not valid SQL.
    let value = if whens.is_empty() {
        else_value.unwrap_or_else(|| "NULL".to_string())
    } else {
        let mut case = format!("CASE {}", whens.join(" "));
        if let Some(e) = else_value {
            case.push_str(&format!(" ELSE {e}"));
        }
        case.push_str(" END");
        case
    };

    let mut from = strategy.subject_from();
    for prior in priors {
        from.push('\n');
        from.push_str(&strategy.fragment_join(&strategy.fragment_table(&prior.variable)));
    }

    EmittedFragment {
        variable: rule.variable.clone(),
        select: format!(
            "SELECT {eid}, {value} AS {var}\nFROM {from}",
            eid = strategy.projection_eid(),
            var = rule.variable,
        ),
        is_dv: false,
    }
}

/// Build the fragment for a bind rule: the source variable read from the
/// other ruleblock's output table, aliased to the local name.
pub(crate) fn bind_fragment(strategy: &dyn DialectStrategy, rule: &BindRule) -> EmittedFragment {
    EmittedFragment {
        variable: rule.variable.clone(),
        select: format!(
            "SELECT eid, {source} AS {local}\nFROM {table}",
            source = rule.source_variable,
            local = rule.variable,
            table = strategy.emitted_table(&rule.source_ruleblock),
        ),
        is_dv: false,
    }
}

/// The WHERE clause over `att` built from an attribute list: equality for
/// literal names, LIKE for `%` patterns, disjoined and parenthesised when
/// there is more than one.
pub(crate) fn attribute_filter(strategy: &dyn DialectStrategy, attributes: &[String]) -> String {
    let clauses: Vec<String> = attributes
        .iter()
        .map(|attribute| {
            if attribute.contains('%') {
                strategy.like_condition("att", attribute)
            } else {
                format!("att = {}", sql_quote(attribute))
            }
        })
        .collect();

    if clauses.len() > 1 {
        format!("({})", clauses.join(" OR "))
    } else {
        clauses.join("")
    }
}

/// The source relation of a fetch fragment. Without dependent predicate
/// references this is the filtered event table; with them, the subject set
/// joined to the event table and the prior fragments.
fn fetch_source(
    strategy: &dyn DialectStrategy,
    translator: &ExpressionTranslator<'_>,
    rule: &FetchRule,
    priors: &[EmittedFragment],
) -> String {
    let filter = attribute_filter(strategy, &rule.attributes);
    let where_clause = match rule.predicate.as_deref() {
        Some(pred) => format!("{filter} AND ({})", translator.translate(pred)),
        None => filter,
    };

    let dependencies: Vec<&EmittedFragment> = priors
        .iter()
        .filter(|prior| references_fragment(rule, prior))
        .collect();

    if dependencies.is_empty() {
        format!(
            "(\n    SELECT eid, att, dt, val\n    FROM {table}\n    WHERE {where_clause}\n) src",
            table = rule.table,
        )
    } else {
        let mut joins = String::new();
        for prior in &dependencies {
            let fragment = strategy.fragment_table(&prior.variable);
            joins.push_str(&format!(
                "\n    {join} {fragment} ON {fragment}.eid = u.eid",
                join = strategy.left_join(),
            ));
        }
        format!(
            "(\n    SELECT e.eid, e.att, e.dt, e.val\n    FROM {subject} u\n    JOIN {table} e ON e.eid = u.eid{joins}\n    WHERE {where_clause}\n) src",
            subject = strategy.subject_set(),
            table = rule.table,
        )
    }
}

/// Whether a fetch predicate references a prior fragment's variable,
/// including the `_val` / `_dt` columns of dv-family fragments.
fn references_fragment(rule: &FetchRule, prior: &EmittedFragment) -> bool {
    if rule.references.contains(&prior.variable) {
        return true;
    }
    prior.is_dv
        && (rule.references.contains(&format!("{}_val", prior.variable))
            || rule.references.contains(&format!("{}_dt", prior.variable)))
}

fn min_max_property(strategy: &dyn DialectStrategy, prop: &str) -> String {
    // min/max over dt stay dates; everything else goes numeric.
    if prop == "dt" {
        prop.to_string()
    } else {
        strategy.cast_numeric(prop)
    }
}

fn ranked_single(var: &str, prop: &str, order: &str, rank: &str, src: &str) -> String {
    format!(
        "SELECT eid, {var}\n\
         FROM (\n\
         \x20   SELECT eid, {prop} AS {var}, ROW_NUMBER() OVER (PARTITION BY eid ORDER BY {order}) AS rn\n\
         \x20   FROM {src}\n\
         ) t\n\
         WHERE rn = {rank}"
    )
}

fn ranked_dv(var: &str, order: &str, src: &str) -> String {
    format!(
        "SELECT eid, {var}_val, {var}_dt\n\
         FROM (\n\
         \x20   SELECT eid, val AS {var}_val, dt AS {var}_dt, ROW_NUMBER() OVER (PARTITION BY eid ORDER BY {order}) AS rn\n\
         \x20   FROM {src}\n\
         ) t\n\
         WHERE rn = 1"
    )
}

fn group_aggregate(var: &str, aggregate: &str, src: &str) -> String {
    format!(
        "SELECT eid, {aggregate} AS {var}\n\
         FROM {src}\n\
         GROUP BY eid"
    )
}

fn max_neg_delta_select(var: &str, numeric_val: &str, src: &str) -> String {
    format!(
        "SELECT eid, {var}_val, {var}_dt\n\
         FROM (\n\
         \x20   SELECT eid, delta AS {var}_val, dt AS {var}_dt, ROW_NUMBER() OVER (PARTITION BY eid ORDER BY delta ASC, dt DESC) AS rn\n\
         \x20   FROM (\n\
         \x20       SELECT eid, dt, {numeric_val} - LAG({numeric_val}) OVER (PARTITION BY eid ORDER BY dt ASC) AS delta\n\
         \x20       FROM {src}\n\
         \x20   ) d\n\
         \x20   WHERE delta < 0\n\
         ) t\n\
         WHERE rn = 1"
    )
}

fn serialize_select(
    strategy: &dyn DialectStrategy,
    var: &str,
    element: &str,
    params: &[String],
    src: &str,
) -> String {
    let delimiter = params
        .first()
        .map(|p| p.trim_matches('`'))
        .filter(|d| !d.is_empty())
        .unwrap_or(",");
    let aggregate = strategy.string_agg(element, delimiter, "dt");
    group_aggregate(var, &aggregate, src)
}

/// Element expression of `serializedv2(fmt)`: sub-expressions separated by
/// `~` are rendered individually (`dt` becomes a formatted date, anything
/// else is translated and string-cast), then concatenated with literal `~`
/// separators.
fn serializedv2_element(
    strategy: &dyn DialectStrategy,
    translator: &ExpressionTranslator<'_>,
    format: Option<&String>,
) -> String {
    let format = format.map(String::as_str).unwrap_or("val~dt");
    let mut parts = Vec::new();
    for (i, piece) in split_top_level(format, '~').into_iter().enumerate() {
        if i > 0 {
            parts.push("'~'".to_string());
        }
        let piece = piece.trim();
        if piece == "dt" {
            parts.push(strategy.format_date("dt"));
        } else {
            parts.push(strategy.cast_string(&translator.translate(piece)));
        }
    }
    strategy.concat(&parts)
}

fn exists_select(strategy: &dyn DialectStrategy, var: &str, src: &str) -> String {
    format!(
        "SELECT u.eid AS eid, CASE WHEN m.eid IS NULL THEN 0 ELSE 1 END AS {var}\n\
         FROM {subject} u\n\
         {join} (\n\
         \x20   SELECT eid\n\
         \x20   FROM {src}\n\
         \x20   GROUP BY eid\n\
         ) m ON m.eid = u.eid",
        subject = strategy.subject_set(),
        join = strategy.left_join(),
    )
}

fn stats_mode_select(var: &str, src: &str) -> String {
    format!(
        "SELECT eid, {var}\n\
         FROM (\n\
         \x20   SELECT eid, val AS {var}, ROW_NUMBER() OVER (PARTITION BY eid ORDER BY COUNT(*) DESC, val ASC) AS rn\n\
         \x20   FROM {src}\n\
         \x20   GROUP BY eid, val\n\
         ) t\n\
         WHERE rn = 1"
    )
}

fn temporal_regularity_select(strategy: &dyn DialectStrategy, var: &str, src: &str) -> String {
    let gap = strategy.day_gap("dt", "LAG(dt) OVER (PARTITION BY eid ORDER BY dt ASC)");
    format!(
        "SELECT eid, CASE WHEN COUNT(gap) < 1 THEN NULL WHEN AVG(gap) = 0 THEN 0 ELSE {stddev} / AVG(gap) END AS {var}\n\
         FROM (\n\
         \x20   SELECT eid, {gap} AS gap\n\
         \x20   FROM {src}\n\
         ) t\n\
         GROUP BY eid",
        stddev = strategy.stddev_pop("gap"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::expression::ExpressionTranslator;
    use crate::generator::{strategy_for, MssqlStrategy, OracleStrategy};
    use picorules_core::{ComputeBranch, Dialect};
    use std::collections::BTreeSet;

    fn fetch(function: &str, params: Vec<&str>) -> FetchRule {
        FetchRule {
            variable: "v1".to_string(),
            table: "eadv".to_string(),
            attributes: vec!["lab_bld_egfr".to_string()],
            property: "val".to_string(),
            function: function.to_string(),
            params: params.into_iter().map(str::to_string).collect(),
            predicate: None,
            references: BTreeSet::new(),
        }
    }

    fn build(dialect: Dialect, rule: &FetchRule) -> EmittedFragment {
        let strategy = strategy_for(dialect);
        let translator = ExpressionTranslator::new(strategy, None);
        fetch_fragment(strategy, &translator, "rb1", rule, &[]).expect("fragment failed")
    }

    #[test]
    fn test_attribute_filter_single_literal() {
        assert_eq!(
            attribute_filter(&OracleStrategy, &["lab_bld_egfr".to_string()]),
            "att = 'lab_bld_egfr'"
        );
    }

    #[test]
    fn test_attribute_filter_wildcard_and_list() {
        let attrs = vec!["icd_n18%".to_string(), "icpc_u99".to_string()];
        assert_eq!(
            attribute_filter(&OracleStrategy, &attrs),
            "(att LIKE 'icd_n18%' OR att = 'icpc_u99')"
        );
    }

    #[test]
    fn test_attribute_filter_mssql_escapes_underscores() {
        assert_eq!(
            attribute_filter(&MssqlStrategy, &["lab_bld_%".to_string()]),
            r"att LIKE 'lab\_bld\_%' ESCAPE '\'"
        );
    }

    #[test]
    fn test_last_fragment_shape() {
        let frag = build(Dialect::Oracle, &fetch("last", vec![]));
        assert!(!frag.is_dv);
        assert!(frag.select.contains(
            "ROW_NUMBER() OVER (PARTITION BY eid ORDER BY dt DESC, att ASC, val ASC)"
        ));
        assert!(frag.select.contains("WHERE rn = 1"));
        assert!(frag.select.contains("att = 'lab_bld_egfr'"));
    }

    #[test]
    fn test_nth_uses_parameter() {
        let frag = build(Dialect::Oracle, &fetch("nth", vec!["3"]));
        assert!(frag.select.contains("WHERE rn = 3"));
    }

    #[test]
    fn test_count_fragment() {
        let frag = build(Dialect::Postgresql, &fetch("count", vec![]));
        assert!(frag.select.contains("COUNT(*) AS v1"));
        assert!(frag.select.contains("GROUP BY eid"));
    }

    #[test]
    fn test_min_on_dt_keeps_date() {
        let mut rule = fetch("min", vec![]);
        rule.property = "dt".to_string();
        let frag = build(Dialect::Mssql, &rule);
        assert!(frag.select.contains("MIN(dt) AS v1"));
        assert!(!frag.select.contains("TRY_CAST(dt"));
    }

    #[test]
    fn test_avg_casts_numeric() {
        let frag = build(Dialect::Mssql, &fetch("avg", vec![]));
        assert!(frag.select.contains("AVG(TRY_CAST(val AS FLOAT)) AS v1"));
    }

    #[test]
    fn test_maxldv_is_dv_and_orders_by_value() {
        let frag = build(Dialect::Oracle, &fetch("maxldv", vec![]));
        assert!(frag.is_dv);
        assert!(frag.select.contains("v1_val"));
        assert!(frag.select.contains("v1_dt"));
        assert!(frag
            .select
            .contains("ORDER BY TO_NUMBER(val) DESC, dt DESC, att ASC"));
    }

    #[test]
    fn test_minfdv_earliest_date_wins_ties() {
        let frag = build(Dialect::Postgresql, &fetch("minfdv", vec![]));
        assert!(frag.select.contains("ORDER BY val::numeric ASC, dt ASC, att ASC"));
    }

    #[test]
    fn test_max_neg_delta_keeps_negative_deltas_only() {
        let frag = build(Dialect::Postgresql, &fetch("max_neg_delta_dv", vec![]));
        assert!(frag.is_dv);
        assert!(frag.select.contains("LAG(val::numeric) OVER (PARTITION BY eid ORDER BY dt ASC)"));
        assert!(frag.select.contains("WHERE delta < 0"));
        assert!(frag.select.contains("ORDER BY delta ASC, dt DESC"));
    }

    #[test]
    fn test_serialize_uses_delimiter_param() {
        let frag = build(Dialect::Oracle, &fetch("serialize", vec!["`;`"]));
        assert!(frag
            .select
            .contains("LISTAGG(val, ';') WITHIN GROUP (ORDER BY dt)"));
    }

    #[test]
    fn test_serializedv_formats_date() {
        let frag = build(Dialect::Postgresql, &fetch("serializedv", vec![]));
        assert!(frag.select.contains("val::text || '~' || TO_CHAR(dt, 'YYYY-MM-DD')"));
    }

    #[test]
    fn test_serializedv2_nested_paren_format() {
        let frag = build(
            Dialect::Mssql,
            &fetch("serializedv2", vec!["round(val,0)~dt"]),
        );
        assert!(frag
            .select
            .contains("CAST(round(val,0) AS VARCHAR(1000)) + '~' + CONVERT(VARCHAR(10), dt, 120)"));
        assert!(frag.select.contains("STRING_AGG("));
        assert!(frag.select.contains("',') WITHIN GROUP (ORDER BY dt)"));
    }

    #[test]
    fn test_exists_yields_zero_or_one() {
        let frag = build(Dialect::Mssql, &fetch("exists", vec![]));
        assert!(frag
            .select
            .contains("CASE WHEN m.eid IS NULL THEN 0 ELSE 1 END AS v1"));
        assert!(frag.select.contains("FROM #UEADV u"));
        assert!(frag.select.contains("LEFT OUTER JOIN"));
    }

    #[test]
    fn test_stats_mode_tie_breaks_lexicographically() {
        let frag = build(Dialect::Oracle, &fetch("stats_mode", vec![]));
        assert!(frag.select.contains("ORDER BY COUNT(*) DESC, val ASC"));
        assert!(frag.select.contains("GROUP BY eid, val"));
    }

    #[test]
    fn test_temporal_regularity_guards() {
        let frag = build(Dialect::Oracle, &fetch("temporal_regularity", vec![]));
        assert!(frag.select.contains("WHEN COUNT(gap) < 1 THEN NULL"));
        assert!(frag.select.contains("WHEN AVG(gap) = 0 THEN 0"));
        assert!(frag.select.contains("STDDEV_POP(gap) / AVG(gap)"));
    }

    #[test]
    fn test_regression_native_aggregates() {
        let frag = build(Dialect::Postgresql, &fetch("regr_slope", vec![]));
        assert!(frag.select.contains("REGR_SLOPE(y, x)"));
        assert!(frag.select.contains("MIN(dt) OVER (PARTITION BY eid)"));
    }

    #[test]
    fn test_regression_mssql_formula_guards_zero_denominator() {
        let frag = build(Dialect::Mssql, &fetch("regr_slope", vec![]));
        assert!(frag.select.contains("NULLIF("));
        assert!(frag.select.contains("SUM(x * y)"));
        assert!(!frag.select.contains("REGR_SLOPE"));
    }

    #[test]
    fn test_unsupported_function_reported() {
        let strategy = strategy_for(Dialect::Oracle);
        let translator = ExpressionTranslator::new(strategy, None);
        let err = fetch_fragment(strategy, &translator, "rb1", &fetch("frobnicate", vec![]), &[])
            .unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedFunction { .. }));
    }

    #[test]
    fn test_predicate_translated_into_where() {
        let mut rule = fetch("last", vec![]);
        rule.predicate = Some("val > 10 and dt > sysdate - 365".to_string());
        let frag = build(Dialect::Mssql, &rule);
        assert!(frag
            .select
            .contains("AND (val > 10 and dt > DATEADD(day, -365, GETDATE()))"));
    }

    #[test]
    fn test_dependent_predicate_joins_prior_fragment() {
        let strategy = strategy_for(Dialect::Postgresql);
        let translator = ExpressionTranslator::new(strategy, None);
        let prior = EmittedFragment {
            variable: "egfr_last".to_string(),
            select: String::new(),
            is_dv: false,
        };
        let mut rule = fetch("count", vec![]);
        rule.predicate = Some("val > egfr_last".to_string());
        rule.references = BTreeSet::from(["egfr_last".to_string()]);
        let frag = fetch_fragment(strategy, &translator, "rb1", &rule, &[prior]).unwrap();
        assert!(frag.select.contains("FROM UEADV u"));
        assert!(frag.select.contains("JOIN eadv e ON e.eid = u.eid"));
        assert!(frag
            .select
            .contains("LEFT JOIN SQ_EGFR_LAST ON SQ_EGFR_LAST.eid = u.eid"));
    }

    #[test]
    fn test_dependent_predicate_on_dv_columns() {
        let strategy = strategy_for(Dialect::Oracle);
        let translator = ExpressionTranslator::new(strategy, None);
        let prior = EmittedFragment {
            variable: "acr".to_string(),
            select: String::new(),
            is_dv: true,
        };
        let mut rule = fetch("count", vec![]);
        rule.predicate = Some("dt > acr_dt".to_string());
        rule.references = BTreeSet::from(["acr_dt".to_string()]);
        let frag = fetch_fragment(strategy, &translator, "rb1", &rule, &[prior]).unwrap();
        assert!(frag.select.contains("LEFT JOIN SQ_ACR ON SQ_ACR.eid = u.eid"));
    }

    #[test]
    fn test_compute_fragment_case_shape() {
        let strategy = strategy_for(Dialect::Oracle);
        let translator = ExpressionTranslator::new(strategy, None);
        let prior = EmittedFragment {
            variable: "egfr_last".to_string(),
            select: String::new(),
            is_dv: false,
        };
        let rule = ComputeRule {
            variable: "has_ckd".to_string(),
            branches: vec![
                ComputeBranch::new("egfr_last < 60", "1"),
                ComputeBranch::otherwise("0"),
            ],
            references: BTreeSet::new(),
        };
        let frag = compute_fragment(strategy, &translator, &rule, &[prior]);
        assert_eq!(
            frag.select,
            "SELECT eid, CASE WHEN egfr_last < 60 THEN 1 ELSE 0 END AS has_ckd\nFROM UEADV\nLEFT JOIN SQ_EGFR_LAST USING (eid)"
        );
    }

    #[test]
    fn test_compute_without_else_has_no_else() {
        let strategy = strategy_for(Dialect::Oracle);
        let translator = ExpressionTranslator::new(strategy, None);
        let rule = ComputeRule {
            variable: "x".to_string(),
            branches: vec![ComputeBranch::new("a > 1", "1")],
            references: BTreeSet::new(),
        };
        let frag = compute_fragment(strategy, &translator, &rule, &[]);
        assert!(frag.select.contains("CASE WHEN a > 1 THEN 1 END"));
        assert!(!frag.select.contains("ELSE"));
    }

    #[test]
    fn test_compute_with_only_else_is_plain_expression() {
        let strategy = strategy_for(Dialect::Oracle);
        let translator = ExpressionTranslator::new(strategy, None);
        let rule = ComputeRule {
            variable: "x".to_string(),
            branches: vec![ComputeBranch::otherwise("42")],
            references: BTreeSet::new(),
        };
        let frag = compute_fragment(strategy, &translator, &rule, &[]);
        assert_eq!(frag.select, "SELECT eid, 42 AS x\nFROM UEADV");
    }

    #[test]
    fn test_compute_mssql_join_style() {
        let strategy = strategy_for(Dialect::Mssql);
        let translator = ExpressionTranslator::new(strategy, None);
        let prior = EmittedFragment {
            variable: "a".to_string(),
            select: String::new(),
            is_dv: false,
        };
        let rule = ComputeRule {
            variable: "b".to_string(),
            branches: vec![ComputeBranch::otherwise("a")],
            references: BTreeSet::new(),
        };
        let frag = compute_fragment(strategy, &translator, &rule, &[prior]);
        assert!(frag.select.contains("SELECT u.eid, a AS b"));
        assert!(frag.select.contains("FROM #UEADV u"));
        assert!(frag.select.contains("LEFT OUTER JOIN #SQ_a ON u.eid = #SQ_a.eid"));
    }

    #[test]
    fn test_bind_fragment_naming_per_dialect() {
        let rule = BindRule {
            variable: "c".to_string(),
            source_ruleblock: "rb2".to_string(),
            source_variable: "b".to_string(),
            property: "val".to_string(),
            references: BTreeSet::new(),
        };
        let oracle = bind_fragment(strategy_for(Dialect::Oracle), &rule);
        assert_eq!(oracle.select, "SELECT eid, b AS c\nFROM ROUT_RB2");

        let mssql = bind_fragment(strategy_for(Dialect::Mssql), &rule);
        assert_eq!(mssql.select, "SELECT eid, b AS c\nFROM SROUT_rb2");

        let postgres = bind_fragment(strategy_for(Dialect::Postgresql), &rule);
        assert_eq!(postgres.select, "SELECT eid, b AS c\nFROM ROUT_RB2");
    }
}
