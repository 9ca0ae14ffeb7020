//! PostgreSQL strategy.
//!
//! Shares the CTE envelope with Oracle, including the `ROUT_<NAME>` DDL
//! spelling: PostgreSQL folds unquoted identifiers to lower case, so the
//! effective table name is `rout_<name>`. Dates subtract to integer days
//! natively; numeric and string contexts use `::numeric` / `::text`.

use itertools::Itertools;
use picorules_core::Dialect;

use super::{cte_ruleblock_sql, sql_quote, DialectStrategy, EmittedFragment, Extreme};

pub(crate) struct PostgresStrategy;

/// `expr::cast` binds tighter than operators; anything that is not a bare
/// identifier gets parenthesised first.
fn postgres_cast(expr: &str, cast: &str) -> String {
    let bare = expr
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if bare {
        format!("{expr}::{cast}")
    } else {
        format!("({expr})::{cast}")
    }
}

impl DialectStrategy for PostgresStrategy {
    fn dialect(&self) -> Dialect {
        Dialect::Postgresql
    }

    fn current_date(&self) -> String {
        "CURRENT_DATE".to_string()
    }

    fn date_literal(&self, iso: &str) -> String {
        format!("DATE '{iso}'")
    }

    fn date_add_days(&self, date: &str, op: char, days: &str) -> String {
        format!("({date} {op} {days})")
    }

    fn date_diff_days(&self, later: &str, earlier: &str) -> String {
        format!("({later} - {earlier})")
    }

    fn format_date(&self, expr: &str) -> String {
        format!("TO_CHAR({expr}, 'YYYY-MM-DD')")
    }

    fn format_date_pattern(&self, expr: &str, pattern: &str) -> String {
        format!("TO_CHAR({expr}, {pattern})")
    }

    fn cast_numeric(&self, expr: &str) -> String {
        postgres_cast(expr, "numeric")
    }

    fn cast_string(&self, expr: &str) -> String {
        postgres_cast(expr, "text")
    }

    fn concat(&self, parts: &[String]) -> String {
        parts.iter().join(" || ")
    }

    fn nvl_function(&self) -> Option<&'static str> {
        Some("COALESCE")
    }

    fn substr_full(&self, s: &str, start: &str, len: &str) -> String {
        format!("substr({s}, {start}, {len})")
    }

    /// PostgreSQL's substr does not implement Oracle's negative-start
    /// semantics.
    fn substr_right(&self, s: &str, n: &str) -> String {
        format!("RIGHT({s}, {n})")
    }

    fn substr_from(&self, s: &str, start: &str) -> String {
        format!("substr({s}, {start})")
    }

    /// PostgreSQL's GREATEST/LEAST already ignore NULLs.
    fn extreme_ignore_nulls(&self, extreme: Extreme, args: &[String]) -> String {
        format!("{}({})", extreme.function_name(), args.iter().join(", "))
    }

    /// The strict variant must propagate NULL, which the native functions
    /// do not.
    fn extreme_strict(&self, extreme: Extreme, args: &[String]) -> String {
        let null_checks = args.iter().map(|a| format!("{a} IS NULL")).join(" OR ");
        format!(
            "CASE WHEN {null_checks} THEN NULL ELSE {}({}) END",
            extreme.function_name(),
            args.iter().join(", "),
        )
    }

    fn like_condition(&self, column: &str, pattern: &str) -> String {
        format!("{column} LIKE {}", sql_quote(pattern))
    }

    fn string_agg(&self, element: &str, delimiter: &str, order_column: &str) -> String {
        format!(
            "STRING_AGG({element}, {} ORDER BY {order_column})",
            sql_quote(delimiter),
        )
    }

    fn stddev_pop(&self, expr: &str) -> String {
        format!("STDDEV_POP({expr})")
    }

    fn median_select(&self, source: &str, value: &str, variable: &str) -> String {
        format!(
            "SELECT eid, PERCENTILE_CONT(0.5) WITHIN GROUP (ORDER BY {value}) AS {variable}\nFROM {source}\nGROUP BY eid"
        )
    }

    fn fragment_join(&self, fragment_table: &str) -> String {
        format!("LEFT JOIN {fragment_table} USING (eid)")
    }

    fn ruleblock_sql(&self, ruleblock: &str, emitted: &[EmittedFragment]) -> String {
        cte_ruleblock_sql(self, ruleblock, emitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_naming_folds_to_lowercase_effectively() {
        // DDL spells ROUT_<NAME>; the dialect's effective table name is
        // the folded lowercase form used by the manifest.
        assert_eq!(PostgresStrategy.emitted_table("g"), "ROUT_G");
        assert_eq!(Dialect::Postgresql.target_table("g"), "rout_g");
    }

    #[test]
    fn test_casts() {
        assert_eq!(PostgresStrategy.cast_numeric("val"), "val::numeric");
        assert_eq!(
            PostgresStrategy.cast_numeric("val - 1"),
            "(val - 1)::numeric"
        );
        assert_eq!(PostgresStrategy.cast_string("val"), "val::text");
    }

    #[test]
    fn test_string_agg_orders_inline() {
        assert_eq!(
            PostgresStrategy.string_agg("val", ",", "dt"),
            "STRING_AGG(val, ',' ORDER BY dt)"
        );
    }

    #[test]
    fn test_median_uses_percentile_cont() {
        let sql = PostgresStrategy.median_select("(SELECT 1) src", "val::numeric", "m");
        assert!(sql.contains("PERCENTILE_CONT(0.5) WITHIN GROUP (ORDER BY val::numeric) AS m"));
        assert!(sql.contains("GROUP BY eid"));
    }

    #[test]
    fn test_ruleblock_envelope_spelling() {
        let emitted = vec![EmittedFragment {
            variable: "acr_max".to_string(),
            select: "SELECT eid, 1 AS acr_max_val, dt AS acr_max_dt\nFROM eadv".to_string(),
            is_dv: true,
        }];
        let sql = PostgresStrategy.ruleblock_sql("g", &emitted);
        assert!(sql.starts_with("CREATE TABLE ROUT_G AS\nWITH UEADV AS"));
        assert!(sql.contains("SELECT eid, acr_max_val, acr_max_dt\nFROM UEADV"));
        assert!(sql.contains("LEFT JOIN SQ_ACR_MAX USING (eid)"));
    }
}
