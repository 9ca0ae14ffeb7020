//! Oracle PL/SQL strategy.
//!
//! Fragments are CTEs inside a single `CREATE TABLE ... AS WITH`. Oracle
//! date arithmetic is native (`date - date` is days, `date + n` adds
//! days), `val` stays uncast in value contexts, and the value-ranked dv
//! operators order by `TO_NUMBER(val)`.

use itertools::Itertools;
use picorules_core::Dialect;

use super::{cte_ruleblock_sql, sql_quote, DialectStrategy, EmittedFragment, Extreme};

pub(crate) struct OracleStrategy;

impl DialectStrategy for OracleStrategy {
    fn dialect(&self) -> Dialect {
        Dialect::Oracle
    }

    fn current_date(&self) -> String {
        "SYSDATE".to_string()
    }

    fn date_literal(&self, iso: &str) -> String {
        format!("TO_DATE('{iso}', 'YYYY-MM-DD')")
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

    /// Value contexts rely on Oracle's implicit conversion.
    fn cast_numeric(&self, expr: &str) -> String {
        expr.to_string()
    }

    fn order_numeric(&self, expr: &str) -> String {
        format!("TO_NUMBER({expr})")
    }

    fn cast_string(&self, expr: &str) -> String {
        expr.to_string()
    }

    fn concat(&self, parts: &[String]) -> String {
        parts.iter().join(" || ")
    }

    fn nvl_function(&self) -> Option<&'static str> {
        None
    }

    fn substr_full(&self, s: &str, start: &str, len: &str) -> String {
        format!("substr({s}, {start}, {len})")
    }

    fn substr_right(&self, s: &str, n: &str) -> String {
        format!("substr({s}, -{n})")
    }

    fn substr_from(&self, s: &str, start: &str) -> String {
        format!("substr({s}, {start})")
    }

    /// Oracle's GREATEST/LEAST propagate NULL, so NULLs are coalesced to a
    /// sentinel bound and the sentinel is folded back to NULL when it wins.
    fn extreme_ignore_nulls(&self, extreme: Extreme, args: &[String]) -> String {
        let sentinel = self.date_literal(extreme.null_sentinel());
        let coalesced = args
            .iter()
            .map(|a| format!("COALESCE({a}, {sentinel})"))
            .join(", ");
        format!(
            "NULLIF({fn_name}({coalesced}), {sentinel})",
            fn_name = extreme.function_name(),
        )
    }

    fn extreme_strict(&self, extreme: Extreme, args: &[String]) -> String {
        format!("{}({})", extreme.function_name(), args.iter().join(", "))
    }

    fn like_condition(&self, column: &str, pattern: &str) -> String {
        format!("{column} LIKE {}", sql_quote(pattern))
    }

    fn string_agg(&self, element: &str, delimiter: &str, order_column: &str) -> String {
        format!(
            "LISTAGG({element}, {}) WITHIN GROUP (ORDER BY {order_column})",
            sql_quote(delimiter),
        )
    }

    fn stddev_pop(&self, expr: &str) -> String {
        format!("STDDEV_POP({expr})")
    }

    fn median_select(&self, source: &str, value: &str, variable: &str) -> String {
        format!(
            "SELECT eid, MEDIAN({value}) AS {variable}\nFROM {source}\nGROUP BY eid"
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
    fn test_naming() {
        assert_eq!(OracleStrategy.emitted_table("ckd"), "ROUT_CKD");
        assert_eq!(OracleStrategy.fragment_table("egfr_last"), "SQ_EGFR_LAST");
        assert_eq!(OracleStrategy.subject_set(), "UEADV");
    }

    #[test]
    fn test_date_helpers() {
        assert_eq!(OracleStrategy.current_date(), "SYSDATE");
        assert_eq!(
            OracleStrategy.date_add_days("SYSDATE", '-', "30"),
            "(SYSDATE - 30)"
        );
        assert_eq!(OracleStrategy.date_diff_days("a", "b"), "(a - b)");
        assert_eq!(
            OracleStrategy.format_date("dt"),
            "TO_CHAR(dt, 'YYYY-MM-DD')"
        );
    }

    #[test]
    fn test_casts_are_raw() {
        assert_eq!(OracleStrategy.cast_numeric("val"), "val");
        assert_eq!(OracleStrategy.cast_string("val"), "val");
        assert_eq!(OracleStrategy.order_numeric("val"), "TO_NUMBER(val)");
    }

    #[test]
    fn test_ruleblock_envelope() {
        let emitted = vec![
            EmittedFragment {
                variable: "egfr_last".to_string(),
                select: "SELECT eid, 1 AS egfr_last\nFROM eadv".to_string(),
                is_dv: false,
            },
            EmittedFragment {
                variable: "acr".to_string(),
                select: "SELECT eid, 1 AS acr_val, dt AS acr_dt\nFROM eadv".to_string(),
                is_dv: true,
            },
        ];
        let sql = OracleStrategy.ruleblock_sql("ckd", &emitted);
        assert!(sql.starts_with("CREATE TABLE ROUT_CKD AS\nWITH UEADV AS (\n    SELECT DISTINCT eid FROM eadv\n)"));
        assert!(sql.contains(",\nSQ_EGFR_LAST AS (\n"));
        assert!(sql.contains(",\nSQ_ACR AS (\n"));
        assert!(sql.contains("SELECT eid, egfr_last, acr_val, acr_dt\nFROM UEADV"));
        assert!(sql.contains("LEFT JOIN SQ_EGFR_LAST USING (eid)"));
        assert!(sql.contains("LEFT JOIN SQ_ACR USING (eid)"));
    }

    #[test]
    fn test_ruleblock_envelope_without_fragments() {
        let sql = OracleStrategy.ruleblock_sql("empty", &[]);
        assert!(sql.contains("SELECT eid\nFROM UEADV"));
    }
}
