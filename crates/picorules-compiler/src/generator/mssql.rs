//! SQL Server T-SQL strategy.
//!
//! No CTE chain here: the envelope is a serial script that drops the
//! target and every per-variable temp table, builds `#UEADV`, materialises
//! each fragment as `SELECT * INTO #SQ_<var>` with a primary key on `eid`
//! (the mechanism by which the port preserves the join plan of the
//! CTE-based dialects), and assembles the target with LEFT OUTER JOINs.
//!
//! Numeric contexts use `TRY_CAST(val AS FLOAT)` so dirty values surface
//! as NULL instead of a runtime conversion error.

use itertools::Itertools;
use picorules_core::Dialect;

use super::{indent, sql_escape, sql_quote, DialectStrategy, EmittedFragment, Extreme, Regression};

pub(crate) struct MssqlStrategy;

impl DialectStrategy for MssqlStrategy {
    fn dialect(&self) -> Dialect {
        Dialect::Mssql
    }

    fn current_date(&self) -> String {
        "GETDATE()".to_string()
    }

    fn date_literal(&self, iso: &str) -> String {
        format!("CAST('{iso}' AS DATE)")
    }

    fn date_add_days(&self, date: &str, op: char, days: &str) -> String {
        let days = if op == '-' {
            format!("-{days}")
        } else {
            days.to_string()
        };
        format!("DATEADD(day, {days}, {date})")
    }

    fn date_diff_days(&self, later: &str, earlier: &str) -> String {
        format!("DATEDIFF(day, {earlier}, {later})")
    }

    /// AVG over integer DATEDIFFs truncates; gaps are aggregated as FLOAT.
    fn day_gap(&self, later: &str, earlier: &str) -> String {
        format!("CAST(DATEDIFF(day, {earlier}, {later}) AS FLOAT)")
    }

    fn format_date(&self, expr: &str) -> String {
        format!("CONVERT(VARCHAR(10), {expr}, 120)")
    }

    fn format_date_pattern(&self, expr: &str, pattern: &str) -> String {
        // Style 120 is ISO yyyy-mm-dd hh:mi:ss; ten characters keep the
        // date part, which covers the format the rule language uses.
        if pattern.to_uppercase().contains("YYYY-MM-DD") {
            format!("CONVERT(VARCHAR(10), {expr}, 120)")
        } else {
            format!("CONVERT(VARCHAR(30), {expr}, 120)")
        }
    }

    fn cast_numeric(&self, expr: &str) -> String {
        format!("TRY_CAST({expr} AS FLOAT)")
    }

    fn cast_string(&self, expr: &str) -> String {
        format!("CAST({expr} AS VARCHAR(1000))")
    }

    fn concat(&self, parts: &[String]) -> String {
        parts.iter().join(" + ")
    }

    fn nvl_function(&self) -> Option<&'static str> {
        Some("ISNULL")
    }

    fn ceiling_function(&self) -> Option<&'static str> {
        Some("CEILING")
    }

    fn substr_full(&self, s: &str, start: &str, len: &str) -> String {
        format!("SUBSTRING({s}, {start}, {len})")
    }

    fn substr_right(&self, s: &str, n: &str) -> String {
        format!("RIGHT({s}, {n})")
    }

    fn substr_from(&self, s: &str, start: &str) -> String {
        format!("SUBSTRING({s}, {start}, LEN({s}))")
    }

    /// GREATEST/LEAST (SQL Server 2022) already ignore NULLs.
    fn extreme_ignore_nulls(&self, extreme: Extreme, args: &[String]) -> String {
        format!("{}({})", extreme.function_name(), args.iter().join(", "))
    }

    fn extreme_strict(&self, extreme: Extreme, args: &[String]) -> String {
        let null_checks = args.iter().map(|a| format!("{a} IS NULL")).join(" OR ");
        format!(
            "CASE WHEN {null_checks} THEN NULL ELSE {}({}) END",
            extreme.function_name(),
            args.iter().join(", "),
        )
    }

    fn concat_operator_is_plus(&self) -> bool {
        true
    }

    /// `_` is a LIKE wildcard, so literal underscores in attribute
    /// patterns are escaped; `%` stays a wildcard.
    fn like_condition(&self, column: &str, pattern: &str) -> String {
        let escaped = sql_escape(pattern).replace('_', r"\_");
        format!(r"{column} LIKE '{escaped}' ESCAPE '\'")
    }

    fn left_join(&self) -> &'static str {
        "LEFT OUTER JOIN"
    }

    fn string_agg(&self, element: &str, delimiter: &str, order_column: &str) -> String {
        format!(
            "STRING_AGG({element}, {}) WITHIN GROUP (ORDER BY {order_column})",
            sql_quote(delimiter),
        )
    }

    fn stddev_pop(&self, expr: &str) -> String {
        format!("STDEVP({expr})")
    }

    /// PERCENTILE_CONT is a window function in T-SQL, not an aggregate.
    fn median_select(&self, source: &str, value: &str, variable: &str) -> String {
        format!(
            "SELECT DISTINCT eid, PERCENTILE_CONT(0.5) WITHIN GROUP (ORDER BY {value}) OVER (PARTITION BY eid) AS {variable}\nFROM {source}"
        )
    }

    /// No native REGR_* aggregates; ordinary-least-squares spelled out,
    /// with NULLIF guarding the zero-variance denominator.
    fn regression_select(&self, kind: Regression, source: &str, variable: &str) -> String {
        let slope_numerator = "(COUNT(*) * SUM(x * y) - SUM(x) * SUM(y))";
        let denominator = "(COUNT(*) * SUM(x * x) - SUM(x) * SUM(x))";
        let formula = match kind {
            Regression::Slope => {
                format!("{slope_numerator} / NULLIF({denominator}, 0)")
            }
            Regression::Intercept => format!(
                "(SUM(y) * SUM(x * x) - SUM(x) * SUM(x * y)) / NULLIF({denominator}, 0)"
            ),
            Regression::R2 => format!(
                "({slope_numerator} * {slope_numerator}) / NULLIF({denominator} * (COUNT(*) * SUM(y * y) - SUM(y) * SUM(y)), 0)"
            ),
        };
        format!(
            "SELECT eid, {formula} AS {variable}\n\
             FROM (\n\
             \x20   SELECT eid, {y} AS y, {x} AS x\n\
             \x20   FROM {source}\n\
             ) t\n\
             GROUP BY eid",
            y = self.cast_numeric("val"),
            x = self.day_gap("dt", "MIN(dt) OVER (PARTITION BY eid)"),
        )
    }

    fn projection_eid(&self) -> &'static str {
        "u.eid"
    }

    fn subject_from(&self) -> String {
        "#UEADV u".to_string()
    }

    fn fragment_join(&self, fragment_table: &str) -> String {
        format!("LEFT OUTER JOIN {fragment_table} ON u.eid = {fragment_table}.eid")
    }

    fn ruleblock_sql(&self, ruleblock: &str, emitted: &[EmittedFragment]) -> String {
        let target = self.emitted_table(ruleblock);
        let mut sql = String::new();

        sql.push_str(&format!(
            "IF OBJECT_ID('{target}') IS NOT NULL DROP TABLE {target};\n"
        ));
        sql.push_str("IF OBJECT_ID('tempdb..#UEADV') IS NOT NULL DROP TABLE #UEADV;\n");
        for fragment in emitted {
            let table = self.fragment_table(&fragment.variable);
            sql.push_str(&format!(
                "IF OBJECT_ID('tempdb..{table}') IS NOT NULL DROP TABLE {table};\n"
            ));
        }

        sql.push_str("SELECT eid INTO #UEADV FROM eadv GROUP BY eid;\n");
        sql.push_str("ALTER TABLE #UEADV ADD PRIMARY KEY (eid);\n");

        for fragment in emitted {
            let table = self.fragment_table(&fragment.variable);
            sql.push_str(&format!(
                "SELECT * INTO {table} FROM (\n{}\n) AS f;\n",
                indent(&fragment.select)
            ));
            sql.push_str(&format!("ALTER TABLE {table} ADD PRIMARY KEY (eid);\n"));
        }

        let columns: Vec<String> = emitted.iter().flat_map(|f| f.columns()).collect();
        let select_list = if columns.is_empty() {
            "u.eid".to_string()
        } else {
            format!("u.eid, {}", columns.iter().join(", "))
        };

        sql.push_str(&format!("SELECT {select_list}\nINTO {target}\nFROM #UEADV u"));
        for fragment in emitted {
            sql.push('\n');
            sql.push_str(&self.fragment_join(&self.fragment_table(&fragment.variable)));
        }
        sql.push(';');
        sql
    }
}
