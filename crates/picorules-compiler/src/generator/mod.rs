//! Code generation.
//!
//! Each transformed ruleblock becomes one SQL string through a dialect
//! strategy: a record of small SQL helpers (current date, casts, date
//! arithmetic, string aggregation), a handful of fragment shapes that
//! differ structurally between engines, and the per-ruleblock envelope.
//! Fragment bodies for the operator catalogue are produced once, in
//! [`fragments`], against the strategy, so the attribute filter and the
//! operator templates cannot drift between dialects.
//!
//! Oracle and PostgreSQL wrap fragments as a chain of CTEs inside a single
//! `CREATE TABLE ... AS`; T-SQL emits a serial temp-table script with a
//! mandatory primary key on each intermediate (the mechanism by which the
//! port preserves the join plan of the CTE-based dialects).

pub(crate) mod expression;
pub(crate) mod fragments;
mod mssql;
mod oracle;
mod postgres;

use itertools::Itertools;
use picorules_core::{Dialect, ParsedRuleblock, Rule};

use crate::error::Result;
use crate::options::CompileOptions;
use expression::ExpressionTranslator;

pub(crate) use mssql::MssqlStrategy;
pub(crate) use oracle::OracleStrategy;
pub(crate) use postgres::PostgresStrategy;

/// `least`/`greatest` selector for the extreme-value helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Extreme {
    Least,
    Greatest,
}

impl Extreme {
    pub(crate) fn function_name(self) -> &'static str {
        match self {
            Self::Least => "LEAST",
            Self::Greatest => "GREATEST",
        }
    }

    /// Sentinel date used to blank out NULLs: greatest coalesces to the
    /// lower date bound, least to the upper, so a NULL argument can never
    /// win.
    pub(crate) fn null_sentinel(self) -> &'static str {
        match self {
            Self::Least => "9999-12-31",
            Self::Greatest => "0001-01-01",
        }
    }
}

/// Ordinary-least-squares outputs of the `regr_*` operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Regression {
    Slope,
    Intercept,
    R2,
}

impl Regression {
    /// The native aggregate name in engines that have one.
    pub(crate) fn aggregate_name(self) -> &'static str {
        match self {
            Self::Slope => "REGR_SLOPE",
            Self::Intercept => "REGR_INTERCEPT",
            Self::R2 => "REGR_R2",
        }
    }
}

/// A generated per-variable fragment: its select body plus the flag that
/// shapes the final projection (dv-family fragments contribute two output
/// columns).
#[derive(Debug, Clone)]
pub(crate) struct EmittedFragment {
    pub variable: String,
    pub select: String,
    pub is_dv: bool,
}

impl EmittedFragment {
    /// Output columns this fragment contributes to the final SELECT, in
    /// order.
    pub fn columns(&self) -> Vec<String> {
        if self.is_dv {
            vec![
                format!("{}_val", self.variable),
                format!("{}_dt", self.variable),
            ]
        } else {
            vec![self.variable.clone()]
        }
    }
}

/// One compiled ruleblock.
#[derive(Debug, Clone)]
pub(crate) struct GeneratedRuleblock {
    pub name: String,
    pub sql: String,
    /// Logical output variables in source-rule order; dv-family variables
    /// appear once here, under the logical name.
    pub output_variables: Vec<String>,
}

/// Dialect strategy: the helpers record consulted by the expression
/// translator and the fragment builder, plus the envelope.
pub(crate) trait DialectStrategy {
    fn dialect(&self) -> Dialect;

    // ------------------------------------------------------------------
    // Naming
    // ------------------------------------------------------------------

    /// Spelling of a ruleblock's output table in emitted SQL. Oracle and
    /// PostgreSQL share `ROUT_<NAME>` (PostgreSQL folds it to lower case
    /// at execution); T-SQL uses `SROUT_<name>`.
    fn emitted_table(&self, ruleblock: &str) -> String {
        self.dialect().bind_source_table(ruleblock)
    }

    fn fragment_table(&self, variable: &str) -> String {
        self.dialect().fragment_table(variable)
    }

    fn subject_set(&self) -> &'static str {
        self.dialect().subject_set()
    }

    // ------------------------------------------------------------------
    // Expression helpers
    // ------------------------------------------------------------------

    fn current_date(&self) -> String;
    fn date_literal(&self, iso: &str) -> String;
    fn date_add_days(&self, date: &str, op: char, days: &str) -> String;
    fn date_diff_days(&self, later: &str, earlier: &str) -> String;

    /// Day interval with a numeric type suitable for aggregation.
    fn day_gap(&self, later: &str, earlier: &str) -> String {
        self.date_diff_days(later, earlier)
    }

    /// Format a date expression as `YYYY-MM-DD`.
    fn format_date(&self, expr: &str) -> String;

    /// `to_char(x, '<pattern>')` equivalent; `pattern` arrives as a quoted
    /// SQL literal.
    fn format_date_pattern(&self, expr: &str, pattern: &str) -> String;

    /// Numeric cast used in value contexts (aggregates, deltas).
    fn cast_numeric(&self, expr: &str) -> String;

    /// Numeric cast used in ORDER BY of the value-ranked dv operators.
    fn order_numeric(&self, expr: &str) -> String {
        self.cast_numeric(expr)
    }

    fn cast_string(&self, expr: &str) -> String;
    fn concat(&self, parts: &[String]) -> String;

    /// Rename target for `nvl(...)`; `None` keeps the spelling.
    fn nvl_function(&self) -> Option<&'static str>;

    /// Rename target for `ceil(...)`; `None` keeps the spelling.
    fn ceiling_function(&self) -> Option<&'static str> {
        None
    }

    fn substr_full(&self, s: &str, start: &str, len: &str) -> String;
    fn substr_right(&self, s: &str, n: &str) -> String;
    fn substr_from(&self, s: &str, start: &str) -> String;

    /// `least_date` / `greatest_date`: NULL arguments are ignored; NULL is
    /// returned only when every argument is NULL.
    fn extreme_ignore_nulls(&self, extreme: Extreme, args: &[String]) -> String;

    /// `least` / `greatest`: NULL if any argument is NULL.
    fn extreme_strict(&self, extreme: Extreme, args: &[String]) -> String;

    /// Whether `||` must be rewritten to `+`.
    fn concat_operator_is_plus(&self) -> bool {
        false
    }

    // ------------------------------------------------------------------
    // Fragment helpers
    // ------------------------------------------------------------------

    fn like_condition(&self, column: &str, pattern: &str) -> String;

    fn left_join(&self) -> &'static str {
        "LEFT JOIN"
    }

    fn string_agg(&self, element: &str, delimiter: &str, order_column: &str) -> String;
    fn stddev_pop(&self, expr: &str) -> String;

    /// Continuous 50th percentile of `value` per `eid` over `source`.
    fn median_select(&self, source: &str, value: &str, variable: &str) -> String;

    /// OLS regression of numeric `val` against day-offset from the group's
    /// earliest `dt`. Engines with native `REGR_*` aggregates use them;
    /// T-SQL overrides with the explicit formulas.
    fn regression_select(&self, kind: Regression, source: &str, variable: &str) -> String {
        format!(
            "SELECT eid, {agg}(y, x) AS {variable}\n\
             FROM (\n\
             {indent}SELECT eid, {y} AS y, {x} AS x\n\
             {indent}FROM {source}\n\
             ) t\n\
             GROUP BY eid",
            agg = kind.aggregate_name(),
            y = self.cast_numeric("val"),
            x = self.day_gap("dt", "MIN(dt) OVER (PARTITION BY eid)"),
            indent = "    ",
        )
    }

    /// Projected subject column in compute fragments and the final SELECT.
    fn projection_eid(&self) -> &'static str {
        "eid"
    }

    /// FROM clause root for compute fragments: the subject set, aliased
    /// where the dialect's join style needs it.
    fn subject_from(&self) -> String {
        self.subject_set().to_string()
    }

    /// Join clause attaching a fragment to the subject set.
    fn fragment_join(&self, fragment_table: &str) -> String;

    // ------------------------------------------------------------------
    // Envelope
    // ------------------------------------------------------------------

    /// Wrap a ruleblock's fragments into its complete SQL program.
    fn ruleblock_sql(&self, ruleblock: &str, emitted: &[EmittedFragment]) -> String;
}

/// Strategy lookup. Strategies are stateless.
pub(crate) fn strategy_for(dialect: Dialect) -> &'static dyn DialectStrategy {
    match dialect {
        Dialect::Oracle => &OracleStrategy,
        Dialect::Mssql => &MssqlStrategy,
        Dialect::Postgresql => &PostgresStrategy,
    }
}

/// Generate one SQL program per ruleblock, in list order.
pub(crate) fn generate(
    ruleblocks: &[ParsedRuleblock],
    options: &CompileOptions,
) -> Result<Vec<GeneratedRuleblock>> {
    let strategy = strategy_for(options.dialect);
    let translator = ExpressionTranslator::new(strategy, options.static_sysdate.as_deref());

    let mut generated = Vec::with_capacity(ruleblocks.len());
    for block in ruleblocks {
        generated.push(generate_ruleblock(strategy, &translator, block)?);
    }
    Ok(generated)
}

fn generate_ruleblock(
    strategy: &dyn DialectStrategy,
    translator: &ExpressionTranslator<'_>,
    block: &ParsedRuleblock,
) -> Result<GeneratedRuleblock> {
    let mut emitted: Vec<EmittedFragment> = Vec::with_capacity(block.rules.len());

    for rule in &block.rules {
        let fragment = match rule {
            Rule::Fetch(fetch) => {
                fragments::fetch_fragment(strategy, translator, &block.name, fetch, &emitted)?
            }
            Rule::Compute(compute) => {
                fragments::compute_fragment(strategy, translator, compute, &emitted)
            }
            Rule::Bind(bind) => fragments::bind_fragment(strategy, bind),
        };
        emitted.push(fragment);
    }

    let sql = strategy.ruleblock_sql(&block.name, &emitted);

    tracing::debug!(
        ruleblock = block.name.as_str(),
        fragments = emitted.len(),
        "Generated ruleblock SQL"
    );

    Ok(GeneratedRuleblock {
        name: block.name.clone(),
        sql,
        output_variables: emitted.iter().map(|f| f.variable.clone()).collect(),
    })
}

/// Shared CTE envelope for Oracle and PostgreSQL:
/// `CREATE TABLE <target> AS WITH UEADV AS (...), <fragment CTEs> SELECT ...`.
pub(crate) fn cte_ruleblock_sql(
    strategy: &dyn DialectStrategy,
    ruleblock: &str,
    emitted: &[EmittedFragment],
) -> String {
    let target = strategy.emitted_table(ruleblock);
    let mut sql = format!(
        "CREATE TABLE {target} AS\nWITH {subject} AS (\n    SELECT DISTINCT eid FROM eadv\n)",
        subject = strategy.subject_set(),
    );

    for fragment in emitted {
        let cte = strategy.fragment_table(&fragment.variable);
        sql.push_str(&format!(",\n{cte} AS (\n{}\n)", indent(&fragment.select)));
    }

    let columns: Vec<String> = emitted.iter().flat_map(|f| f.columns()).collect();
    let select_list = if columns.is_empty() {
        "eid".to_string()
    } else {
        format!("eid, {}", columns.iter().join(", "))
    };

    sql.push_str(&format!(
        "\nSELECT {select_list}\nFROM {}",
        strategy.subject_set()
    ));
    for fragment in emitted {
        sql.push('\n');
        sql.push_str(&strategy.fragment_join(&strategy.fragment_table(&fragment.variable)));
    }
    sql
}

pub(crate) fn indent(body: &str) -> String {
    body.lines()
        .map(|line| {
            if line.is_empty() {
                line.to_string()
            } else {
                format!("    {line}")
            }
        })
        .join("\n")
}

/// Escape a string for inclusion in a single-quoted SQL literal.
pub(crate) fn sql_escape(s: &str) -> String {
    s.replace('\'', "''")
}

/// Quote a string as a SQL literal.
pub(crate) fn sql_quote(s: &str) -> String {
    format!("'{}'", sql_escape(s))
}
