//! Expression translation.
//!
//! The Picorules expression sub-language appears inside compute arms and
//! fetch predicates. Translation to dialect SQL is an ordered pipeline of
//! string rewrites on a single string: the surface is too loose for an
//! AST, and the target is textual SQL. Order is significant: date
//! arithmetic involving `sysdate` must run before the generic `sysdate`
//! substitution, and `!?` must run before `?`.
//!
//! Rewrites that follow the backtick-literal pass are applied outside
//! single-quoted regions, so question marks or keywords inside string
//! literals are never touched.

use std::sync::LazyLock;

use super::{sql_escape, DialectStrategy, Extreme};
use crate::scan::{find_matching_paren, split_top_level};

/// Date-typed variable shape: `dt` itself, or names ending in `_dt`,
/// `_dt_min`, `_dt_max`, `_fd`, `_ld`.
const DATE_VARIABLE: &str = r"(?:[a-z_][a-z0-9_]*(?:_dt_min|_dt_max|_dt|_fd|_ld)|dt)";

static BACKTICK_REGEX: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"`([^`]*)`").expect("Invalid backtick regex"));

static NOT_NULL_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?P<head>[a-z_][a-z0-9_]*|\))\s*!\?").expect("Invalid not-null regex")
});

static IS_NULL_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?P<head>[a-z_][a-z0-9_]*|\))\s*\?").expect("Invalid is-null regex")
});

static SYSDATE_MINUS_DATE_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(&format!(r"\bsysdate\s*-\s*(?P<v>{DATE_VARIABLE})\b"))
        .expect("Invalid sysdate-minus-date regex")
});

static SYSDATE_ADD_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\bsysdate\s*(?P<op>[+-])\s*(?P<n>\d+(?:\.\d+)?)")
        .expect("Invalid sysdate-add regex")
});

static DATE_MINUS_DATE_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(&format!(
        r"\b(?P<a>{DATE_VARIABLE})\s*-\s*(?P<b>{DATE_VARIABLE})\b"
    ))
    .expect("Invalid date-minus-date regex")
});

static DATE_ADD_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(&format!(
        r"\b(?P<a>{DATE_VARIABLE})\s*(?P<op>[+-])\s*(?P<n>\d+(?:\.\d+)?)"
    ))
    .expect("Invalid date-add regex")
});

static SYSDATE_REGEX: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\bsysdate\b").expect("Invalid sysdate regex"));

static NVL_REGEX: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\bnvl\s*\(").expect("Invalid nvl regex"));

static CEIL_REGEX: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\bceil\s*\(").expect("Invalid ceil regex"));

/// Translates Picorules expressions to dialect SQL.
pub(crate) struct ExpressionTranslator<'a> {
    strategy: &'a dyn DialectStrategy,
    static_sysdate: Option<&'a str>,
}

impl<'a> ExpressionTranslator<'a> {
    pub fn new(strategy: &'a dyn DialectStrategy, static_sysdate: Option<&'a str>) -> Self {
        Self {
            strategy,
            static_sysdate,
        }
    }

    /// Textual rendering of `sysdate`, honouring the `staticSysdate`
    /// override.
    pub fn sysdate_text(&self) -> String {
        match self.static_sysdate {
            Some(text) => text.to_string(),
            None => self.strategy.current_date(),
        }
    }

    /// Run the full rewrite pipeline on one expression.
    pub fn translate(&self, expr: &str) -> String {
        let trimmed = expr.trim();
        // The lone dot is the always-true guard.
        if trimmed == "." {
            return "1=1".to_string();
        }

        let s = rewrite_backtick_literals(trimmed);
        let s = map_outside_quotes(&s, |seg| self.rewrite_null_tests(seg));
        let s = map_outside_quotes(&s, |seg| self.rewrite_sysdate_arithmetic(seg));
        let s = map_outside_quotes(&s, |seg| self.rewrite_date_variable_arithmetic(seg));
        // After date arithmetic: the bound constants are themselves
        // date-shaped names, so `x_dt - lower__bound__dt` must become a
        // day difference before the constant is substituted.
        let s = map_outside_quotes(&s, |seg| self.rewrite_bound_constants(seg));
        let s = self.rewrite_function_calls(&s);
        let s = map_outside_quotes(&s, |seg| {
            SYSDATE_REGEX
                .replace_all(seg, self.sysdate_text().as_str())
                .into_owned()
        });
        if self.strategy.concat_operator_is_plus() {
            map_outside_quotes(&s, |seg| seg.replace("||", "+"))
        } else {
            s
        }
    }

    fn rewrite_null_tests(&self, s: &str) -> String {
        let s = NOT_NULL_REGEX.replace_all(s, "$head IS NOT NULL");
        IS_NULL_REGEX.replace_all(&s, "$head IS NULL").into_owned()
    }

    fn rewrite_bound_constants(&self, s: &str) -> String {
        let s = s.replace(
            "lower__bound__dt",
            &self.strategy.date_literal("0001-01-01"),
        );
        s.replace(
            "upper__bound__dt",
            &self.strategy.date_literal("9999-12-31"),
        )
    }

    fn rewrite_sysdate_arithmetic(&self, s: &str) -> String {
        let s = SYSDATE_MINUS_DATE_REGEX.replace_all(s, |caps: &regex::Captures<'_>| {
            self.strategy.date_diff_days(&self.sysdate_text(), &caps["v"])
        });
        SYSDATE_ADD_REGEX
            .replace_all(&s, |caps: &regex::Captures<'_>| {
                let op = caps["op"].chars().next().expect("op is one char");
                self.strategy
                    .date_add_days(&self.sysdate_text(), op, &caps["n"])
            })
            .into_owned()
    }

    fn rewrite_date_variable_arithmetic(&self, s: &str) -> String {
        let s = DATE_MINUS_DATE_REGEX.replace_all(s, |caps: &regex::Captures<'_>| {
            self.strategy.date_diff_days(&caps["a"], &caps["b"])
        });
        DATE_ADD_REGEX
            .replace_all(&s, |caps: &regex::Captures<'_>| {
                let op = caps["op"].chars().next().expect("op is one char");
                self.strategy.date_add_days(&caps["a"], op, &caps["n"])
            })
            .into_owned()
    }

    fn rewrite_function_calls(&self, s: &str) -> String {
        let strategy = self.strategy;

        let s = if let Some(name) = strategy.nvl_function() {
            NVL_REGEX.replace_all(s, format!("{name}(")).into_owned()
        } else {
            s.to_string()
        };
        let s = if let Some(name) = strategy.ceiling_function() {
            CEIL_REGEX.replace_all(&s, format!("{name}(")).into_owned()
        } else {
            s
        };

        let s = rewrite_calls(&s, "to_number", &|args| match args {
            [x] => Some(strategy.cast_numeric(x)),
            _ => None,
        });
        let s = rewrite_calls(&s, "to_char", &|args| match args {
            [x] => Some(strategy.cast_string(x)),
            [x, fmt] => Some(strategy.format_date_pattern(x, fmt)),
            _ => None,
        });
        let s = rewrite_calls(&s, "substr", &|args| match args {
            [s_arg, start, len] => Some(strategy.substr_full(s_arg, start, len)),
            [s_arg, start] => match start.strip_prefix('-') {
                Some(n) if n.chars().all(|c| c.is_ascii_digit()) => {
                    Some(strategy.substr_right(s_arg, n))
                }
                _ => Some(strategy.substr_from(s_arg, start)),
            },
            _ => None,
        });
        let s = rewrite_calls(&s, "least_date", &|args| {
            Some(strategy.extreme_ignore_nulls(Extreme::Least, args))
        });
        let s = rewrite_calls(&s, "greatest_date", &|args| {
            Some(strategy.extreme_ignore_nulls(Extreme::Greatest, args))
        });
        let s = rewrite_calls(&s, "least", &|args| {
            Some(strategy.extreme_strict(Extreme::Least, args))
        });
        rewrite_calls(&s, "greatest", &|args| {
            Some(strategy.extreme_strict(Extreme::Greatest, args))
        })
    }
}

/// Backtick-delimited literals become single-quoted SQL strings.
fn rewrite_backtick_literals(s: &str) -> String {
    BACKTICK_REGEX
        .replace_all(s, |caps: &regex::Captures<'_>| {
            format!("'{}'", sql_escape(&caps[1]))
        })
        .into_owned()
}

/// Apply `f` to the regions of `s` outside single-quoted literals.
/// Doubled quotes inside a literal are honoured.
fn map_outside_quotes(s: &str, f: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(open) = rest.find('\'') {
        out.push_str(&f(&rest[..open]));
        let bytes = rest.as_bytes();
        let mut end = open + 1;
        loop {
            match rest[end..].find('\'') {
                None => {
                    end = rest.len();
                    break;
                }
                Some(k) => {
                    let close = end + k;
                    if bytes.get(close + 1) == Some(&b'\'') {
                        end = close + 2;
                    } else {
                        end = close + 1;
                        break;
                    }
                }
            }
        }
        out.push_str(&rest[open..end]);
        rest = &rest[end..];
    }
    out.push_str(&f(rest));
    out
}

fn is_identifier_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Rewrite calls of `name(...)`, splitting arguments at the top level and
/// recursing into them first so nested calls of the same function are
/// handled. A callback returning `None` leaves the call unchanged.
fn rewrite_calls(s: &str, name: &str, f: &dyn Fn(&[String]) -> Option<String>) -> String {
    let mut out = String::with_capacity(s.len());
    let bytes = s.as_bytes();
    let mut i = 0;

    while let Some(pos) = s[i..].find(name) {
        let start = i + pos;
        let after_name = start + name.len();
        let boundary_before = start == 0 || !is_identifier_byte(bytes[start - 1]);
        let boundary_after = !bytes.get(after_name).copied().is_some_and(is_identifier_byte);

        let mut open = after_name;
        while bytes.get(open) == Some(&b' ') {
            open += 1;
        }

        if !boundary_before || !boundary_after || bytes.get(open) != Some(&b'(') {
            out.push_str(&s[i..after_name]);
            i = after_name;
            continue;
        }

        let Some(close) = find_matching_paren(s, open) else {
            out.push_str(&s[i..]);
            return out;
        };

        let args: Vec<String> = split_top_level(&s[open + 1..close], ',')
            .into_iter()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(|a| rewrite_calls(a, name, f))
            .collect();

        match f(&args) {
            Some(replacement) => {
                out.push_str(&s[i..start]);
                out.push_str(&replacement);
            }
            None => out.push_str(&s[i..=close]),
        }
        i = close + 1;
    }

    out.push_str(&s[i..]);
    out
}
