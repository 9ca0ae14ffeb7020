//! Statement-level parser.
//!
//! One ruleblock's text becomes an ordered list of typed rules. The text is
//! preprocessed (template substitution, comment removal, whitespace
//! normalisation), split on `;`, and each segment is classified by shape:
//!
//! - bind: contains `=>`, no `:`, contains `.bind()`
//! - fetch: contains `=>`, no `:`
//! - compute: contains `:`
//! - anything else is silently dropped; `#` directives are surfaced as
//!   warnings and otherwise ignored
//!
//! The silent drop is policy, not an accident: stray commentary must never
//! break a compile.

use std::sync::LazyLock;

use picorules_core::{
    ComputeBranch, ComputeRule, Diagnostic, FetchRule, ParsedRuleblock, Rule, RuleblockInput,
};

use crate::error::{CompileError, Result};
use crate::scan::{find_matching_paren, split_args};

/// Template token replaced by the ruleblock's own name before parsing.
const RB_ID_TOKEN: &str = "[[rb_id]]";

static BLOCK_COMMENT_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?s)/\*.*?\*/").expect("Invalid block comment regex")
});

static LINE_COMMENT_REGEX: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"//[^\r\n]*").expect("Invalid line comment regex"));

static WHITESPACE_REGEX: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\s+").expect("Invalid whitespace regex"));

/// Head of a fetch statement, up to and including the opening paren of the
/// function call. Parameters and the `.where(...)` tail are scanned with
/// the balanced-paren helpers so nested calls survive.
///
/// The attribute class is `[\w%]` (plus `[...]` lists); attributes
/// containing dots do not parse.
static FETCH_HEAD_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"^(?P<var>[a-z_][a-z0-9_]*)\s*=>\s*(?P<table>[a-z_][a-z0-9_]*)\.(?P<attr>\[[^\]]*\]|[\w%]+)\.(?P<prop>[a-z_][a-z0-9_]*)\.(?P<func>[a-z_][a-z0-9_]*)\(",
    )
    .expect("Invalid fetch head regex")
});

/// The fixed bind shape. The `rout_` prefix is obligatory in the surface
/// syntax; the stored source ruleblock name is the part after it.
static BIND_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"^(?P<var>[a-z_][a-z0-9_]*)\s*=>\s*rout_(?P<block>[a-z_][a-z0-9_]*)\.(?P<svar>[a-z_][a-z0-9_]*)\.(?P<prop>[a-z_][a-z0-9_]*)\.bind\(\)$",
    )
    .expect("Invalid bind regex")
});

/// A compute arm: `{ predicate => value }`. Braces do not nest.
static ARM_REGEX: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\{([^{}]*)\}").expect("Invalid compute arm regex"));

static VARIABLE_REGEX: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^[a-z_][a-z0-9_]*$").expect("Invalid variable regex"));

/// Result of parsing one ruleblock: the rules plus any directive warnings.
#[derive(Debug)]
pub(crate) struct ParseOutcome {
    pub ruleblock: ParsedRuleblock,
    pub warnings: Vec<Diagnostic>,
}

/// Parse one ruleblock's text into its ordered rule list.
pub(crate) fn parse_ruleblock(input: &RuleblockInput) -> Result<ParseOutcome> {
    let text = preprocess(&input.name, &input.text);
    let mut rules = Vec::new();
    let mut warnings = Vec::new();

    for segment in text.split(';') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        if segment.starts_with('#') {
            warnings.push(Diagnostic::for_ruleblock(
                format!("Ignored compiler directive: {segment}"),
                &input.name,
            ));
            continue;
        }

        if segment.contains("=>") && !segment.contains(':') {
            if segment.contains(".bind()") {
                rules.push(Rule::Bind(parse_bind(&input.name, segment)?));
            } else {
                rules.push(Rule::Fetch(parse_fetch(&input.name, segment)?));
            }
        } else if segment.contains(':') {
            rules.push(Rule::Compute(parse_compute(&input.name, segment)?));
        }
        // Neither shape: silently dropped by design.
    }

    Ok(ParseOutcome {
        ruleblock: ParsedRuleblock {
            name: input.name.clone(),
            is_active: input.is_active,
            rules,
        },
        warnings,
    })
}

/// Normalise rule text before statement splitting, in order: `[[rb_id]]`
/// substitution, comment removal, bracket-interior whitespace collapse (so
/// multi-line attribute lists survive), whole-text whitespace collapse (so
/// `.where(...)` continuations attach to their statement).
fn preprocess(name: &str, text: &str) -> String {
    let text = text.replace(RB_ID_TOKEN, name);
    let text = BLOCK_COMMENT_REGEX.replace_all(&text, " ");
    let text = LINE_COMMENT_REGEX.replace_all(&text, " ");
    let text = collapse_bracket_whitespace(&text);
    let text = WHITESPACE_REGEX.replace_all(&text, " ");
    text.trim().to_string()
}

fn collapse_bracket_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0u32;
    for c in text.chars() {
        match c {
            '[' => {
                depth += 1;
                out.push(c);
            }
            ']' => {
                depth = depth.saturating_sub(1);
                out.push(c);
            }
            c if depth > 0 && c.is_whitespace() => {}
            c => out.push(c),
        }
    }
    out
}

fn parse_fetch(ruleblock: &str, segment: &str) -> Result<FetchRule> {
    let invalid = || CompileError::InvalidFetch {
        ruleblock: ruleblock.to_string(),
        segment: segment.to_string(),
    };

    let caps = FETCH_HEAD_REGEX.captures(segment).ok_or_else(invalid)?;
    let head = caps.get(0).expect("regex match has group 0");
    let open = head.end() - 1;
    let close = find_matching_paren(segment, open).ok_or_else(invalid)?;
    let params = split_args(&segment[open + 1..close]);

    let mut predicate = None;
    let tail = segment[close + 1..].trim();
    if !tail.is_empty() {
        let rest = tail.strip_prefix(".where").ok_or_else(invalid)?.trim_start();
        if !rest.starts_with('(') {
            return Err(invalid());
        }
        let wclose = find_matching_paren(rest, 0).ok_or_else(invalid)?;
        if !rest[wclose + 1..].trim().is_empty() {
            return Err(invalid());
        }
        let pred = rest[1..wclose].trim();
        if !pred.is_empty() {
            predicate = Some(pred.to_string());
        }
    }

    let attr_spec = caps.name("attr").expect("attr group").as_str();
    let attributes = parse_attribute_spec(attr_spec);
    if attributes.is_empty() {
        return Err(invalid());
    }

    Ok(FetchRule {
        variable: caps["var"].to_string(),
        table: caps["table"].to_string(),
        attributes,
        property: caps["prop"].to_string(),
        function: caps["func"].to_string(),
        params,
        predicate,
        references: Default::default(),
    })
}

/// An attribute spec is a bare token (possibly containing `%`) or a
/// bracketed comma-separated list. Whitespace inside brackets was removed
/// during preprocessing.
fn parse_attribute_spec(spec: &str) -> Vec<String> {
    if let Some(inner) = spec.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        inner
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        vec![spec.to_string()]
    }
}

fn parse_compute(ruleblock: &str, segment: &str) -> Result<ComputeRule> {
    let (head, rest) = segment.split_once(':').ok_or_else(|| CompileError::InvalidCompute {
        ruleblock: ruleblock.to_string(),
        segment: segment.to_string(),
    })?;

    let variable = head.trim();
    if !VARIABLE_REGEX.is_match(variable) {
        return Err(CompileError::InvalidCompute {
            ruleblock: ruleblock.to_string(),
            segment: segment.to_string(),
        });
    }

    let mut branches = Vec::new();
    for caps in ARM_REGEX.captures_iter(rest) {
        let arm = caps.get(1).expect("arm group").as_str();
        if let Some((pred, value)) = arm.split_once("=>") {
            let pred = pred.trim();
            branches.push(ComputeBranch {
                predicate: (!pred.is_empty()).then(|| pred.to_string()),
                value: value.trim().to_string(),
            });
        }
    }

    if branches.is_empty() {
        return Err(CompileError::EmptyCompute {
            ruleblock: ruleblock.to_string(),
            segment: segment.to_string(),
        });
    }

    Ok(ComputeRule {
        variable: variable.to_string(),
        branches,
        references: Default::default(),
    })
}

fn parse_bind(ruleblock: &str, segment: &str) -> Result<picorules_core::BindRule> {
    let caps = BIND_REGEX
        .captures(segment)
        .ok_or_else(|| CompileError::InvalidBind {
            ruleblock: ruleblock.to_string(),
            segment: segment.to_string(),
        })?;

    Ok(picorules_core::BindRule {
        variable: caps["var"].to_string(),
        source_ruleblock: caps["block"].to_string(),
        source_variable: caps["svar"].to_string(),
        property: caps["prop"].to_string(),
        references: Default::default(),
    })
}
