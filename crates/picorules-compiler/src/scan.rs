//! Balanced-delimiter scanning helpers shared by the parser and the
//! expression translator.
//!
//! Rule text is loose enough that a full tokenizer is not warranted; what
//! the pipeline needs is (a) finding the close paren that matches an open
//! paren and (b) splitting argument lists on commas at bracket depth zero,
//! so nested calls like `round(val,0)~dt` survive as one token.

/// Find the index of the `)` matching the `(` at `open`, tracking nested
/// parentheses. Returns `None` when the parenthesis never closes.
pub(crate) fn find_matching_paren(s: &str, open: usize) -> Option<usize> {
    let bytes = s.as_bytes();
    debug_assert_eq!(bytes.get(open), Some(&b'('));
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on `sep` at parenthesis/bracket depth zero. Empty parts are kept;
/// callers trim and filter as appropriate.
pub(crate) fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            c if c == sep && depth == 0 => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Split an argument list into trimmed, non-empty tokens.
pub(crate) fn split_args(s: &str) -> Vec<String> {
    split_top_level(s, ',')
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_matching_paren_simple() {
        let s = "f(a,b)";
        assert_eq!(find_matching_paren(s, 1), Some(5));
    }

    #[test]
    fn test_find_matching_paren_nested() {
        let s = "serializedv2(round(val,0)~dt).where(x)";
        assert_eq!(find_matching_paren(s, 12), Some(28));
    }

    #[test]
    fn test_find_matching_paren_unclosed() {
        assert_eq!(find_matching_paren("f(a", 1), None);
    }

    #[test]
    fn test_split_top_level_respects_parens() {
        let parts = split_top_level("round(val,0)~dt,x", ',');
        assert_eq!(parts, vec!["round(val,0)~dt", "x"]);
    }

    #[test]
    fn test_split_top_level_respects_brackets() {
        let parts = split_top_level("[a,b],c", ',');
        assert_eq!(parts, vec!["[a,b]", "c"]);
    }

    #[test]
    fn test_split_args_trims_and_drops_empty() {
        assert_eq!(split_args(" a , round(b,1) "), vec!["a", "round(b,1)"]);
        assert!(split_args("").is_empty());
        assert!(split_args("   ").is_empty());
    }

    #[test]
    fn test_split_top_level_tilde() {
        let parts = split_top_level("round(val,0)~dt", '~');
        assert_eq!(parts, vec!["round(val,0)", "dt"]);
    }
}
