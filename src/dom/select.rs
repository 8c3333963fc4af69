//! Candidate selection: narrowing a scan to anchors a rule could match.
//!
//! Each rule contributes an `a[href*="<domain>"]` clause built from a literal
//! domain found in its pattern. A pattern without a usable literal widens the
//! whole selection to every `http` anchor, so narrowing never hides a link
//! the matcher would have accepted.

use std::sync::LazyLock;

use regex::Regex;

use crate::rules::CompiledRule;

static DOMAIN_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9-]+\.[a-zA-Z]{2,}").expect("domain pattern is valid")
});

const ALL_HTTP_LINKS: &str = r#"a[href^="http"]"#;

/// A literal domain every match of `pattern` must contain, if one can be
/// read off the pattern without interpreting it.
///
/// Only top-level literal text is considered: group contents, character
/// classes and quantified characters are skipped, and patterns with
/// alternation or inline flags yield nothing.
pub fn domain_token(pattern: &str) -> Option<String> {
    if pattern.contains('|') || has_loose_flags(pattern) {
        return None;
    }

    let mut runs: Vec<String> = Vec::new();
    let mut run = String::new();
    let mut depth = 0usize;
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped @ ('.' | '-' | '/')) if depth == 0 => run.push(escaped),
                _ => runs.push(std::mem::take(&mut run)),
            },
            '[' => {
                runs.push(std::mem::take(&mut run));
                while let Some(inner) = chars.next() {
                    match inner {
                        '\\' => {
                            chars.next();
                        }
                        ']' => break,
                        _ => {}
                    }
                }
            }
            '(' => {
                runs.push(std::mem::take(&mut run));
                depth += 1;
            }
            ')' => {
                depth = depth.saturating_sub(1);
            }
            '?' | '*' => {
                // the preceding character is optional
                run.pop();
                runs.push(std::mem::take(&mut run));
            }
            '{' => {
                run.pop();
                runs.push(std::mem::take(&mut run));
                for inner in chars.by_ref() {
                    if inner == '}' {
                        break;
                    }
                }
            }
            '+' | '.' | '^' | '$' => runs.push(std::mem::take(&mut run)),
            literal if depth == 0 => run.push(literal),
            _ => {}
        }
    }
    runs.push(run);

    runs.iter()
        .find_map(|run| DOMAIN_SHAPE.find(run))
        .map(|m| m.as_str().to_string())
}

/// Whether any inline flag group, such as `(?i)`, `(?mx)` or `(?s-i:...)`,
/// names the case-insensitive or verbose flag.
fn has_loose_flags(pattern: &str) -> bool {
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '[' => {
                while let Some(inner) = chars.next() {
                    match inner {
                        '\\' => {
                            chars.next();
                        }
                        ']' => break,
                        _ => {}
                    }
                }
            }
            '(' if chars.peek() == Some(&'?') => {
                chars.next();
                let mut flags = String::new();
                while let Some(&f) = chars.peek() {
                    if !"imsuURx-".contains(f) {
                        break;
                    }
                    flags.push(f);
                    chars.next();
                }
                let closes_group = matches!(chars.peek(), Some(')' | ':'));
                if closes_group && (flags.contains('i') || flags.contains('x')) {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

/// CSS selector source for unprocessed candidate anchors, or `None` when
/// there are no rules to match.
pub fn candidate_selector(rules: &[CompiledRule], marker: &str) -> Option<String> {
    if rules.is_empty() {
        return None;
    }

    let tokens: Option<Vec<String>> = rules.iter().map(|r| domain_token(r.pattern())).collect();
    let clauses: Vec<String> = match tokens {
        Some(tokens) => {
            let mut unique: Vec<String> = Vec::with_capacity(tokens.len());
            for token in tokens {
                if !unique.contains(&token) {
                    unique.push(token);
                }
            }
            unique
                .iter()
                .map(|token| format!(r#"a[href*="{token}"]"#))
                .collect()
        }
        None => vec![ALL_HTTP_LINKS.to_string()],
    };

    Some(
        clauses
            .iter()
            .map(|clause| format!("{clause}:not([{marker}])"))
            .collect::<Vec<_>>()
            .join(", "),
    )
}
