//! Placeholder substitution for embed templates.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{match([1-9][0-9]*)?\}\}").expect("placeholder pattern is valid")
});

/// Substitute match placeholders in `template`.
///
/// `groups[0]` is the full match and `groups[n]` capture group `n`; a group
/// that did not participate is `None`. `{{match}}` becomes the full match and
/// `{{matchN}}` group `N`, both as empty text when absent. Placeholders for
/// groups the pattern does not have, and any other `{{...}}` token, are left
/// exactly as written.
///
/// ```
/// use tana_tweaks::rules::expand;
///
/// let out = expand("oid={{match1}}&id={{match2}}", &[Some("video5_7"), Some("5"), Some("7")]);
/// assert_eq!(out, "oid=5&id=7");
/// ```
pub fn expand(template: &str, groups: &[Option<&str>]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            let index = match caps.get(1) {
                None => 0,
                Some(digits) => match digits.as_str().parse::<usize>() {
                    Ok(index) => index,
                    Err(_) => return caps[0].to_string(),
                },
            };
            match groups.get(index) {
                Some(group) => group.unwrap_or_default().to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
