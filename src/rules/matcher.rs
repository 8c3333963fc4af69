//! First-match-wins lookup of a URL against the compiled rules.

use std::sync::LazyLock;

use regex::Regex;

use crate::rules::{CompiledRule, expand};

static SRC_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"src="([^"]+)""#).expect("src pattern is valid"));

/// How a host turns an expanded template into page content.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EmbedDelivery {
    /// The expansion is parsed as an HTML fragment and inserted.
    #[default]
    Fragment,
    /// Only the first `src="..."` of the expansion is used, loaded in a
    /// freshly built frame. For hosts whose content policy forbids
    /// fragment injection.
    DirectUrl,
}

/// Content ready for the DOM mutator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Embed {
    Fragment(String),
    Url(String),
}

/// The rule that matched a URL and its expanded template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchResult {
    pub rule_name: String,
    pub expanded: String,
}

impl MatchResult {
    /// Convert the expansion for the given delivery mode.
    ///
    /// Returns `None` in [`EmbedDelivery::DirectUrl`] mode when the expansion
    /// carries no `src` attribute.
    pub fn into_embed(self, delivery: EmbedDelivery) -> Option<Embed> {
        match delivery {
            EmbedDelivery::Fragment => Some(Embed::Fragment(self.expanded)),
            EmbedDelivery::DirectUrl => {
                extract_src(&self.expanded).map(|src| Embed::Url(src.to_string()))
            }
        }
    }
}

/// Find the first rule, in list order, whose pattern occurs anywhere in `url`.
pub fn match_url(url: &str, rules: &[CompiledRule]) -> Option<MatchResult> {
    rules.iter().find_map(|rule| {
        let caps = rule.regex().captures(url)?;
        let groups: Vec<Option<&str>> = caps.iter().map(|m| m.map(|m| m.as_str())).collect();
        Some(MatchResult {
            rule_name: rule.name().to_string(),
            expanded: expand(rule.template(), &groups),
        })
    })
}

/// First `src="..."` attribute value in an expanded template.
pub fn extract_src(html: &str) -> Option<&str> {
    SRC_ATTR
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
