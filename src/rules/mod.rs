//! Rule compilation, template expansion and URL matching.
//!
//! - [`compile_rules`] -- validates enabled rules into [`CompiledRule`]s.
//! - [`expand`] -- substitutes `{{match}}` / `{{matchN}}` placeholders.
//! - [`match_url`] -- first-match-wins lookup of a URL.
//!
//! [`RuleSet`] bundles a compiled rule list with the candidate selector
//! derived from it; the engine swaps whole sets, never individual rules.

mod compiler;
mod matcher;
mod template;

pub use compiler::{CompiledRule, compile_pattern, compile_rules};
pub use matcher::{Embed, EmbedDelivery, MatchResult, extract_src, match_url};
pub use template::expand;

use scraper::Selector;

use crate::dom::candidate_selector;
use crate::error::{EmbedError, Result};
use crate::settings::Rule;

/// Compiled rules plus the selector that narrows a scan to their links.
#[derive(Clone, Debug, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
    candidates: Option<Selector>,
}

impl RuleSet {
    /// Compile `rules` and build the candidate selector, excluding anchors
    /// that carry the `marker` attribute.
    pub fn compile(rules: &[Rule], marker: &str) -> Result<Self> {
        let rules = compile_rules(rules);
        let candidates = match candidate_selector(&rules, marker) {
            Some(source) => Some(
                Selector::parse(&source)
                    .map_err(|e| EmbedError::Selector(format!("{source}: {e}")))?,
            ),
            None => None,
        };
        Ok(Self { rules, candidates })
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// Selector for unprocessed candidate anchors, `None` when no rule is active.
    pub fn candidates(&self) -> Option<&Selector> {
        self.candidates.as_ref()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
