//! Turns persisted rules into matchable ones.

use regex::{Regex, RegexBuilder};

use crate::settings::Rule;

/// Upper bound on the compiled program of a single user pattern.
const PATTERN_SIZE_LIMIT: usize = 1 << 20;

/// An enabled rule together with its validated pattern.
#[derive(Clone, Debug)]
pub struct CompiledRule {
    rule: Rule,
    regex: Regex,
}

impl CompiledRule {
    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn name(&self) -> &str {
        &self.rule.name
    }

    /// The pattern source as the user wrote it.
    pub fn pattern(&self) -> &str {
        &self.rule.pattern
    }

    pub fn template(&self) -> &str {
        &self.rule.embed_template
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}

/// Compile a single pattern with the limits applied to every rule.
///
/// Matching runs in time linear in the URL length, so a hostile pattern or
/// URL cannot stall a scan through backtracking.
pub fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .size_limit(PATTERN_SIZE_LIMIT)
        .build()
}

/// Compile every enabled rule, preserving list order.
///
/// A rule whose pattern fails to compile is logged and skipped; it never
/// affects the other rules.
pub fn compile_rules(rules: &[Rule]) -> Vec<CompiledRule> {
    let compiled: Vec<CompiledRule> = rules
        .iter()
        .filter(|rule| rule.enabled)
        .filter_map(|rule| match compile_pattern(&rule.pattern) {
            Ok(regex) => Some(CompiledRule {
                rule: rule.clone(),
                regex,
            }),
            Err(e) => {
                tracing::warn!("Invalid regex in rule \"{}\": {e}", rule.name);
                None
            }
        })
        .collect();

    tracing::info!("Compiled {} active rules", compiled.len());
    compiled
}
