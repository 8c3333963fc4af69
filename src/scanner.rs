//! One synchronous scan-and-embed pass over a page.

use ego_tree::NodeId;

use crate::dom::{HostLayout, Page, Placement, insert_embed, set_attr};
use crate::rules::{EmbedDelivery, RuleSet, match_url};

/// Marker attribute set on every anchor the engine has handled.
pub const PROCESSED_MARKER: &str = "data-tana-tweaks-processed";

/// An embed inserted during a scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmbedRecord {
    pub rule_name: String,
    pub url: String,
    pub placement: Placement,
}

/// Outcome of a single scan.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Unprocessed anchors selected as candidates.
    pub candidates: usize,
    pub embeds: Vec<EmbedRecord>,
}

/// Owns the active rule set and applies it to pages.
///
/// The rule set is only ever replaced as a whole, between scans, so every
/// scan sees one consistent snapshot of the rules.
pub struct Scanner {
    rules: RuleSet,
    delivery: EmbedDelivery,
    layout: HostLayout,
    marker: String,
}

impl Scanner {
    pub fn new(
        rules: RuleSet,
        delivery: EmbedDelivery,
        layout: HostLayout,
        marker: impl Into<String>,
    ) -> Self {
        Self {
            rules,
            delivery,
            layout,
            marker: marker.into(),
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Swap in a freshly compiled rule set. Already processed anchors stay
    /// processed and their embeds stay in place.
    pub fn replace_rules(&mut self, rules: RuleSet) {
        self.rules = rules;
    }

    /// Mark and evaluate every unprocessed candidate anchor on `page`.
    pub fn scan(&self, page: &mut Page) -> ScanReport {
        let Some(selector) = self.rules.candidates() else {
            tracing::debug!("No active rules, skipping scan");
            return ScanReport::default();
        };

        let anchors = page.select_ids(selector);
        tracing::debug!("Scanning {} unprocessed links", anchors.len());

        let mut report = ScanReport {
            candidates: anchors.len(),
            embeds: Vec::new(),
        };
        for anchor in anchors {
            if let Some(record) = self.process(page, anchor) {
                report.embeds.push(record);
            }
        }
        report
    }

    fn process(&self, page: &mut Page, anchor: NodeId) -> Option<EmbedRecord> {
        if page.attr(anchor, &self.marker).is_some() {
            return None;
        }
        let href = page.attr(anchor, "href")?.to_string();
        set_attr(page.tree_mut(), anchor, &self.marker, "true");

        let url = page.resolve_href(&href);
        let matched = match_url(&url, self.rules.rules())?;
        let rule_name = matched.rule_name.clone();
        let Some(embed) = matched.into_embed(self.delivery) else {
            tracing::debug!("Rule \"{rule_name}\" produced no embed URL for {url}");
            return None;
        };

        let placement = insert_embed(page, anchor, &embed, &self.layout)?;
        tracing::info!("Embedded via \"{rule_name}\": {url}");
        Some(EmbedRecord {
            rule_name,
            url,
            placement,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::CONTAINER_CLASS;
    use crate::settings::Rule;

    const LOOM_TEMPLATE: &str = r#"<iframe src="https://www.loom.com/embed/{{match1}}"></iframe>"#;

    fn rule(name: &str, pattern: &str, template: &str) -> Rule {
        Rule {
            id: name.into(),
            name: name.into(),
            enabled: true,
            pattern: pattern.into(),
            embed_template: template.into(),
            is_preset: false,
        }
    }

    fn scanner(rules: &[Rule], delivery: EmbedDelivery) -> Scanner {
        Scanner::new(
            RuleSet::compile(rules, PROCESSED_MARKER).unwrap(),
            delivery,
            HostLayout::default(),
            PROCESSED_MARKER,
        )
    }

    fn loom() -> Rule {
        rule("Loom", r"loom\.com/share/([a-zA-Z0-9]+)", LOOM_TEMPLATE)
    }

    const PAGE: &str = r#"<div class="contentWrapper"><span data-editable-wrapper="true"><a href="https://www.loom.com/share/abc123XYZ">demo</a></span></div><p><a href="https://example.com/other">other</a></p>"#;

    #[test]
    fn embeds_matching_link() {
        let mut page = Page::at("https://app.tana.inc/ws", PAGE).unwrap();
        let report = scanner(&[loom()], EmbedDelivery::Fragment).scan(&mut page);

        assert_eq!(report.candidates, 1);
        assert_eq!(report.embeds.len(), 1);
        assert_eq!(report.embeds[0].rule_name, "Loom");
        assert_eq!(report.embeds[0].placement, Placement::AfterWrapper);
        assert!(page.html().contains("https://www.loom.com/embed/abc123XYZ"));
    }

    #[test]
    fn second_scan_changes_nothing() {
        let mut page = Page::at("https://app.tana.inc/ws", PAGE).unwrap();
        let scanner = scanner(&[loom()], EmbedDelivery::Fragment);

        scanner.scan(&mut page);
        let after_first = page.html();
        let report = scanner.scan(&mut page);

        assert_eq!(report, ScanReport::default());
        assert_eq!(page.html(), after_first);
    }

    #[test]
    fn unmatched_candidates_are_marked() {
        let mut page = Page::new(r#"<a id="x" href="https://example.com/page">x</a>"#);
        let any_video = rule("Any", r"video(\d+)", "{{match}}");
        let scanner = scanner(&[any_video], EmbedDelivery::Fragment);

        let report = scanner.scan(&mut page);
        assert_eq!(report.candidates, 1);
        assert!(report.embeds.is_empty());

        let anchor = page.select_ids(&scraper::Selector::parse("#x").unwrap())[0];
        assert_eq!(page.attr(anchor, PROCESSED_MARKER), Some("true"));
        assert_eq!(scanner.scan(&mut page).candidates, 0);
    }

    #[test]
    fn direct_url_without_src_marks_but_does_not_embed() {
        let mut page = Page::new(r#"<a href="https://www.loom.com/share/abc">x</a>"#);
        let bare = rule(
            "Bare",
            r"loom\.com/share/(\w+)",
            "https://www.loom.com/embed/{{match1}}",
        );
        let scanner = scanner(&[bare], EmbedDelivery::DirectUrl);

        let report = scanner.scan(&mut page);
        assert_eq!(report.candidates, 1);
        assert!(report.embeds.is_empty());
        assert!(!page.html().contains(CONTAINER_CLASS));
        assert!(page.html().contains(PROCESSED_MARKER));
    }

    #[test]
    fn direct_url_mode_builds_frame_from_src() {
        let mut page = Page::at(
            "https://app.tana.inc/ws",
            r#"<p><a href="https://kinescope.io/abc_1">k</a></p>"#,
        )
        .unwrap();
        let scanner = scanner(
            &[rule(
                "Kinescope",
                r"kinescope\.io/(?:embed/)?([a-zA-Z0-9_-]+)",
                r#"<iframe src="https://kinescope.io/embed/{{match1}}" allowfullscreen></iframe>"#,
            )],
            EmbedDelivery::DirectUrl,
        );

        let report = scanner.scan(&mut page);
        assert_eq!(report.embeds.len(), 1);
        assert_eq!(report.embeds[0].placement, Placement::AfterAnchor);
        assert!(page.html().contains(r#"src="https://kinescope.io/embed/abc_1""#));
    }

    #[test]
    fn links_match_against_resolved_url() {
        let mut page = Page::at(
            "https://notes.example/page",
            r#"<p><a href="//www.loom.com/share/rel42">rel</a></p>"#,
        )
        .unwrap();
        let scanner = scanner(
            &[rule("Loom", r"^https://www\.loom\.com/share/(\w+)", LOOM_TEMPLATE)],
            EmbedDelivery::Fragment,
        );

        let report = scanner.scan(&mut page);
        assert_eq!(report.embeds.len(), 1);
        assert_eq!(report.embeds[0].url, "https://www.loom.com/share/rel42");
        assert_eq!(report.embeds[0].placement, Placement::AfterAnchor);
    }

    #[test]
    fn tokenless_rule_skips_relative_links() {
        let mut page = Page::at(
            "https://www.loom.com/home",
            r#"<p><a href="/share/rel42">rel</a></p>"#,
        )
        .unwrap();
        let tokenless = rule("Loom", r"/share/(\w+)", LOOM_TEMPLATE);
        let scanner = scanner(&[tokenless], EmbedDelivery::Fragment);

        assert_eq!(scanner.scan(&mut page).candidates, 0);
    }

    #[test]
    fn replacing_rules_keeps_processed_links() {
        let mut page = Page::at("https://app.tana.inc/ws", PAGE).unwrap();
        let mut scanner = scanner(&[loom()], EmbedDelivery::Fragment);
        scanner.scan(&mut page);
        let embedded = page.html();

        let mut disabled = loom();
        disabled.enabled = false;
        scanner.replace_rules(RuleSet::compile(&[disabled], PROCESSED_MARKER).unwrap());
        let report = scanner.scan(&mut page);

        assert!(report.embeds.is_empty());
        assert_eq!(page.html(), embedded);
    }

    #[test]
    fn removed_links_are_not_scanned() {
        let mut page = Page::at(
            "https://app.tana.inc/ws",
            concat!(
                r#"<div id="root"><div id="gone">"#,
                r#"<p><a href="https://www.loom.com/share/abc">x</a></p>"#,
                "</div></div>",
            ),
        )
        .unwrap();
        page.apply(&crate::dom::Mutation::Remove {
            target: "#gone".into(),
        })
        .unwrap();

        let report = scanner(&[loom()], EmbedDelivery::Fragment).scan(&mut page);
        assert_eq!(report, ScanReport::default());
        assert!(!page.html().contains(CONTAINER_CLASS));
    }

    #[test]
    fn first_listed_rule_wins() {
        let mut page = Page::new(r#"<p><a href="https://www.loom.com/share/abc">x</a></p>"#);
        let scanner = scanner(
            &[
                rule("Generic", r"loom\.com", r#"<iframe src="https://generic.test"></iframe>"#),
                loom(),
            ],
            EmbedDelivery::Fragment,
        );

        let report = scanner.scan(&mut page);
        assert_eq!(report.embeds[0].rule_name, "Generic");
        assert!(page.html().contains("https://generic.test"));
        assert!(!page.html().contains("https://www.loom.com/embed/abc"));
    }
}
