//! Builds embed containers and places them next to the link they replace.
//!
//! The original link is never removed or rewritten: it, or the editable
//! region holding it, is hidden with an inline `display: none` so the host
//! application keeps seeing the node it created.

use ego_tree::NodeId;
use scraper::{Html, Node, Selector};

use crate::dom::{Page, append_style, closest, graft, html_element, parse_selector, with_attr};
use crate::error::Result;
use crate::rules::Embed;

/// Class carried by every inserted container.
pub const CONTAINER_CLASS: &str = "tana-tweaks-embed";

/// Permissions granted to frames built in direct-URL mode.
pub const FRAME_PERMISSIONS: &str = "accelerometer; autoplay; clipboard-write; encrypted-media; gyroscope; picture-in-picture; screen-wake-lock; web-share";

/// 16:9 box via the padding-bottom technique.
const CONTAINER_STYLE: &str = "position: relative; width: 100%; padding-bottom: 56.25%; height: 0; margin: 10px 0; border-radius: 8px; overflow: hidden; background: #1a1a1a;";

const FRAME_STYLE: &str =
    "position: absolute; top: 0; left: 0; width: 100%; height: 100%; border: none;";

const HIDDEN: &str = "display: none";

/// Where the host page expects embeds to go.
#[derive(Clone, Debug)]
pub struct HostLayout {
    wrapper: Selector,
    editable: Selector,
    published_marker: String,
}

impl HostLayout {
    /// Layout with custom wrapper and editable-region selectors.
    pub fn new(wrapper: &str, editable: &str) -> Result<Self> {
        Ok(Self {
            wrapper: parse_selector(wrapper)?,
            editable: parse_selector(editable)?,
            published_marker: "tana.pub".to_string(),
        })
    }

    /// Host name fragment identifying published pages, which have no
    /// wrapper convention and always use the fallback insertion.
    pub fn published_marker(mut self, marker: impl Into<String>) -> Self {
        self.published_marker = marker.into();
        self
    }

    fn is_published(&self, page: &Page) -> bool {
        page.url()
            .and_then(|url| url.host_str())
            .is_some_and(|host| host.contains(&self.published_marker))
    }
}

impl Default for HostLayout {
    fn default() -> Self {
        Self {
            wrapper: Selector::parse(".contentWrapper").expect("wrapper selector is valid"),
            editable: Selector::parse(r#"[data-editable-wrapper="true"]"#)
                .expect("editable selector is valid"),
            published_marker: "tana.pub".to_string(),
        }
    }
}

/// How an embed was placed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// After the content wrapper; the editable region (or the link) is hidden.
    AfterWrapper,
    /// Directly after the link, which is hidden.
    AfterAnchor,
}

/// Build the container for `embed` and insert it next to `anchor`.
///
/// Returns `None` if `anchor` has no parent to insert beside.
pub fn insert_embed(
    page: &mut Page,
    anchor: NodeId,
    embed: &Embed,
    layout: &HostLayout,
) -> Option<Placement> {
    let wrapper = if layout.is_published(page) {
        None
    } else {
        closest(page.document(), anchor, &layout.wrapper).filter(|id| has_parent(page, *id))
    };
    let editable = wrapper.and_then(|_| closest(page.document(), anchor, &layout.editable));

    if wrapper.is_none() && !has_parent(page, anchor) {
        return None;
    }

    let container = build_container(page, embed);
    let tree = page.tree_mut();

    match wrapper {
        Some(wrapper) => {
            tree.get_mut(wrapper)?.insert_id_after(container);
            append_style(tree, editable.unwrap_or(anchor), HIDDEN);
            Some(Placement::AfterWrapper)
        }
        None => {
            tree.get_mut(anchor)?.insert_id_after(container);
            append_style(tree, anchor, HIDDEN);
            Some(Placement::AfterAnchor)
        }
    }
}

fn has_parent(page: &Page, id: NodeId) -> bool {
    page.document()
        .tree
        .get(id)
        .is_some_and(|node| node.parent().is_some())
}

/// Create a detached container holding the embed content.
fn build_container(page: &mut Page, embed: &Embed) -> NodeId {
    let tree = page.tree_mut();
    let container = tree
        .orphan(html_element(
            "div",
            &[("class", CONTAINER_CLASS), ("style", CONTAINER_STYLE)],
        ))
        .id();

    match embed {
        Embed::Fragment(markup) => {
            let fragment = Html::parse_fragment(markup);
            graft(tree, container, *fragment.root_element(), &adapt_fragment_node);
        }
        Embed::Url(src) => {
            let frame = html_element(
                "iframe",
                &[
                    ("src", src),
                    ("style", FRAME_STYLE),
                    ("allowfullscreen", ""),
                    ("allow", FRAME_PERMISSIONS),
                    ("referrerpolicy", "no-referrer-when-downgrade"),
                ],
            );
            if let Some(mut node) = tree.get_mut(container) {
                node.append(frame);
            }
        }
    }
    container
}

/// Drop scripts and make every frame fill the container.
fn adapt_fragment_node(node: &Node) -> Option<Node> {
    match node {
        Node::Element(el) if el.name() == "script" => None,
        Node::Element(el) if el.name() == "iframe" => {
            Some(Node::Element(with_attr(el, "style", FRAME_STYLE)))
        }
        other => Some(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::ElementRef;

    const WORKSPACE: &str = r#"<div id="node"><div class="contentWrapper"><span data-editable-wrapper="true"><a id="link" href="https://www.loom.com/share/abc">loom</a></span></div><div id="next"></div></div>"#;

    fn find(page: &Page, selector: &str) -> NodeId {
        page.select_ids(&parse_selector(selector).unwrap())[0]
    }

    fn next_is_container(page: &Page, id: NodeId) -> bool {
        page.document()
            .tree
            .get(id)
            .and_then(|node| node.next_sibling())
            .and_then(ElementRef::wrap)
            .is_some_and(|el| el.value().attr("class") == Some(CONTAINER_CLASS))
    }

    fn frame(src: &str) -> Embed {
        Embed::Fragment(format!(r#"<iframe src="{src}" width="640"></iframe>"#))
    }

    #[test]
    fn workspace_embed_goes_after_wrapper_and_hides_editable() {
        let mut page = Page::at("https://app.tana.inc/ws", WORKSPACE).unwrap();
        let link = find(&page, "#link");

        let layout = HostLayout::default();
        let placement = insert_embed(&mut page, link, &frame("https://x.test/e"), &layout);
        assert_eq!(placement, Some(Placement::AfterWrapper));

        let wrapper = find(&page, ".contentWrapper");
        let editable = find(&page, "[data-editable-wrapper]");
        assert!(next_is_container(&page, wrapper));
        assert_eq!(page.attr(editable, "style"), Some("display: none;"));

        // the link itself is left untouched
        assert_eq!(page.attr(link, "style"), None);
        assert_eq!(page.attr(link, "href"), Some("https://www.loom.com/share/abc"));
        assert_eq!(page.select_ids(&parse_selector("#next").unwrap()).len(), 1);
    }

    #[test]
    fn missing_editable_region_hides_link() {
        let mut page = Page::at(
            "https://app.tana.inc/ws",
            r#"<div><div class="contentWrapper"><a id="link" href="https://x.test">x</a></div></div>"#,
        )
        .unwrap();
        let link = find(&page, "#link");

        let layout = HostLayout::default();
        insert_embed(&mut page, link, &frame("https://x.test/e"), &layout);
        assert!(next_is_container(&page, find(&page, ".contentWrapper")));
        assert_eq!(page.attr(link, "style"), Some("display: none;"));
    }

    #[test]
    fn missing_wrapper_falls_back_to_anchor() {
        let mut page = Page::at(
            "https://app.tana.inc/ws",
            r#"<p><a id="link" href="https://x.test">x</a> tail</p>"#,
        )
        .unwrap();
        let link = find(&page, "#link");

        let layout = HostLayout::default();
        let placement = insert_embed(&mut page, link, &frame("https://x.test/e"), &layout);
        assert_eq!(placement, Some(Placement::AfterAnchor));
        assert!(next_is_container(&page, link));
        assert_eq!(page.attr(link, "style"), Some("display: none;"));
        assert!(page.html().contains(" tail</p>"));
    }

    #[test]
    fn published_host_ignores_wrapper() {
        let mut page = Page::at("https://someone.tana.pub/page", WORKSPACE).unwrap();
        let link = find(&page, "#link");

        let layout = HostLayout::default();
        let placement = insert_embed(&mut page, link, &frame("https://x.test/e"), &layout);
        assert_eq!(placement, Some(Placement::AfterAnchor));
        assert!(next_is_container(&page, link));
        assert_eq!(page.attr(link, "style"), Some("display: none;"));
        let editable = find(&page, "[data-editable-wrapper]");
        assert_eq!(page.attr(editable, "style"), None);
    }

    #[test]
    fn existing_inline_style_is_kept_when_hiding() {
        let mut page =
            Page::new(r#"<p><a id="link" style="color: red" href="https://x.test">x</a></p>"#);
        let link = find(&page, "#link");

        let layout = HostLayout::default();
        insert_embed(&mut page, link, &frame("https://x.test/e"), &layout);
        assert_eq!(page.attr(link, "style"), Some("color: red; display: none;"));
    }

    #[test]
    fn fragment_frames_are_restyled_and_scripts_dropped() {
        let mut page = Page::new(r#"<p><a id="link" href="https://x.test">x</a></p>"#);
        let link = find(&page, "#link");
        let embed = Embed::Fragment(
            r#"<iframe src="https://x.test/e" style="width:640px"></iframe><script>alert(1)</script>"#.into(),
        );

        insert_embed(&mut page, link, &embed, &HostLayout::default());
        let frame = find(&page, ".tana-tweaks-embed > iframe");
        assert_eq!(page.attr(frame, "style"), Some(FRAME_STYLE));
        assert_eq!(page.attr(frame, "src"), Some("https://x.test/e"));
        let scripts = parse_selector(".tana-tweaks-embed script").unwrap();
        assert!(page.select_ids(&scripts).is_empty());
        assert!(!page.html().contains("alert(1)"));

        let container = find(&page, ".tana-tweaks-embed");
        assert_eq!(page.attr(container, "style"), Some(CONTAINER_STYLE));
    }

    #[test]
    fn fragment_children_are_not_wrapped() {
        let mut page = Page::new(r#"<p><a id="link" href="https://x.test">x</a></p>"#);
        let link = find(&page, "#link");

        let layout = HostLayout::default();
        insert_embed(&mut page, link, &frame("https://x.test/e"), &layout);
        let frames = parse_selector(".tana-tweaks-embed > iframe").unwrap();
        assert_eq!(page.select_ids(&frames).len(), 1);
    }

    #[test]
    fn direct_url_builds_single_frame() {
        let mut page = Page::new(r#"<p><a id="link" href="https://x.test">x</a></p>"#);
        let link = find(&page, "#link");

        insert_embed(
            &mut page,
            link,
            &Embed::Url("https://kinescope.io/embed/abc".into()),
            &HostLayout::default(),
        );
        let frames = page.select_ids(&parse_selector(".tana-tweaks-embed > iframe").unwrap());
        assert_eq!(frames.len(), 1);
        let frame = frames[0];
        assert_eq!(page.attr(frame, "src"), Some("https://kinescope.io/embed/abc"));
        assert_eq!(page.attr(frame, "style"), Some(FRAME_STYLE));
        assert_eq!(page.attr(frame, "allow"), Some(FRAME_PERMISSIONS));
        assert_eq!(page.attr(frame, "allowfullscreen"), Some(""));
        assert_eq!(
            page.attr(frame, "referrerpolicy"),
            Some("no-referrer-when-downgrade")
        );
    }

    #[test]
    fn custom_layout_selectors() {
        let layout = HostLayout::new(".block", ".editor").unwrap();
        let mut page = Page::new(
            r#"<main><div class="block"><div class="editor"><a id="link" href="https://x.test">x</a></div></div></main>"#,
        );
        let link = find(&page, "#link");

        assert_eq!(
            insert_embed(&mut page, link, &frame("https://x.test/e"), &layout),
            Some(Placement::AfterWrapper)
        );
        let editor = find(&page, ".editor");
        assert_eq!(page.attr(editor, "style"), Some("display: none;"));
    }

    #[test]
    fn invalid_layout_selector_is_rejected() {
        assert!(HostLayout::new("[[", ".ok").is_err());
    }
}
