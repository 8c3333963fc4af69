//! The page model the engine rewrites.
//!
//! A [`Page`] owns a parsed HTML document and its URL. The host applies its
//! own changes through [`Mutation`]s; the engine inserts embeds through the
//! [`mutator`] functions. Both edit the underlying `ego_tree` in place.

pub mod mutator;
mod select;

pub use mutator::{CONTAINER_CLASS, FRAME_PERMISSIONS, HostLayout, Placement, insert_embed};
pub use select::{candidate_selector, domain_token};

use ego_tree::{NodeId, NodeRef, Tree};
use html5ever::tendril::StrTendril;
use html5ever::{Attribute, LocalName, Namespace, QualName};
use scraper::node::Element;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::error::{EmbedError, Result};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// A change made to the page by its host application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    /// Parse `html` and append it to the first element matching `parent`.
    Append { parent: String, html: String },
    /// Detach every element matching `target`.
    Remove { target: String },
}

impl Mutation {
    /// Whether applying this mutation can introduce new nodes.
    pub fn adds_nodes(&self) -> bool {
        matches!(self, Mutation::Append { .. })
    }
}

/// An HTML document together with the URL it was loaded from.
pub struct Page {
    document: Html,
    url: Option<Url>,
}

impl Page {
    /// Parse a document with no known URL. Relative links stay unresolved.
    pub fn new(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
            url: None,
        }
    }

    /// Parse a document loaded from `url`.
    pub fn at(url: &str, html: &str) -> Result<Self> {
        let url =
            Url::parse(url).map_err(|e| EmbedError::Config(format!("page URL {url}: {e}")))?;
        Ok(Self {
            document: Html::parse_document(html),
            url: Some(url),
        })
    }

    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    pub fn document(&self) -> &Html {
        &self.document
    }

    /// Serialize the current document.
    pub fn html(&self) -> String {
        self.document.html()
    }

    /// Resolve an `href` the way a browser's `anchor.href` does.
    pub fn resolve_href(&self, href: &str) -> String {
        match &self.url {
            Some(base) => base
                .join(href)
                .map(String::from)
                .unwrap_or_else(|_| href.to_string()),
            None => href.to_string(),
        }
    }

    /// Ids of all attached elements matching `selector`, in document order.
    ///
    /// Detached subtrees stay in the arena after a removal but are never
    /// returned.
    pub fn select_ids(&self, selector: &Selector) -> Vec<NodeId> {
        self.document
            .tree
            .root()
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|el| selector.matches(el))
            .map(|el| el.id())
            .collect()
    }

    /// Value of attribute `name` on element `id`.
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.document
            .tree
            .get(id)
            .and_then(ElementRef::wrap)
            .and_then(|el| el.value().attr(name))
    }

    /// Apply a host mutation. Returns `true` if nodes were added.
    pub fn apply(&mut self, mutation: &Mutation) -> Result<bool> {
        match mutation {
            Mutation::Append { parent, html } => {
                let selector = parse_selector(parent)?;
                let Some(parent) = self.select_ids(&selector).into_iter().next() else {
                    tracing::debug!("No element matches append target {parent}");
                    return Ok(false);
                };
                let fragment = Html::parse_fragment(html);
                let added = graft(
                    &mut self.document.tree,
                    parent,
                    *fragment.root_element(),
                    &|node| Some(node.clone()),
                );
                Ok(added > 0)
            }
            Mutation::Remove { target } => {
                let selector = parse_selector(target)?;
                for id in self.select_ids(&selector) {
                    if let Some(mut node) = self.document.tree.get_mut(id) {
                        node.detach();
                    }
                }
                Ok(false)
            }
        }
    }

    pub(crate) fn tree_mut(&mut self) -> &mut Tree<Node> {
        &mut self.document.tree
    }
}

pub(crate) fn parse_selector(source: &str) -> Result<Selector> {
    Selector::parse(source).map_err(|e| EmbedError::Selector(format!("{source}: {e}")))
}

fn attribute(name: &str, value: &str) -> Attribute {
    Attribute {
        name: QualName::new(None, Namespace::from(""), LocalName::from(name)),
        value: StrTendril::from(value),
    }
}

/// A detached HTML element node.
pub(crate) fn html_element(tag: &str, attrs: &[(&str, &str)]) -> Node {
    let name = QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from(tag));
    let attrs = attrs.iter().map(|(k, v)| attribute(k, v)).collect();
    Node::Element(Element::new(name, attrs))
}

/// Copy of `el` with attribute `name` set to `value`, keeping attribute order.
pub(crate) fn with_attr(el: &Element, name: &str, value: &str) -> Element {
    let mut replaced = false;
    let mut attrs: Vec<Attribute> = el
        .attrs()
        .map(|(k, v)| {
            if k == name {
                replaced = true;
                attribute(k, value)
            } else {
                attribute(k, v)
            }
        })
        .collect();
    if !replaced {
        attrs.push(attribute(name, value));
    }
    Element::new(el.name.clone(), attrs)
}

/// Set an attribute on element `id`. Returns `false` if `id` is not an element.
pub(crate) fn set_attr(tree: &mut Tree<Node>, id: NodeId, name: &str, value: &str) -> bool {
    let Some(mut node) = tree.get_mut(id) else {
        return false;
    };
    let Node::Element(el) = node.value() else {
        return false;
    };
    let updated = with_attr(el, name, value);
    *el = updated;
    true
}

/// Append a declaration to the inline style of element `id`.
pub(crate) fn append_style(tree: &mut Tree<Node>, id: NodeId, declaration: &str) -> bool {
    let existing = tree
        .get(id)
        .and_then(ElementRef::wrap)
        .and_then(|el| el.value().attr("style"))
        .unwrap_or_default()
        .trim()
        .trim_end_matches(';')
        .to_string();
    let style = if existing.is_empty() {
        format!("{declaration};")
    } else {
        format!("{existing}; {declaration};")
    };
    set_attr(tree, id, "style", &style)
}

/// Nearest element, starting at `id` itself, that matches `selector`.
pub(crate) fn closest(document: &Html, id: NodeId, selector: &Selector) -> Option<NodeId> {
    let node = document.tree.get(id)?;
    std::iter::once(node)
        .chain(node.ancestors())
        .filter_map(ElementRef::wrap)
        .find(|el| selector.matches(el))
        .map(|el| el.id())
}

/// Deep-copy the children of `source` (from any tree) under `parent`.
///
/// `adapt` sees every node before it is copied and may rewrite it or return
/// `None` to drop the node with its subtree. Returns the number of nodes copied.
pub(crate) fn graft<F>(
    tree: &mut Tree<Node>,
    parent: NodeId,
    source: NodeRef<'_, Node>,
    adapt: &F,
) -> usize
where
    F: Fn(&Node) -> Option<Node>,
{
    let mut copied = 0;
    for child in source.children() {
        let Some(value) = adapt(child.value()) else {
            continue;
        };
        let Some(mut target) = tree.get_mut(parent) else {
            break;
        };
        let id = target.append(value).id();
        copied += 1 + graft(tree, id, child, adapt);
    }
    copied
}
