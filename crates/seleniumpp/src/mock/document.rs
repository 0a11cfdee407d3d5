//! In-memory page model.
//!
//! Pages are described with the [`MockPage`] / [`MockElement`] builders and
//! flattened into an arena ([`Dom`]) when a [`super::MockDriver`] is created.
//! Node ids are assigned in pre-order, so ascending ids are document order;
//! a node replaced by a mutation keeps its predecessor's order key.

use crate::locator::{Locator, LocatorStrategy};
use crate::result::{SeleniumError, SeleniumResult};
use crate::xpath::normalize_space;

use super::xpath;

// =============================================================================
// BUILDERS
// =============================================================================

/// One element of a mock page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockElement {
    tag: String,
    attrs: Vec<(String, String)>,
    text: String,
    children: Vec<MockElement>,
    frame: Option<MockPage>,
    displayed: bool,
    enabled: bool,
    attached: bool,
    value: String,
    selected: bool,
}

impl MockElement {
    /// A visible, enabled, attached element
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            attrs: Vec::new(),
            text: String::new(),
            children: Vec::new(),
            frame: None,
            displayed: true,
            enabled: true,
            attached: true,
            value: String::new(),
            selected: false,
        }
    }

    /// Set an attribute
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name, value)),
        }
        self
    }

    /// Set the element's own text (placed before its children)
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Append a child element
    #[must_use]
    pub fn child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Append an `<option value=..>text</option>` child
    #[must_use]
    pub fn option(self, value: impl Into<String>, text: impl Into<String>) -> Self {
        self.child(Self::new("option").attr("value", value).text(text))
    }

    /// Give this element (normally an `iframe`) its own document
    #[must_use]
    pub fn frame(mut self, page: MockPage) -> Self {
        self.frame = Some(page);
        self
    }

    /// Current field value
    #[must_use]
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    /// Mark an option as selected
    #[must_use]
    pub const fn selected(mut self) -> Self {
        self.selected = true;
        self
    }

    /// Not rendered
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    /// Rejects input
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Present in the model but not in the document until attached
    #[must_use]
    pub const fn detached(mut self) -> Self {
        self.attached = false;
        self
    }
}

/// A document: top-level elements in order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockPage {
    elements: Vec<MockElement>,
}

impl MockPage {
    /// Empty page
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a top-level element
    #[must_use]
    pub fn with(mut self, element: MockElement) -> Self {
        self.elements.push(element);
        self
    }
}

// =============================================================================
// ARENA
// =============================================================================

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<usize>,
    pub parent: Option<usize>,
    pub doc: usize,
    pub frame_doc: Option<usize>,
    pub displayed: bool,
    pub enabled: bool,
    pub attached: bool,
    pub value: String,
    pub selected: bool,
    pub order: usize,
    pub clicks: u32,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Dom {
    pub nodes: Vec<Node>,
    pub docs: Vec<Vec<usize>>,
}

impl Dom {
    pub fn build(page: MockPage) -> Self {
        let mut dom = Self::default();
        dom.insert_page(page);
        dom
    }

    fn insert_page(&mut self, page: MockPage) -> usize {
        let doc = self.docs.len();
        self.docs.push(Vec::new());
        for element in page.elements {
            let id = self.insert(element, None, doc);
            self.docs[doc].push(id);
        }
        doc
    }

    fn insert(&mut self, element: MockElement, parent: Option<usize>, doc: usize) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node {
            tag: element.tag,
            attrs: element.attrs,
            text: element.text,
            children: Vec::new(),
            parent,
            doc,
            frame_doc: None,
            displayed: element.displayed,
            enabled: element.enabled,
            attached: element.attached,
            value: element.value,
            selected: element.selected,
            order: id,
            clicks: 0,
        });
        for child in element.children {
            let child_id = self.insert(child, Some(id), doc);
            self.nodes[id].children.push(child_id);
        }
        if let Some(page) = element.frame {
            let frame_doc = self.insert_page(page);
            self.nodes[id].frame_doc = Some(frame_doc);
        }
        id
    }

    /// Whether the node and all its ancestors are attached
    pub fn is_connected(&self, id: usize) -> bool {
        let mut current = Some(id);
        while let Some(node) = current.and_then(|i| self.nodes.get(i)) {
            if !node.attached {
                return false;
            }
            current = node.parent;
        }
        current.is_none() && id < self.nodes.len()
    }

    /// Whether the node and all its ancestors are rendered
    pub fn is_displayed(&self, id: usize) -> bool {
        let mut current = Some(id);
        while let Some(i) = current {
            let node = &self.nodes[i];
            if !node.displayed {
                return false;
            }
            current = node.parent;
        }
        true
    }

    /// Attached top-level elements of `doc`
    pub fn roots(&self, doc: usize) -> impl Iterator<Item = usize> + '_ {
        self.docs
            .get(doc)
            .into_iter()
            .flatten()
            .copied()
            .filter(|&id| self.nodes[id].attached)
    }

    /// Attached children of `id`
    pub fn children(&self, id: usize) -> impl Iterator<Item = usize> + '_ {
        self.nodes[id]
            .children
            .iter()
            .copied()
            .filter(|&child| self.nodes[child].attached)
    }

    /// Attached elements of `doc` in document order
    pub fn elements(&self, doc: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self.roots(doc).collect();
        stack.reverse();
        while let Some(id) = stack.pop() {
            out.push(id);
            let mut children: Vec<usize> = self.children(id).collect();
            children.reverse();
            stack.extend(children);
        }
        out
    }

    pub fn attr(&self, id: usize, name: &str) -> Option<&str> {
        self.nodes[id]
            .attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Own text followed by the string values of attached children
    pub fn string_value(&self, id: usize) -> String {
        let mut out = self.nodes[id].text.clone();
        for child in self.children(id) {
            out.push_str(&self.string_value(child));
        }
        out
    }

    /// First node (attached or not) whose `id` attribute is `dom_id`
    pub fn by_dom_id(&self, dom_id: &str) -> Option<usize> {
        (0..self.nodes.len()).find(|&id| self.attr(id, "id") == Some(dom_id))
    }

    /// Detach `id` and put a deep copy in its place; returns the copy's id
    pub fn replace(&mut self, id: usize) -> usize {
        let copy = self.deep_copy(id, self.nodes[id].parent);
        match self.nodes[id].parent {
            Some(parent) => swap_id(&mut self.nodes[parent].children, id, copy),
            None => {
                let doc = self.nodes[id].doc;
                swap_id(&mut self.docs[doc], id, copy);
            }
        }
        self.nodes[id].attached = false;
        copy
    }

    fn deep_copy(&mut self, id: usize, parent: Option<usize>) -> usize {
        let mut node = self.nodes[id].clone();
        let children = std::mem::take(&mut node.children);
        node.parent = parent;
        node.clicks = 0;
        let copy = self.nodes.len();
        self.nodes.push(node);
        for child in children {
            let child_copy = self.deep_copy(child, Some(copy));
            self.nodes[copy].children.push(child_copy);
        }
        copy
    }

    /// Evaluate `locator` against `doc`
    pub fn find(&self, doc: usize, locator: &Locator) -> SeleniumResult<Vec<usize>> {
        let expr = locator.expression();
        let matches = |pred: &dyn Fn(usize) -> bool| -> Vec<usize> {
            self.elements(doc).into_iter().filter(|&id| pred(id)).collect()
        };
        let found = match locator.strategy() {
            LocatorStrategy::XPath => xpath::evaluate(self, doc, expr)?,
            LocatorStrategy::Id => matches(&|id| self.attr(id, "id") == Some(expr)),
            LocatorStrategy::Name => matches(&|id| self.attr(id, "name") == Some(expr)),
            LocatorStrategy::TagName => {
                matches(&|id| self.nodes[id].tag.eq_ignore_ascii_case(expr))
            }
            LocatorStrategy::ClassName => matches(&|id| self.has_class(id, expr)),
            LocatorStrategy::LinkText => matches(&|id| {
                self.nodes[id].tag == "a"
                    && normalize_space(&self.string_value(id)) == normalize_space(expr)
            }),
            LocatorStrategy::PartialLinkText => matches(&|id| {
                self.nodes[id].tag == "a" && self.string_value(id).contains(expr)
            }),
            LocatorStrategy::CssSelector => {
                let groups = parse_css(expr)?;
                matches(&|id| groups.iter().any(|chain| self.matches_chain(id, chain)))
            }
        };
        Ok(found)
    }

    fn has_class(&self, id: usize, class: &str) -> bool {
        self.attr(id, "class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    fn matches_compound(&self, id: usize, compound: &Compound) -> bool {
        let node = &self.nodes[id];
        compound
            .tag
            .as_ref()
            .map_or(true, |tag| node.tag.eq_ignore_ascii_case(tag))
            && compound
                .id
                .as_ref()
                .map_or(true, |want| self.attr(id, "id") == Some(want.as_str()))
            && compound.classes.iter().all(|class| self.has_class(id, class))
            && compound.attrs.iter().all(|(name, want)| match want {
                Some(value) => self.attr(id, name) == Some(value.as_str()),
                None => self.attr(id, name).is_some(),
            })
    }

    /// Descendant-combinator chain: last compound on `id`, the rest on ancestors
    fn matches_chain(&self, id: usize, chain: &[Compound]) -> bool {
        let Some((last, rest)) = chain.split_last() else {
            return false;
        };
        if !self.matches_compound(id, last) {
            return false;
        }
        let mut remaining = rest;
        let mut ancestor = self.nodes[id].parent;
        while let Some((next, before)) = remaining.split_last() {
            loop {
                match ancestor {
                    None => return false,
                    Some(a) => {
                        ancestor = self.nodes[a].parent;
                        if self.matches_compound(a, next) {
                            break;
                        }
                    }
                }
            }
            remaining = before;
        }
        true
    }

    /// HTML-ish serialization of the attached part of `doc`
    pub fn render(&self, doc: usize) -> String {
        let mut out = String::from("<html><body>");
        for root in self.roots(doc) {
            self.render_node(root, &mut out);
        }
        out.push_str("</body></html>");
        out
    }

    fn render_node(&self, id: usize, out: &mut String) {
        let node = &self.nodes[id];
        out.push('<');
        out.push_str(&node.tag);
        for (name, value) in &node.attrs {
            out.push_str(&format!(" {name}=\"{}\"", escape(value).replace('"', "&quot;")));
        }
        out.push('>');
        out.push_str(&escape(&node.text));
        for child in self.children(id) {
            self.render_node(child, out);
        }
        out.push_str(&format!("</{}>", node.tag));
    }
}

fn swap_id(ids: &mut [usize], old: usize, new: usize) {
    if let Some(slot) = ids.iter_mut().find(|slot| **slot == old) {
        *slot = new;
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

// =============================================================================
// CSS SUBSET
// =============================================================================

/// `tag#id.class[attr=value]`
#[derive(Debug, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

/// Comma-separated groups of descendant chains
fn parse_css(selector: &str) -> SeleniumResult<Vec<Vec<Compound>>> {
    selector
        .split(',')
        .map(|group| {
            let chain = group
                .split_whitespace()
                .map(parse_compound)
                .collect::<SeleniumResult<Vec<_>>>()?;
            if chain.is_empty() {
                return Err(invalid_css(selector));
            }
            Ok(chain)
        })
        .collect()
}

fn parse_compound(part: &str) -> SeleniumResult<Compound> {
    let mut compound = Compound::default();
    let mut rest = part;
    let head_len = rest.find(['#', '.', '[']).unwrap_or(rest.len());
    let head = &rest[..head_len];
    if !head.is_empty() && head != "*" {
        if !head.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(invalid_css(part));
        }
        compound.tag = Some(head.to_string());
    }
    rest = &rest[head_len..];

    while let Some(marker) = rest.chars().next() {
        rest = &rest[1..];
        if marker == '[' {
            let end = rest.find(']').ok_or_else(|| invalid_css(part))?;
            let inner = &rest[..end];
            rest = &rest[end + 1..];
            let attr = match inner.split_once('=') {
                Some((name, value)) => (
                    name.trim().to_string(),
                    Some(value.trim().trim_matches(['\'', '"']).to_string()),
                ),
                None => (inner.trim().to_string(), None),
            };
            compound.attrs.push(attr);
            continue;
        }
        let len = rest.find(['#', '.', '[']).unwrap_or(rest.len());
        let name = &rest[..len];
        if name.is_empty() {
            return Err(invalid_css(part));
        }
        match marker {
            '#' => compound.id = Some(name.to_string()),
            '.' => compound.classes.push(name.to_string()),
            _ => return Err(invalid_css(part)),
        }
        rest = &rest[len..];
    }
    Ok(compound)
}

fn invalid_css(selector: &str) -> SeleniumError {
    SeleniumError::locator_invalid(format!("unsupported css selector '{selector}'"))
}
