//! Document snapshots.
//!
//! A [`Document`] is an arena of element nodes rooted at a synthetic
//! `#document` node. Hosts hand out a fresh clone on every poll, so the
//! resolver only ever reads immutable snapshots.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Tag of the synthetic root node
pub const ROOT_TAG: &str = "#document";

/// Stable identifier of a node within one document lineage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    /// Raw arena index
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Interactive state that is not expressed through attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementState {
    /// Checkbox/radio checked property
    pub checked: bool,
    /// Rendered (not `display: none`)
    pub visible: bool,
    /// Another element sits on top of this one
    pub covered: bool,
    /// Form control value
    pub value: Option<String>,
}

impl Default for ElementState {
    fn default() -> Self {
        Self {
            checked: false,
            visible: true,
            covered: false,
            value: None,
        }
    }
}

/// A single element: tag, attributes, own text and state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Lower-case tag name
    pub tag: String,
    /// Attribute map
    pub attributes: BTreeMap<String, String>,
    /// Text directly owned by this element (not its children)
    pub text: String,
    /// Interactive state
    pub state: ElementState,
    /// Additional DOM properties readable through `its`/`have.prop`
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl Element {
    /// Create an element with the given tag
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            text: String::new(),
            state: ElementState::default(),
            properties: BTreeMap::new(),
        }
    }

    /// Set an attribute
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Set the `id` attribute
    #[must_use]
    pub fn with_id(self, id: impl Into<String>) -> Self {
        self.with_attr("id", id)
    }

    /// Append a class to the `class` attribute
    #[must_use]
    pub fn with_class(mut self, class: impl AsRef<str>) -> Self {
        let entry = self.attributes.entry("class".to_string()).or_default();
        if !entry.is_empty() {
            entry.push(' ');
        }
        entry.push_str(class.as_ref());
        self
    }

    /// Set the element's own text
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set the checked state
    #[must_use]
    pub const fn checked(mut self, checked: bool) -> Self {
        self.state.checked = checked;
        self
    }

    /// Set the visibility state
    #[must_use]
    pub const fn visible(mut self, visible: bool) -> Self {
        self.state.visible = visible;
        self
    }

    /// Mark the element as covered by another element
    #[must_use]
    pub const fn covered(mut self, covered: bool) -> Self {
        self.state.covered = covered;
        self
    }

    /// Set the form value
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.state.value = Some(value.into());
        self
    }

    /// Set an arbitrary DOM property
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// Attribute value
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// `id` attribute
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    /// Whitespace-separated classes
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_ascii_whitespace()
    }

    /// Whether the `class` attribute contains `class`
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    /// Checkbox, radio or an ARIA checkbox/switch
    #[must_use]
    pub fn is_checkable(&self) -> bool {
        let input_kind = self.attr("type").unwrap_or_default();
        (self.tag == "input" && matches!(input_kind, "checkbox" | "radio"))
            || matches!(self.attr("role"), Some("checkbox" | "radio" | "switch"))
    }

    /// Accepts typed text
    #[must_use]
    pub fn is_typeable(&self) -> bool {
        match self.tag.as_str() {
            "input" => !self.is_checkable(),
            "textarea" => true,
            _ => self.attributes.contains_key("contenteditable"),
        }
    }

    /// Short CSS-like description, e.g. `input#email.wide`
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = self.tag.clone();
        if let Some(id) = self.id() {
            out.push('#');
            out.push_str(id);
        }
        for class in self.classes() {
            out.push('.');
            out.push_str(class);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Node {
    element: Element,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// An element tree snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document containing only the root
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                element: Element::new(ROOT_TAG),
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// The synthetic root node
    #[must_use]
    pub const fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Whether `id` is the synthetic root
    #[must_use]
    pub const fn is_root(&self, id: NodeId) -> bool {
        id.0 == 0
    }

    /// Number of nodes ever allocated, including detached ones and the root
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the document has no elements besides the root
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes[0].children.is_empty()
    }

    /// Append `element` as the last child of `parent`.
    ///
    /// # Panics
    ///
    /// Panics if `parent` was not allocated by this document.
    pub fn append(&mut self, parent: NodeId, element: Element) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            element,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Remove `id` from its parent. The node keeps its subtree but is no
    /// longer attached, so it never matches a query again.
    pub fn detach(&mut self, id: NodeId) -> bool {
        if self.is_root(id) {
            return false;
        }
        let Some(parent) = self.nodes.get(id.0).and_then(|n| n.parent) else {
            return false;
        };
        self.nodes[parent.0].children.retain(|c| *c != id);
        self.nodes[id.0].parent = None;
        true
    }

    /// Element for `id`
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Element> {
        self.nodes.get(id.0).map(|n| &n.element)
    }

    /// Mutable element for `id`
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        self.nodes.get_mut(id.0).map(|n| &mut n.element)
    }

    /// Parent element, `None` for top-level elements and the root
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes
            .get(id.0)
            .and_then(|n| n.parent)
            .filter(|p| !self.is_root(*p))
    }

    /// Direct children
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id.0).map_or(&[], |n| n.children.as_slice())
    }

    /// Ancestors from nearest to furthest, excluding the root
    #[must_use]
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(p) = current {
            out.push(p);
            current = self.parent(p);
        }
        out
    }

    /// Descendants of `id` in document (pre-)order, excluding `id`
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Every attached element in document order
    #[must_use]
    pub fn elements(&self) -> Vec<NodeId> {
        self.descendants(self.root())
    }

    /// Whether `id` is reachable from the root
    #[must_use]
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if self.is_root(current) {
                return true;
            }
            match self.nodes.get(current.0).and_then(|n| n.parent) {
                Some(p) => current = p,
                None => return false,
            }
        }
    }

    /// Whether `ancestor` is a strict ancestor of `node`
    #[must_use]
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.nodes.get(node.0).and_then(|n| n.parent);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.nodes.get(p.0).and_then(|n| n.parent);
        }
        false
    }

    /// Own text followed by the text of every descendant
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let Some(el) = self.get(id) {
            out.push_str(&el.text);
        }
        for child in self.descendants(id) {
            if let Some(el) = self.get(child) {
                out.push_str(&el.text);
            }
        }
        out
    }

    /// Rendered: the element and all of its ancestors are visible
    #[must_use]
    pub fn is_visible(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(|el| el.state.visible)
            && self
                .ancestors(id)
                .iter()
                .all(|a| self.get(*a).is_some_and(|el| el.state.visible))
    }

    /// Disabled directly or through a disabled `fieldset` ancestor
    #[must_use]
    pub fn is_disabled(&self, id: NodeId) -> bool {
        let own = self
            .get(id)
            .is_some_and(|el| el.attributes.contains_key("disabled"));
        own || self.ancestors(id).iter().any(|a| {
            self.get(*a)
                .is_some_and(|el| el.tag == "fieldset" && el.attributes.contains_key("disabled"))
        })
    }
}
