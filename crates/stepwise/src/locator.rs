//! Locator resolution against document snapshots.
//!
//! # Design
//!
//! - **Read-only**: resolution never mutates the snapshot it is given
//! - **Empty is not an error**: callers decide whether to poll again
//! - **Fresh handles**: an [`ElementHandle`] is a copy of element state at
//!   capture time; the executor re-resolves instead of reusing old handles

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::dom::{Document, NodeId};
use crate::selector::{CssSelector, Selector};

/// Snapshot of one matched element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Node in the snapshot it was captured from
    pub node: NodeId,
    /// Tag name
    pub tag: String,
    /// Whitespace-normalised text content (own and descendants)
    pub text: String,
    /// Attributes
    pub attributes: BTreeMap<String, String>,
    /// DOM properties
    pub properties: BTreeMap<String, serde_json::Value>,
    /// Checked state
    pub checked: bool,
    /// Disabled directly or through a fieldset
    pub disabled: bool,
    /// Rendered, including ancestors
    pub visible: bool,
    /// Covered by another element
    pub covered: bool,
    /// Form value
    pub value: Option<String>,
}

impl ElementHandle {
    /// Capture the state of `id`, `None` if the node does not exist
    #[must_use]
    pub fn capture(doc: &Document, id: NodeId) -> Option<Self> {
        let el = doc.get(id)?;
        Some(Self {
            node: id,
            tag: el.tag.clone(),
            text: normalize_whitespace(&doc.text_content(id)),
            attributes: el.attributes.clone(),
            properties: el.properties.clone(),
            checked: el.state.checked,
            disabled: doc.is_disabled(id),
            visible: doc.is_visible(id),
            covered: el.state.covered,
            value: el.state.value.clone(),
        })
    }

    /// Attribute value
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Whether the `class` attribute lists `class`
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .unwrap_or_default()
            .split_ascii_whitespace()
            .any(|c| c == class)
    }

    /// DOM property: explicit properties first, then the built-in ones
    /// (`checked`, `disabled`, `value`, `id`, `className`, `tagName`,
    /// `textContent`/`innerText`)
    #[must_use]
    pub fn property(&self, name: &str) -> Option<serde_json::Value> {
        if let Some(value) = self.properties.get(name) {
            return Some(value.clone());
        }
        let value = match name {
            "checked" => self.checked.into(),
            "disabled" => self.disabled.into(),
            "value" => self.value.clone().unwrap_or_default().into(),
            "id" => self.attr("id").unwrap_or_default().into(),
            "className" => self.attr("class").unwrap_or_default().into(),
            "tagName" => self.tag.to_ascii_uppercase().into(),
            "textContent" | "innerText" => self.text.clone().into(),
            _ => return None,
        };
        Some(value)
    }

    /// Form value: the `value` state, falling back to the `value` attribute
    #[must_use]
    pub fn form_value(&self) -> Option<&str> {
        self.value.as_deref().or_else(|| self.attr("value"))
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.tag)?;
        if let Some(id) = self.attr("id") {
            write!(f, "#{id}")?;
        }
        for class in self.attr("class").unwrap_or_default().split_ascii_whitespace() {
            write!(f, ".{class}")?;
        }
        write!(f, ">")
    }
}

/// Collapse runs of whitespace to one space and trim the ends
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve `selector` and capture a handle for every match.
///
/// With `scope`, only descendants of the scope elements are candidates.
#[must_use]
pub fn resolve(doc: &Document, selector: &Selector, scope: Option<&[NodeId]>) -> Vec<ElementHandle> {
    capture_all(doc, &resolve_nodes(doc, selector, scope))
}

/// Capture handles for `nodes`, skipping ids the document does not know
#[must_use]
pub fn capture_all(doc: &Document, nodes: &[NodeId]) -> Vec<ElementHandle> {
    nodes
        .iter()
        .filter_map(|id| ElementHandle::capture(doc, *id))
        .collect()
}

/// Resolve `selector` to node ids in document order
#[must_use]
pub fn resolve_nodes(doc: &Document, selector: &Selector, scope: Option<&[NodeId]>) -> Vec<NodeId> {
    let candidates = candidates(doc, scope);
    match selector {
        Selector::Css(css) => candidates
            .into_iter()
            .filter(|id| css.matches(doc, *id))
            .collect(),
        Selector::Contains { css, text } => {
            contains_node(doc, &candidates, css.as_ref(), text).into_iter().collect()
        }
    }
}

fn candidates(doc: &Document, scope: Option<&[NodeId]>) -> Vec<NodeId> {
    let Some(scope) = scope else {
        return doc.elements();
    };
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for root in scope.iter().filter(|id| doc.is_attached(**id)) {
        for id in doc.descendants(*root) {
            if seen.insert(id) {
                out.push(id);
            }
        }
    }
    out.sort_by_key(|id| position(doc, *id));
    out
}

// Document order key. Node ids are allocation order, which diverges from
// document order once hosts append into earlier subtrees.
fn position(doc: &Document, id: NodeId) -> Vec<usize> {
    let mut path = Vec::new();
    let mut current = id;
    loop {
        let parent = doc.parent(current).unwrap_or_else(|| doc.root());
        let index = doc
            .children(parent)
            .iter()
            .position(|c| *c == current)
            .unwrap_or(usize::MAX);
        path.push(index);
        if parent == doc.root() {
            break;
        }
        current = parent;
    }
    path.reverse();
    path
}

fn contains_node(
    doc: &Document,
    candidates: &[NodeId],
    css: Option<&CssSelector>,
    text: &str,
) -> Option<NodeId> {
    let needle = normalize_whitespace(text);
    let has_text = |id: NodeId| normalize_whitespace(&doc.text_content(id)).contains(&needle);
    if let Some(css) = css {
        return candidates
            .iter()
            .copied()
            .find(|id| css.matches(doc, *id) && has_text(*id));
    }
    let matching: Vec<NodeId> = candidates.iter().copied().filter(|id| has_text(*id)).collect();
    matching
        .iter()
        .copied()
        .find(|id| !matching.iter().any(|other| doc.is_ancestor(*id, *other)))
}

/// Traversal from an element subject to related elements
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Traversal {
    /// Ancestors, nearest first, optionally filtered
    Parents(Option<CssSelector>),
    /// Direct parent
    Parent,
    /// Direct children, optionally filtered
    Children(Option<CssSelector>),
    /// First element of the set
    First,
    /// Last element of the set
    Last,
    /// Element at index; negative counts from the end
    Eq(i64),
}

impl fmt::Display for Traversal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parents(None) => write!(f, "parents()"),
            Self::Parents(Some(sel)) => write!(f, "parents({sel})"),
            Self::Parent => write!(f, "parent()"),
            Self::Children(None) => write!(f, "children()"),
            Self::Children(Some(sel)) => write!(f, "children({sel})"),
            Self::First => write!(f, "first()"),
            Self::Last => write!(f, "last()"),
            Self::Eq(i) => write!(f, "eq({i})"),
        }
    }
}

/// Apply `traversal` to `nodes`, de-duplicating while keeping first occurrence
#[must_use]
pub fn traverse(doc: &Document, nodes: &[NodeId], traversal: &Traversal) -> Vec<NodeId> {
    let attached: Vec<NodeId> = nodes.iter().copied().filter(|id| doc.is_attached(*id)).collect();
    let passes = |filter: &Option<CssSelector>, id: NodeId| {
        filter.as_ref().map_or(true, |css| css.matches(doc, id))
    };
    let related: Vec<NodeId> = match traversal {
        Traversal::Parents(filter) => attached
            .iter()
            .flat_map(|id| doc.ancestors(*id))
            .filter(|id| passes(filter, *id))
            .collect(),
        Traversal::Parent => attached.iter().filter_map(|id| doc.parent(*id)).collect(),
        Traversal::Children(filter) => attached
            .iter()
            .flat_map(|id| doc.children(*id).to_vec())
            .filter(|id| passes(filter, *id))
            .collect(),
        Traversal::First => attached.first().copied().into_iter().collect(),
        Traversal::Last => attached.last().copied().into_iter().collect(),
        Traversal::Eq(index) => {
            let len = i64::try_from(attached.len()).unwrap_or(i64::MAX);
            let at = if *index < 0 { len + index } else { *index };
            usize::try_from(at)
                .ok()
                .and_then(|i| attached.get(i).copied())
                .into_iter()
                .collect()
        }
    };
    let mut seen = HashSet::new();
    related.into_iter().filter(|id| seen.insert(*id)).collect()
}

/// Why an element cannot receive an action, `None` when it can.
///
/// `force` skips the visibility and covering checks. Disabled elements are
/// never actionable.
#[must_use]
pub fn actionability(doc: &Document, id: NodeId, force: bool) -> Option<String> {
    let Some(el) = doc.get(id) else {
        return Some(format!("{id} does not exist"));
    };
    if !doc.is_attached(id) {
        return Some(format!("{} is detached from the document", el.describe()));
    }
    if doc.is_disabled(id) {
        return Some(format!("{} is disabled", el.describe()));
    }
    if force {
        return None;
    }
    if !doc.is_visible(id) {
        return Some(format!("{} is not visible", el.describe()));
    }
    if el.state.covered {
        return Some(format!("{} is covered by another element", el.describe()));
    }
    None
}
