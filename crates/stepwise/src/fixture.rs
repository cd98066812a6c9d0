//! In-memory fixture host.
//!
//! A [`FixtureSite`] describes pages as YAML element trees. [`FixtureDriver`]
//! serves them through the [`Driver`] trait: clicks run the effects attached
//! to the clicked element and its ancestors, form actions update element
//! state, and timed mutations apply once their delay since page load has
//! passed. Mutations are applied lazily on the next snapshot or dispatch, so
//! under a paused tokio clock every run is deterministic.
//!
//! ```yaml
//! pages:
//!   /:
//!     body:
//!       - tag: a
//!         text: Forms
//!         on_click:
//!           - effect: { navigate: /forms }
//!   /forms:
//!     body:
//!       - tag: button
//!         attrs: { data-cy: submit, disabled: "" }
//!         text: Submit
//!     mutations:
//!       - after_ms: 1200
//!         target: '[data-cy="submit"]'
//!         effect: { remove_attribute: disabled }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::dom::{Document, Element, NodeId};
use crate::driver::{Action, Driver, DriverConfig, DriverFactory};
use crate::locator::resolve_nodes;
use crate::result::{StepwiseError, StepwiseResult};
use crate::selector::{CssSelector, Selector};

const fn default_true() -> bool {
    true
}

/// One element of a fixture page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeFixture {
    /// Tag name
    pub tag: String,
    /// `id` attribute
    #[serde(default)]
    pub id: Option<String>,
    /// `class` attribute
    #[serde(default)]
    pub class: Option<String>,
    /// Other attributes
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    /// Own text
    #[serde(default)]
    pub text: String,
    /// Checked state
    #[serde(default)]
    pub checked: bool,
    /// Rendered
    #[serde(default = "default_true")]
    pub visible: bool,
    /// Covered by another element
    #[serde(default)]
    pub covered: bool,
    /// Form value
    #[serde(default)]
    pub value: Option<String>,
    /// DOM properties
    #[serde(default)]
    pub props: BTreeMap<String, serde_json::Value>,
    /// Effects run when this element (or a descendant) is clicked
    #[serde(default)]
    pub on_click: Vec<Trigger>,
    /// Child elements
    #[serde(default)]
    pub children: Vec<NodeFixture>,
}

impl NodeFixture {
    fn element(&self) -> Element {
        let mut el = Element::new(&self.tag).with_text(&self.text);
        el.attributes.clone_from(&self.attrs);
        if let Some(id) = &self.id {
            el = el.with_id(id);
        }
        if let Some(class) = &self.class {
            el = el.with_attr("class", class);
        }
        el.state.checked = self.checked;
        el.state.visible = self.visible;
        el.state.covered = self.covered;
        el.state.value.clone_from(&self.value);
        el.properties.clone_from(&self.props);
        el
    }
}

/// State change applied by a click or a timed mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Load another page
    Navigate(String),
    /// Set an attribute
    SetAttribute {
        /// Attribute name
        name: String,
        /// Attribute value
        value: String,
    },
    /// Remove an attribute
    RemoveAttribute(String),
    /// Replace own text
    SetText(String),
    /// Show or hide
    SetVisible(bool),
    /// Check or uncheck
    SetChecked(bool),
    /// Cover or uncover
    SetCovered(bool),
    /// Detach from the document
    Remove,
    /// Append a child subtree
    Append(NodeFixture),
}

/// A click effect, by default on the clicked element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Trigger {
    /// Elements to change instead of the clicked one
    #[serde(default)]
    pub target: Option<CssSelector>,
    /// What happens
    #[serde(with = "serde_yaml_ng::with::singleton_map")]
    pub effect: Effect,
}

/// A change applied `after_ms` after the page loads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Mutation {
    /// Delay since page load
    pub after_ms: u64,
    /// Elements to change; the document root when absent
    #[serde(default)]
    pub target: Option<CssSelector>,
    /// What happens
    #[serde(with = "serde_yaml_ng::with::singleton_map")]
    pub effect: Effect,
}

/// One page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PageFixture {
    /// Top-level elements
    #[serde(default)]
    pub body: Vec<NodeFixture>,
    /// Timed changes
    #[serde(default)]
    pub mutations: Vec<Mutation>,
}

/// Pages keyed by path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixtureSite {
    /// Pages by path, e.g. `/` or `/pages/forms/layouts`
    #[serde(default)]
    pub pages: BTreeMap<String, PageFixture>,
}

impl FixtureSite {
    /// Parse a site from YAML
    ///
    /// # Errors
    ///
    /// Returns [`StepwiseError::Config`] on invalid YAML.
    pub fn from_yaml(yaml: &str) -> StepwiseResult<Self> {
        serde_yaml_ng::from_str(yaml)
            .map_err(|e| StepwiseError::config(format!("invalid fixture site: {e}")))
    }

    /// Load a site from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an I/O error or [`StepwiseError::Config`].
    pub fn load(path: impl AsRef<Path>) -> StepwiseResult<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml).map_err(|e| match e {
            StepwiseError::Config { message } => {
                StepwiseError::config(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    /// Add a page
    #[must_use]
    pub fn with_page(mut self, path: impl Into<String>, page: PageFixture) -> Self {
        self.pages.insert(path.into(), page);
        self
    }

    fn page(&self, path: &str) -> Option<&PageFixture> {
        self.pages.get(path).or_else(|| {
            let trimmed = path.trim_end_matches('/');
            self.pages.get(if trimmed.is_empty() { "/" } else { trimmed })
        })
    }
}

/// Path component of `url`, without query or fragment
#[must_use]
pub fn page_path(url: &str) -> &str {
    let path = match url.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("/", |i| &rest[i..]),
        None => url,
    };
    let path = path.split(['?', '#']).next().unwrap_or_default();
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

/// A dispatched action, for verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRecord {
    /// Target element
    pub node: NodeId,
    /// Action
    pub action: Action,
    /// Time since the page loaded
    pub at: Duration,
}

/// [`Driver`] over a [`FixtureSite`]
#[derive(Debug)]
pub struct FixtureDriver {
    site: Arc<FixtureSite>,
    config: DriverConfig,
    url: Option<String>,
    document: Document,
    click_effects: HashMap<NodeId, Vec<Trigger>>,
    pending: Vec<Mutation>,
    loaded_at: Instant,
    log: Vec<DispatchRecord>,
}

impl FixtureDriver {
    /// Create a driver with no page loaded
    #[must_use]
    pub fn new(site: Arc<FixtureSite>, config: DriverConfig) -> Self {
        Self {
            site,
            config,
            url: None,
            document: Document::new(),
            click_effects: HashMap::new(),
            pending: Vec::new(),
            loaded_at: Instant::now(),
            log: Vec::new(),
        }
    }

    /// Driver configuration
    #[must_use]
    pub const fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Every dispatched action since creation
    #[must_use]
    pub fn log(&self) -> &[DispatchRecord] {
        &self.log
    }

    fn load(&mut self, url: &str) -> StepwiseResult<()> {
        let path = page_path(url);
        let site = Arc::clone(&self.site);
        let page = site.page(path).ok_or_else(|| StepwiseError::Navigation {
            url: url.to_string(),
            message: format!("no fixture page for `{path}`"),
        })?;
        self.document = Document::new();
        self.click_effects.clear();
        let root = self.document.root();
        for node in &page.body {
            self.build(root, node);
        }
        self.pending = page.mutations.clone();
        self.pending.sort_by_key(|m| m.after_ms);
        self.loaded_at = Instant::now();
        self.url = Some(url.to_string());
        tracing::debug!(url, elements = self.document.elements().len(), "fixture page loaded");
        Ok(())
    }

    fn build(&mut self, parent: NodeId, node: &NodeFixture) -> NodeId {
        let id = self.document.append(parent, node.element());
        if !node.on_click.is_empty() {
            self.click_effects.insert(id, node.on_click.clone());
        }
        for child in &node.children {
            self.build(id, child);
        }
        id
    }

    fn apply_due(&mut self) -> StepwiseResult<()> {
        let elapsed = self.loaded_at.elapsed();
        let due_count = self
            .pending
            .iter()
            .take_while(|m| Duration::from_millis(m.after_ms) <= elapsed)
            .count();
        if due_count == 0 {
            return Ok(());
        }
        let due: Vec<Mutation> = self.pending.drain(..due_count).collect();
        let page = self.url.clone();
        for mutation in due {
            tracing::trace!(after_ms = mutation.after_ms, effect = ?mutation.effect, "mutation due");
            let targets = match &mutation.target {
                Some(css) => resolve_nodes(&self.document, &Selector::Css(css.clone()), None),
                None => vec![self.document.root()],
            };
            self.apply(&targets, &mutation.effect)?;
            if self.url != page {
                break;
            }
        }
        Ok(())
    }

    fn apply(&mut self, targets: &[NodeId], effect: &Effect) -> StepwiseResult<()> {
        if let Effect::Navigate(url) = effect {
            return self.load(url);
        }
        for target in targets {
            if let Effect::Append(node) = effect {
                self.build(*target, node);
                continue;
            }
            if *target == self.document.root() {
                continue;
            }
            if matches!(effect, Effect::Remove) {
                self.document.detach(*target);
                continue;
            }
            let Some(el) = self.document.get_mut(*target) else {
                continue;
            };
            match effect {
                Effect::SetAttribute { name, value } => {
                    el.attributes.insert(name.clone(), value.clone());
                }
                Effect::RemoveAttribute(name) => {
                    el.attributes.remove(name);
                }
                Effect::SetText(text) => el.text.clone_from(text),
                Effect::SetVisible(visible) => el.state.visible = *visible,
                Effect::SetChecked(checked) => el.state.checked = *checked,
                Effect::SetCovered(covered) => el.state.covered = *covered,
                Effect::Navigate(_) | Effect::Remove | Effect::Append(_) => {}
            }
        }
        Ok(())
    }

    fn run_click_effects(&mut self, node: NodeId) -> StepwiseResult<()> {
        let mut chain = vec![node];
        chain.extend(self.document.ancestors(node));
        let page = self.url.clone();
        for current in chain {
            let Some(triggers) = self.click_effects.get(&current).cloned() else {
                continue;
            };
            for trigger in triggers {
                let targets = match &trigger.target {
                    Some(css) => resolve_nodes(&self.document, &Selector::Css(css.clone()), None),
                    None => vec![current],
                };
                self.apply(&targets, &trigger.effect)?;
                if self.url != page {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    fn element(&self, node: NodeId, action: &Action) -> StepwiseResult<&Element> {
        if !self.document.is_attached(node) {
            return Err(StepwiseError::driver(format!(
                "cannot {} {node}: element is detached",
                action.name()
            )));
        }
        let el = self
            .document
            .get(node)
            .ok_or_else(|| StepwiseError::driver(format!("unknown element {node}")))?;
        if self.document.is_disabled(node) {
            return Err(StepwiseError::driver(format!(
                "cannot {} {}: element is disabled",
                action.name(),
                el.describe()
            )));
        }
        Ok(el)
    }

    /// Checking a radio unchecks the other attached radios of its `name` group.
    fn set_checked(&mut self, node: NodeId, checked: bool) {
        let group = self
            .document
            .get(node)
            .filter(|el| checked && is_radio(el))
            .and_then(|el| el.attr("name"))
            .map(str::to_string);
        if let Some(name) = group {
            let peers: Vec<NodeId> = self
                .document
                .elements()
                .into_iter()
                .filter(|&id| id != node && self.document.is_attached(id))
                .filter(|&id| {
                    self.document
                        .get(id)
                        .is_some_and(|el| is_radio(el) && el.attr("name") == Some(name.as_str()))
                })
                .collect();
            for peer in peers {
                if let Some(el) = self.document.get_mut(peer) {
                    el.state.checked = false;
                }
            }
        }
        if let Some(el) = self.document.get_mut(node) {
            el.state.checked = checked;
        }
    }
}

fn is_radio(el: &Element) -> bool {
    el.attr("type") == Some("radio") || el.attr("role") == Some("radio")
}

#[async_trait]
impl Driver for FixtureDriver {
    async fn visit(&mut self, url: &str) -> StepwiseResult<()> {
        self.load(url)
    }

    async fn snapshot(&mut self) -> StepwiseResult<Document> {
        self.apply_due()?;
        Ok(self.document.clone())
    }

    async fn dispatch(&mut self, node: NodeId, action: &Action) -> StepwiseResult<()> {
        self.apply_due()?;
        let el = self.element(node, action)?;
        let checkable = el.is_checkable();
        let typeable = el.is_typeable();
        let radio = is_radio(el);
        let was_checked = el.state.checked;
        let description = el.describe();
        self.log.push(DispatchRecord {
            node,
            action: action.clone(),
            at: self.loaded_at.elapsed(),
        });
        match action {
            Action::Click => {
                if checkable {
                    self.set_checked(node, radio || !was_checked);
                }
                self.run_click_effects(node)
            }
            Action::DoubleClick => self.run_click_effects(node),
            Action::Type { .. } | Action::Clear if !typeable => {
                Err(StepwiseError::driver(format!(
                    "cannot {} {description}: element does not accept text",
                    action.name()
                )))
            }
            Action::Type { text } => {
                if let Some(el) = self.document.get_mut(node) {
                    let mut value = el
                        .state
                        .value
                        .take()
                        .or_else(|| el.attr("value").map(str::to_string))
                        .unwrap_or_default();
                    value.push_str(text);
                    el.state.value = Some(value);
                }
                Ok(())
            }
            Action::Clear => {
                if let Some(el) = self.document.get_mut(node) {
                    el.state.value = Some(String::new());
                }
                Ok(())
            }
            Action::Check | Action::Uncheck if !checkable => Err(StepwiseError::driver(format!(
                "cannot {} {description}: element is not a checkbox or radio",
                action.name()
            ))),
            Action::Uncheck if radio => Err(StepwiseError::driver(format!(
                "cannot uncheck {description}: radio buttons can only be checked"
            ))),
            Action::Check => {
                self.set_checked(node, true);
                if was_checked {
                    Ok(())
                } else {
                    self.run_click_effects(node)
                }
            }
            Action::Uncheck => {
                self.set_checked(node, false);
                if was_checked {
                    self.run_click_effects(node)
                } else {
                    Ok(())
                }
            }
        }
    }

    fn current_url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

/// Creates a [`FixtureDriver`] per test over a shared site
#[derive(Debug, Clone)]
pub struct FixtureDriverFactory {
    site: Arc<FixtureSite>,
}

impl FixtureDriverFactory {
    /// Create a factory for `site`
    #[must_use]
    pub fn new(site: FixtureSite) -> Self {
        Self {
            site: Arc::new(site),
        }
    }
}

impl DriverFactory for FixtureDriverFactory {
    fn create(&self, config: &DriverConfig) -> StepwiseResult<Box<dyn Driver>> {
        Ok(Box::new(FixtureDriver::new(Arc::clone(&self.site), *config)))
    }
}
