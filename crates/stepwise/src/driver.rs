//! Host driver abstraction.
//!
//! The engine never renders anything itself. A host supplies three
//! operations: navigate, take a document snapshot, and dispatch an action
//! to one element. Implementations:
//!
//! - `FixtureDriver` - in-memory pages described in YAML (feature `fixture`)
//! - [`MockDriver`] - a fixed document with a call log, for unit testing

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::dom::{Document, NodeId};
use crate::result::{StepwiseError, StepwiseResult};

/// An interaction with one element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// Single click
    Click,
    /// Double click
    DoubleClick,
    /// Type text into a field
    Type {
        /// Text to append
        text: String,
    },
    /// Clear a field
    Clear,
    /// Check a checkbox or radio
    Check,
    /// Uncheck a checkbox
    Uncheck,
}

impl Action {
    /// Command name, e.g. `dblclick`
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::DoubleClick => "dblclick",
            Self::Type { .. } => "type",
            Self::Clear => "clear",
            Self::Check => "check",
            Self::Uncheck => "uncheck",
        }
    }

    /// Whether the action applies to every element of a set by default
    #[must_use]
    pub const fn applies_to_all(&self) -> bool {
        matches!(self, Self::Check | Self::Uncheck)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type { text } => write!(f, "type({text:?})"),
            other => write!(f, "{}()", other.name()),
        }
    }
}

/// Flags modifying how an action is dispatched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionOptions {
    /// Skip the visibility and covering checks
    pub force: bool,
    /// Allow acting on more than one element
    pub multiple: bool,
}

impl ActionOptions {
    /// Forced interaction
    #[must_use]
    pub const fn forced() -> Self {
        Self {
            force: true,
            multiple: false,
        }
    }

    /// Set `multiple`
    #[must_use]
    pub const fn with_multiple(mut self, multiple: bool) -> Self {
        self.multiple = multiple;
        self
    }
}

/// Browser-like settings handed to a driver at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            viewport_width: 1920,
            viewport_height: 1080,
        }
    }
}

impl DriverConfig {
    /// Create new config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set viewport dimensions
    #[must_use]
    pub const fn viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }
}

/// Query and action interface supplied by the host
#[async_trait]
pub trait Driver: Send {
    /// Navigate to an absolute URL
    async fn visit(&mut self, url: &str) -> StepwiseResult<()>;

    /// Snapshot of the current document
    async fn snapshot(&mut self) -> StepwiseResult<Document>;

    /// Dispatch `action` to `node`
    async fn dispatch(&mut self, node: NodeId, action: &Action) -> StepwiseResult<()>;

    /// URL of the current page
    fn current_url(&self) -> Option<&str>;
}

/// Creates one isolated driver per test case
pub trait DriverFactory: Send + Sync {
    /// Create a fresh driver
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot be started.
    fn create(&self, config: &DriverConfig) -> StepwiseResult<Box<dyn Driver>>;
}

/// Mock driver for unit testing
#[derive(Debug, Default)]
pub struct MockDriver {
    /// Current URL
    pub current_url: Option<String>,
    /// Document returned by every snapshot
    pub document: Document,
    /// Call history for verification
    pub call_history: Vec<String>,
    /// Reject every dispatch with this message
    pub fail_dispatch: Option<String>,
}

impl MockDriver {
    /// Create new mock driver over `document`
    #[must_use]
    pub fn new(document: Document) -> Self {
        Self {
            document,
            ..Self::default()
        }
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> &[String] {
        &self.call_history
    }

    /// Number of recorded calls starting with `method`
    #[must_use]
    pub fn calls(&self, method: &str) -> usize {
        self.call_history
            .iter()
            .filter(|c| c.starts_with(method))
            .count()
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn visit(&mut self, url: &str) -> StepwiseResult<()> {
        self.call_history.push(format!("visit:{url}"));
        self.current_url = Some(url.to_string());
        Ok(())
    }

    async fn snapshot(&mut self) -> StepwiseResult<Document> {
        self.call_history.push("snapshot".to_string());
        Ok(self.document.clone())
    }

    async fn dispatch(&mut self, node: NodeId, action: &Action) -> StepwiseResult<()> {
        self.call_history.push(format!("dispatch:{}:{node}", action.name()));
        match &self.fail_dispatch {
            Some(message) => Err(StepwiseError::driver(message.clone())),
            None => Ok(()),
        }
    }

    fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dom::Element;

    #[test]
    fn test_action_names() {
        assert_eq!(Action::DoubleClick.name(), "dblclick");
        assert_eq!(
            Action::Type {
                text: "hi".into()
            }
            .to_string(),
            "type(\"hi\")"
        );
        assert!(Action::Check.applies_to_all());
        assert!(!Action::Click.applies_to_all());
    }

    #[test]
    fn test_action_options_serde_defaults() {
        let opts: ActionOptions = serde_json::from_str(r#"{"force": true}"#).unwrap();
        assert_eq!(opts, ActionOptions::forced());
    }

    #[test]
    fn test_driver_config_default_viewport() {
        let config = DriverConfig::new();
        assert_eq!((config.viewport_width, config.viewport_height), (1920, 1080));
        let small = config.viewport(800, 600);
        assert_eq!(small.viewport_width, 800);
    }

    #[tokio::test]
    async fn test_mock_driver_records_calls() {
        let mut doc = Document::new();
        let root = doc.root();
        let button = doc.append(root, Element::new("button"));
        let mut driver = MockDriver::new(doc);
        driver.visit("http://localhost:4200/").await.unwrap();
        let snapshot = driver.snapshot().await.unwrap();
        assert_eq!(snapshot.elements(), vec![button]);
        driver.dispatch(button, &Action::Click).await.unwrap();
        assert_eq!(driver.current_url(), Some("http://localhost:4200/"));
        assert_eq!(driver.calls("dispatch:click"), 1);
        assert_eq!(driver.history().len(), 3);
    }

    #[tokio::test]
    async fn test_mock_driver_can_fail_dispatch() {
        let mut driver = MockDriver::new(Document::new());
        driver.fail_dispatch = Some("detached".into());
        let err = driver
            .dispatch(Document::new().root(), &Action::Clear)
            .await
            .unwrap_err();
        assert!(matches!(err, StepwiseError::Driver { .. }));
    }
}
