//! Chain commands and steps.

use std::fmt;
use std::time::Duration;

use crate::assertion::Expectation;
use crate::driver::{Action, ActionOptions};
use crate::locator::Traversal;
use crate::retry::RetryPolicy;
use crate::selector::{CssSelector, Selector};

/// Value read from an element subject by `its`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extract {
    /// Text content
    Text,
    /// Attribute value
    Attribute(String),
    /// DOM property
    Property(String),
    /// Form value
    Value,
    /// Number of elements
    Length,
}

impl fmt::Display for Extract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Attribute(name) => write!(f, "attr.{name}"),
            Self::Property(name) => write!(f, "prop.{name}"),
            Self::Value => write!(f, "value"),
            Self::Length => write!(f, "length"),
        }
    }
}

/// One chain command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Navigate; relative URLs resolve against the base URL
    Visit(String),
    /// Global query
    Get(Selector),
    /// Query scoped to the current element subject
    Find(CssSelector),
    /// Text query, scoped when the chain has an element subject
    Contains {
        /// Optional element filter
        css: Option<CssSelector>,
        /// Text to look for
        text: String,
    },
    /// Traversal from the current element subject
    Traverse(Traversal),
    /// Read a value from the current element subject
    Its(Extract),
    /// Continue from a stored alias
    Alias(String),
    /// Interact with the current element subject
    Act {
        /// What to do
        action: Action,
        /// How to do it
        options: ActionOptions,
    },
    /// Assert on the current subject
    Should(Expectation),
    /// Pause without changing the subject
    Wait(Duration),
}

impl Command {
    /// Queries are replayed against every fresh snapshot
    #[must_use]
    pub const fn is_query(&self) -> bool {
        matches!(
            self,
            Self::Get(_) | Self::Find(_) | Self::Contains { .. } | Self::Traverse(_) | Self::Its(_)
        )
    }

    /// Command name, e.g. `get` or `click`
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Visit(_) => "visit",
            Self::Get(_) => "get",
            Self::Find(_) => "find",
            Self::Contains { .. } => "contains",
            Self::Traverse(t) => match t {
                Traversal::Parents(_) => "parents",
                Traversal::Parent => "parent",
                Traversal::Children(_) => "children",
                Traversal::First => "first",
                Traversal::Last => "last",
                Traversal::Eq(_) => "eq",
            },
            Self::Its(_) => "its",
            Self::Alias(_) => "alias",
            Self::Act { action, .. } => action.name(),
            Self::Should(_) => "should",
            Self::Wait(_) => "wait",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Visit(url) => write!(f, "visit({url:?})"),
            Self::Get(Selector::Css(css)) => write!(f, "get({css})"),
            Self::Get(selector) => write!(f, "{selector}"),
            Self::Find(css) => write!(f, "find({css})"),
            Self::Contains { css: None, text } => write!(f, "contains({text:?})"),
            Self::Contains {
                css: Some(css),
                text,
            } => write!(f, "contains({css}, {text:?})"),
            Self::Traverse(t) => write!(f, "{t}"),
            Self::Its(extract) => write!(f, "its({extract})"),
            Self::Alias(name) => write!(f, "@{}", name.trim_start_matches('@')),
            Self::Act { action, options } if options.force => write!(f, "{action} [force]"),
            Self::Act { action, .. } => write!(f, "{action}"),
            Self::Should(exp) => write!(f, "should({exp})"),
            Self::Wait(d) => write!(f, "wait({}ms)", d.as_millis()),
        }
    }
}

/// A chain node: command, optional policy override, optional alias
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Command to run
    pub command: Command,
    /// Overrides the context's default policy
    pub policy: Option<RetryPolicy>,
    /// Store the resulting subject under this name
    pub alias: Option<String>,
}

impl Step {
    /// Create a step with the default policy and no alias
    #[must_use]
    pub const fn new(command: Command) -> Self {
        Self {
            command,
            policy: None,
            alias: None,
        }
    }

    /// Override the retry policy
    #[must_use]
    pub const fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Store the result under `name`
    #[must_use]
    pub fn with_alias(mut self, name: impl Into<String>) -> Self {
        self.alias = Some(name.into());
        self
    }
}

impl From<Command> for Step {
    fn from(command: Command) -> Self {
        Self::new(command)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        if let Some(alias) = &self.alias {
            write!(f, ".as({alias:?})")?;
        }
        Ok(())
    }
}
