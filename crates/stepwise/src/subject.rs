//! The value flowing between chain steps.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::dom::NodeId;
use crate::locator::ElementHandle;

/// Current subject of a chain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Subject {
    /// Nothing yet (chain start, after `visit` or `wait`)
    #[default]
    None,
    /// Element set, possibly empty
    Elements(Vec<ElementHandle>),
    /// Scalar value such as a text, length or property
    Value(serde_json::Value),
    /// Attribute read by `its`
    Attribute {
        /// Attribute name
        name: String,
        /// Value, `None` when the attribute is absent
        value: Option<String>,
    },
}

impl Subject {
    /// Element handles, `None` for non-element subjects
    #[must_use]
    pub fn elements(&self) -> Option<&[ElementHandle]> {
        match self {
            Self::Elements(handles) => Some(handles),
            _ => None,
        }
    }

    /// Node ids of an element subject
    #[must_use]
    pub fn nodes(&self) -> Vec<NodeId> {
        self.elements()
            .map(|els| els.iter().map(|e| e.node).collect())
            .unwrap_or_default()
    }

    /// Whether this is an element subject
    #[must_use]
    pub const fn is_elements(&self) -> bool {
        matches!(self, Self::Elements(_))
    }

    /// Kind name for diagnostics
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::None => "no subject",
            Self::Elements(_) => "an element set",
            Self::Value(_) => "a value",
            Self::Attribute { .. } => "an attribute",
        }
    }

    /// Text view used by text expectations
    #[must_use]
    pub fn text(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Elements(els) => Some(
                els.iter()
                    .map(|e| e.text.as_str())
                    .collect::<Vec<_>>()
                    .join(""),
            ),
            Self::Value(serde_json::Value::String(s)) => Some(s.clone()),
            Self::Value(other) => Some(other.to_string()),
            Self::Attribute { value, .. } => value.clone(),
        }
    }
}

impl From<Vec<ElementHandle>> for Subject {
    fn from(handles: Vec<ElementHandle>) -> Self {
        Self::Elements(handles)
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "nothing"),
            Self::Elements(els) if els.is_empty() => write!(f, "no elements"),
            Self::Elements(els) => {
                let shown: Vec<String> = els.iter().take(3).map(ToString::to_string).collect();
                write!(f, "{} element(s): {}", els.len(), shown.join(", "))?;
                if els.len() > 3 {
                    write!(f, ", ...")?;
                }
                Ok(())
            }
            Self::Value(v) => write!(f, "{v}"),
            Self::Attribute { name, value: None } => write!(f, "no `{name}` attribute"),
            Self::Attribute {
                name,
                value: Some(v),
            } => write!(f, "{name}={v:?}"),
        }
    }
}
