//! Declarative spec files (`*.spec.yaml`).
//!
//! ```yaml
//! suite: First test suite
//! before_each:
//!   - visit: /
//!   - contains: Forms
//!   - click:
//! tests:
//!   - name: finding elements
//!     steps:
//!       - get: "#inputEmail3"
//!       - parents: form
//!       - find: button
//!       - should: [contain, Sign in]
//!         timeout_ms: 2000
//! ```
//!
//! Every step is a mapping with exactly one command key plus the optional
//! modifiers `as`, `timeout_ms`, `interval_ms` and `backoff`. Retry
//! overrides are kept relative to the run's default policy and merged when
//! the step is materialised with [`StepSpec::to_step`].

use serde::Deserialize;
use serde_yaml_ng::{Mapping, Value};
use std::path::Path;
use std::time::Duration;

use crate::assertion::Expectation;
use crate::command::{Command, Extract, Step};
use crate::driver::{Action, ActionOptions};
use crate::locator::Traversal;
use crate::result::{StepwiseError, StepwiseResult};
use crate::retry::{Backoff, RetryPolicy};
use crate::selector::{CssSelector, Selector};

const MODIFIERS: [&str; 4] = ["as", "timeout_ms", "interval_ms", "backoff"];

const COMMANDS: [&str; 22] = [
    "visit", "get", "get_by_test_id", "find", "contains", "parents", "parent", "children", "first",
    "last", "eq", "its", "alias", "click", "dblclick", "type", "clear", "check", "uncheck",
    "should", "and", "wait",
];

/// A parsed spec file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpecFile {
    /// Suite name
    pub suite: String,
    /// Steps prepended to every test
    #[serde(default)]
    pub before_each: Vec<StepSpec>,
    /// Test cases
    pub tests: Vec<TestSpec>,
}

/// One test case
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestSpec {
    /// Test name
    pub name: String,
    /// Steps in order
    pub steps: Vec<StepSpec>,
    /// Do not run
    #[serde(default)]
    pub skip: bool,
    /// Run only the tests marked `only` in this suite
    #[serde(default)]
    pub only: bool,
}

/// One parsed step with retry overrides
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Mapping")]
pub struct StepSpec {
    /// Command
    pub command: Command,
    /// Alias for the resulting subject
    pub alias: Option<String>,
    /// Timeout override
    pub timeout_ms: Option<u64>,
    /// Interval override
    pub interval_ms: Option<u64>,
    /// Backoff override
    pub backoff: Option<Backoff>,
}

impl StepSpec {
    /// Materialise against the run's default policy
    #[must_use]
    pub fn to_step(&self, defaults: &RetryPolicy) -> Step {
        let mut step = Step::new(self.command.clone());
        if self.timeout_ms.is_some() || self.interval_ms.is_some() || self.backoff.is_some() {
            let mut policy = *defaults;
            if let Some(ms) = self.timeout_ms {
                policy = policy.with_timeout(Duration::from_millis(ms));
            }
            if let Some(ms) = self.interval_ms {
                policy = policy.with_interval(Duration::from_millis(ms));
            }
            if let Some(backoff) = self.backoff {
                policy = policy.with_backoff(backoff);
            }
            step = step.with_policy(policy);
        }
        if let Some(alias) = &self.alias {
            step = step.with_alias(alias);
        }
        step
    }
}

impl TryFrom<Mapping> for StepSpec {
    type Error = StepwiseError;

    fn try_from(map: Mapping) -> StepwiseResult<Self> {
        let mut command = None;
        let mut spec = PartialStep::default();
        for (key, value) in map {
            let Some(key) = key.as_str() else {
                return Err(StepwiseError::spec_parse(format!(
                    "step keys must be strings, found {key:?}"
                )));
            };
            match key {
                "as" => spec.alias = Some(from_value(key, value)?),
                "timeout_ms" => spec.timeout_ms = Some(from_value(key, value)?),
                "interval_ms" => spec.interval_ms = Some(from_value(key, value)?),
                "backoff" => spec.backoff = Some(from_value::<BackoffArg>(key, value)?.into_backoff()?),
                name if COMMANDS.contains(&name) => {
                    if let Some((previous, _)) = &command {
                        return Err(StepwiseError::spec_parse(format!(
                            "step has more than one command: `{previous}` and `{name}`"
                        )));
                    }
                    command = Some((name.to_string(), value));
                }
                other => {
                    return Err(StepwiseError::spec_parse(format!(
                        "unknown step key `{other}`; expected a command or one of {}",
                        MODIFIERS.join(", ")
                    )))
                }
            }
        }
        let (name, value) = command.ok_or_else(|| {
            StepwiseError::spec_parse("step has no command; expected one of visit, get, find, contains, click, should, ...")
        })?;
        Ok(Self {
            command: parse_command(&name, value)?,
            alias: spec.alias,
            timeout_ms: spec.timeout_ms,
            interval_ms: spec.interval_ms,
            backoff: spec.backoff,
        })
    }
}

#[derive(Default)]
struct PartialStep {
    alias: Option<String>,
    timeout_ms: Option<u64>,
    interval_ms: Option<u64>,
    backoff: Option<Backoff>,
}

fn from_value<T: serde::de::DeserializeOwned>(key: &str, value: Value) -> StepwiseResult<T> {
    serde_yaml_ng::from_value(value)
        .map_err(|e| StepwiseError::spec_parse(format!("invalid value for `{key}`: {e}")))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BackoffArg {
    Named(String),
    Detailed(Backoff),
}

impl BackoffArg {
    fn into_backoff(self) -> StepwiseResult<Backoff> {
        match self {
            Self::Named(name) => match name.as_str() {
                "fixed" => Ok(Backoff::Fixed),
                "exponential" => Ok(Backoff::exponential()),
                other => Err(StepwiseError::spec_parse(format!(
                    "unknown backoff `{other}`; expected fixed or exponential"
                ))),
            },
            Self::Detailed(backoff) => Ok(backoff),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ContainsArg {
    Text(String),
    Scoped(String, String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TypeArg {
    Text(String),
    Detailed {
        text: String,
        #[serde(default)]
        force: bool,
        #[serde(default)]
        multiple: bool,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ShouldArg {
    Chainer(String),
    List(Vec<serde_json::Value>),
}

fn css(value: &str) -> StepwiseResult<CssSelector> {
    CssSelector::parse(value)
}

fn no_argument(key: &str, value: &Value) -> StepwiseResult<()> {
    if value.is_null() {
        Ok(())
    } else {
        Err(StepwiseError::spec_parse(format!("`{key}` takes no argument")))
    }
}

fn parse_extract(path: &str) -> StepwiseResult<Extract> {
    let (head, name) = path
        .split_once(['.', ':'])
        .map_or((path, None), |(h, n)| (h, Some(n.to_string())));
    match (head, name) {
        ("text", None) => Ok(Extract::Text),
        ("value", None) => Ok(Extract::Value),
        ("length", None) => Ok(Extract::Length),
        ("attr", Some(name)) => Ok(Extract::Attribute(name)),
        ("prop", Some(name)) => Ok(Extract::Property(name)),
        _ => Err(StepwiseError::spec_parse(format!(
            "unknown `its` path `{path}`; expected text, value, length, attr.NAME or prop.NAME"
        ))),
    }
}

fn parse_action(key: &str, value: Value, action: Action) -> StepwiseResult<Command> {
    let options = if value.is_null() {
        ActionOptions::default()
    } else {
        from_value::<ActionOptions>(key, value)?
    };
    Ok(Command::Act { action, options })
}

fn parse_should(key: &str, value: Value) -> StepwiseResult<Command> {
    let expectation = match from_value::<ShouldArg>(key, value)? {
        ShouldArg::Chainer(chainer) => Expectation::from_chainer(&chainer, &[])?,
        ShouldArg::List(items) => {
            let Some((chainer, args)) = items.split_first() else {
                return Err(StepwiseError::spec_parse(format!(
                    "`{key}` needs a chainer, e.g. [contain, Sign in]"
                )));
            };
            let chainer = chainer.as_str().ok_or_else(|| {
                StepwiseError::spec_parse(format!("`{key}` chainer must be a string"))
            })?;
            Expectation::from_chainer(chainer, args)?
        }
    };
    Ok(Command::Should(expectation))
}

fn parse_command(key: &str, value: Value) -> StepwiseResult<Command> {
    let command = match key {
        "visit" => Command::Visit(from_value(key, value)?),
        "get" => Command::Get(Selector::Css(css(&from_value::<String>(key, value)?)?)),
        "get_by_test_id" => Command::Get(Selector::test_id(from_value::<String>(key, value)?)),
        "find" => Command::Find(css(&from_value::<String>(key, value)?)?),
        "contains" => match from_value::<ContainsArg>(key, value)? {
            ContainsArg::Text(text) => Command::Contains { css: None, text },
            ContainsArg::Scoped(selector, text) => Command::Contains {
                css: Some(css(&selector)?),
                text,
            },
        },
        "parents" | "children" => {
            let filter = from_value::<Option<String>>(key, value)?
                .as_deref()
                .map(css)
                .transpose()?;
            Command::Traverse(if key == "parents" {
                Traversal::Parents(filter)
            } else {
                Traversal::Children(filter)
            })
        }
        "parent" | "first" | "last" => {
            no_argument(key, &value)?;
            Command::Traverse(match key {
                "parent" => Traversal::Parent,
                "first" => Traversal::First,
                _ => Traversal::Last,
            })
        }
        "eq" => Command::Traverse(Traversal::Eq(from_value(key, value)?)),
        "its" => Command::Its(parse_extract(&from_value::<String>(key, value)?)?),
        "alias" => Command::Alias(from_value(key, value)?),
        "click" => parse_action(key, value, Action::Click)?,
        "dblclick" => parse_action(key, value, Action::DoubleClick)?,
        "clear" => parse_action(key, value, Action::Clear)?,
        "check" => parse_action(key, value, Action::Check)?,
        "uncheck" => parse_action(key, value, Action::Uncheck)?,
        "type" => match from_value::<TypeArg>(key, value)? {
            TypeArg::Text(text) => Command::Act {
                action: Action::Type { text },
                options: ActionOptions::default(),
            },
            TypeArg::Detailed {
                text,
                force,
                multiple,
            } => Command::Act {
                action: Action::Type { text },
                options: ActionOptions { force, multiple },
            },
        },
        "should" | "and" => parse_should(key, value)?,
        "wait" => Command::Wait(Duration::from_millis(from_value(key, value)?)),
        other => {
            return Err(StepwiseError::spec_parse(format!("unknown command `{other}`")));
        }
    };
    Ok(command)
}

impl SpecFile {
    /// Parse a spec file from YAML
    ///
    /// # Errors
    ///
    /// Returns [`StepwiseError::SpecParse`] naming the offending location.
    pub fn from_yaml(yaml: &str) -> StepwiseResult<Self> {
        let spec: Self =
            serde_yaml_ng::from_str(yaml).map_err(|e| StepwiseError::spec_parse(e.to_string()))?;
        if spec.tests.is_empty() {
            return Err(StepwiseError::spec_parse(format!(
                "suite `{}` has no tests",
                spec.suite
            )));
        }
        Ok(spec)
    }

    /// Load a spec file
    ///
    /// # Errors
    ///
    /// Returns an I/O error or [`StepwiseError::SpecParse`] prefixed with
    /// the file path.
    pub fn load(path: impl AsRef<Path>) -> StepwiseResult<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml).map_err(|e| match e {
            StepwiseError::SpecParse { message } => {
                StepwiseError::spec_parse(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    /// Tests that should run: those marked `only` if any, else all
    /// non-skipped ones. Skipped tests are returned with `false`.
    #[must_use]
    pub fn selected(&self) -> Vec<(&TestSpec, bool)> {
        let focused = self.tests.iter().any(|t| t.only);
        self.tests
            .iter()
            .map(|t| (t, !t.skip && (!focused || t.only)))
            .collect()
    }
}
