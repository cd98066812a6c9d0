//! Declarative expectations evaluated against a subject.
//!
//! An evaluation is a single observation: the retry scheduler calls
//! [`evaluate`] once per poll, and only the last [`Mismatch`] of an exhausted
//! budget becomes a terminal error.

use regex::Regex;
use std::fmt;

use crate::locator::{normalize_whitespace, ElementHandle};
use crate::result::{StepwiseError, StepwiseResult};
use crate::subject::Subject;

/// Regular expression compared by source text
#[derive(Debug, Clone)]
pub struct TextPattern(Regex);

impl TextPattern {
    /// Compile `pattern`
    ///
    /// # Errors
    ///
    /// Returns [`StepwiseError::InvalidExpectation`] for an invalid pattern.
    pub fn new(pattern: &str) -> StepwiseResult<Self> {
        Regex::new(pattern)
            .map(Self)
            .map_err(|e| StepwiseError::invalid_expectation("match", e.to_string()))
    }

    /// Source pattern
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Whether `text` matches
    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }
}

impl PartialEq for TextPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

/// What a `should` step expects of its subject
#[derive(Debug, Clone, PartialEq)]
pub enum Expectation {
    /// Text contains the value
    ContainsText(String),
    /// Text equals the value
    EqualsText(String),
    /// Text matches the pattern
    MatchesText(TextPattern),
    /// Some element is checked
    BeChecked,
    /// Some element is disabled
    BeDisabled,
    /// Some element is enabled
    BeEnabled,
    /// Some element is visible
    BeVisible,
    /// At least one element
    Exist,
    /// Exactly `n` elements (or items of a value)
    HaveLength(usize),
    /// Form value of the first element
    HaveValue(String),
    /// Some element has the class
    HaveClass(String),
    /// First element has the attribute, optionally with a value
    AttributeEquals {
        /// Attribute name
        name: String,
        /// Expected value, `None` for presence only
        value: Option<String>,
    },
    /// First element's property equals a JSON value
    PropertyEquals {
        /// Property name
        name: String,
        /// Expected value
        value: serde_json::Value,
    },
    /// Scalar subject equals a JSON value
    Equals(serde_json::Value),
    /// Negation
    Not(Box<Expectation>),
}

impl Expectation {
    /// Negate this expectation
    #[must_use]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Parse a Chai-style chainer such as `have.text` or `not.be.checked`.
    ///
    /// # Errors
    ///
    /// Returns [`StepwiseError::InvalidExpectation`] for unknown chainers,
    /// missing arguments or invalid patterns.
    pub fn from_chainer(chainer: &str, args: &[serde_json::Value]) -> StepwiseResult<Self> {
        let chainer = chainer.trim();
        if let Some(rest) = chainer.strip_prefix("not.") {
            return Self::from_chainer(rest, args).map(Self::not);
        }
        let text = |i: usize| arg_text(chainer, args, i);
        let expectation = match chainer {
            "contain" | "include" | "contain.text" | "include.text" | "have.text.contain" => {
                Self::ContainsText(text(0)?)
            }
            "have.text" => Self::EqualsText(text(0)?),
            "match" => Self::MatchesText(TextPattern::new(&text(0)?)?),
            "be.checked" => Self::BeChecked,
            "be.disabled" => Self::BeDisabled,
            "be.enabled" => Self::BeEnabled,
            "be.visible" => Self::BeVisible,
            "be.hidden" => Self::BeVisible.not(),
            "exist" => Self::Exist,
            "have.length" => {
                let count = args
                    .first()
                    .and_then(serde_json::Value::as_u64)
                    .and_then(|n| usize::try_from(n).ok())
                    .ok_or_else(|| {
                        StepwiseError::invalid_expectation(chainer, "expected a non-negative count")
                    })?;
                Self::HaveLength(count)
            }
            "have.value" => Self::HaveValue(text(0)?),
            "have.class" => Self::HaveClass(text(0)?),
            "have.attr" => Self::AttributeEquals {
                name: text(0)?,
                value: if args.len() > 1 { Some(text(1)?) } else { None },
            },
            "have.prop" => Self::PropertyEquals {
                name: text(0)?,
                value: args.get(1).cloned().ok_or_else(|| {
                    StepwiseError::invalid_expectation(chainer, "expected a property value")
                })?,
            },
            "eq" | "equal" => Self::Equals(args.first().cloned().ok_or_else(|| {
                StepwiseError::invalid_expectation(chainer, "expected a value")
            })?),
            _ => {
                return Err(StepwiseError::invalid_expectation(
                    chainer,
                    "unknown chainer",
                ))
            }
        };
        Ok(expectation)
    }

    /// Passes when nothing (or a given count of nothing) is found.
    ///
    /// The query before such an assertion must not wait for elements.
    #[must_use]
    pub fn is_absence(&self) -> bool {
        match self {
            Self::HaveLength(0) => true,
            Self::Not(inner) => matches!(**inner, Self::Exist),
            _ => false,
        }
    }
}

fn arg_text(chainer: &str, args: &[serde_json::Value], index: usize) -> StepwiseResult<String> {
    match args.get(index) {
        Some(serde_json::Value::String(s)) => Ok(s.clone()),
        Some(serde_json::Value::Null) | None => Err(StepwiseError::invalid_expectation(
            chainer,
            format!("missing argument {}", index + 1),
        )),
        Some(other) => Ok(other.to_string()),
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContainsText(t) => write!(f, "contain {t:?}"),
            Self::EqualsText(t) => write!(f, "have text {t:?}"),
            Self::MatchesText(p) => write!(f, "match /{}/", p.as_str()),
            Self::BeChecked => write!(f, "be checked"),
            Self::BeDisabled => write!(f, "be disabled"),
            Self::BeEnabled => write!(f, "be enabled"),
            Self::BeVisible => write!(f, "be visible"),
            Self::Exist => write!(f, "exist"),
            Self::HaveLength(n) => write!(f, "have length {n}"),
            Self::HaveValue(v) => write!(f, "have value {v:?}"),
            Self::HaveClass(c) => write!(f, "have class {c:?}"),
            Self::AttributeEquals { name, value: None } => write!(f, "have attribute {name:?}"),
            Self::AttributeEquals {
                name,
                value: Some(v),
            } => write!(f, "have attribute {name}={v:?}"),
            Self::PropertyEquals { name, value } => write!(f, "have property {name} = {value}"),
            Self::Equals(v) => write!(f, "equal {v}"),
            Self::Not(inner) => write!(f, "not {inner}"),
        }
    }
}

/// Expected and last-observed value of a failed evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// Expected value or state
    pub expected: String,
    /// Observed value or state
    pub actual: String,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {}, but found {}", self.expected, self.actual)
    }
}

/// Evaluate `expectation` against `subject` once.
///
/// State expectations pass when any element of the set satisfies them.
/// Apart from absence checks, an empty element set fails every expectation,
/// negated ones included.
///
/// # Errors
///
/// Returns the [`Mismatch`] observed by this evaluation.
pub fn evaluate(subject: &Subject, expectation: &Expectation) -> Result<(), Mismatch> {
    let observation = observe(subject, expectation);
    if observation.passed {
        Ok(())
    } else {
        Err(Mismatch {
            expected: observation.expected,
            actual: observation.actual,
        })
    }
}

struct Observation {
    passed: bool,
    expected: String,
    actual: String,
}

impl Observation {
    fn new(passed: bool, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            passed,
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

fn observe(subject: &Subject, expectation: &Expectation) -> Observation {
    let empty_set = subject.elements().is_some_and(<[ElementHandle]>::is_empty);
    match expectation {
        Expectation::Not(inner) => {
            let allows_empty = matches!(**inner, Expectation::Exist | Expectation::HaveLength(_));
            let obs = observe(subject, inner);
            if empty_set && !allows_empty {
                return Observation::new(false, format!("not {}", obs.expected), "no elements");
            }
            Observation::new(!obs.passed, format!("not {}", obs.expected), obs.actual)
        }
        Expectation::Exist => match subject {
            Subject::Elements(els) => Observation::new(
                !els.is_empty(),
                "at least one element",
                format!("{} element(s)", els.len()),
            ),
            Subject::Value(v) => Observation::new(!v.is_null(), "a value", v.to_string()),
            Subject::Attribute { value, .. } => {
                Observation::new(value.is_some(), "a value", subject.to_string())
            }
            Subject::None => Observation::new(false, "a subject", "nothing"),
        },
        Expectation::HaveLength(n) => {
            let len = match subject {
                Subject::Elements(els) => Some(els.len()),
                Subject::Value(serde_json::Value::Array(items)) => Some(items.len()),
                Subject::Value(serde_json::Value::String(s)) => Some(s.chars().count()),
                _ => None,
            };
            match len {
                Some(len) => Observation::new(len == *n, format!("length {n}"), format!("length {len}")),
                None => Observation::new(false, format!("length {n}"), subject.kind()),
            }
        }
        Expectation::ContainsText(_) | Expectation::EqualsText(_) | Expectation::MatchesText(_) => {
            observe_text(subject, expectation)
        }
        _ => match subject.elements() {
            Some([]) => Observation::new(false, expected_state(expectation), "no elements"),
            Some(els) => observe_elements(els, expectation),
            None => observe_scalar(subject, expectation),
        },
    }
}

fn observe_text(subject: &Subject, expectation: &Expectation) -> Observation {
    let expected = match expectation {
        Expectation::ContainsText(t) | Expectation::EqualsText(t) => {
            format!("{:?}", normalize_whitespace(t))
        }
        Expectation::MatchesText(p) => format!("/{}/", p.as_str()),
        _ => expectation.to_string(),
    };
    if subject.elements().is_some_and(<[ElementHandle]>::is_empty) {
        return Observation::new(false, expected, "no elements");
    }
    let Some(text) = subject.text() else {
        return Observation::new(false, expected, subject.kind());
    };
    let passed = match expectation {
        Expectation::ContainsText(t) => text.contains(&normalize_whitespace(t)),
        Expectation::EqualsText(t) => text == normalize_whitespace(t),
        Expectation::MatchesText(p) => p.is_match(&text),
        _ => false,
    };
    Observation::new(passed, expected, format!("{text:?}"))
}

fn expected_state(expectation: &Expectation) -> String {
    match expectation {
        Expectation::BeChecked => "checked".into(),
        Expectation::BeDisabled => "disabled".into(),
        Expectation::BeEnabled => "enabled".into(),
        Expectation::BeVisible => "visible".into(),
        Expectation::HaveValue(v) => format!("value {v:?}"),
        Expectation::HaveClass(c) => format!("class {c:?}"),
        Expectation::AttributeEquals { name, value: None } => format!("attribute {name:?}"),
        Expectation::AttributeEquals {
            name,
            value: Some(v),
        } => format!("{name}={v:?}"),
        Expectation::PropertyEquals { name, value } => format!("{name} = {value}"),
        Expectation::Equals(v) => v.to_string(),
        other => other.to_string(),
    }
}

fn observe_elements(els: &[ElementHandle], expectation: &Expectation) -> Observation {
    let expected = expected_state(expectation);
    let flag = |on: &str, off: &str, test: fn(&ElementHandle) -> bool| {
        let passed = els.iter().any(test);
        Observation::new(passed, expected.clone(), if passed { on } else { off })
    };
    let first = &els[0];
    match expectation {
        Expectation::BeChecked => flag("checked", "unchecked", |e| e.checked),
        Expectation::BeDisabled => flag("disabled", "enabled", |e| e.disabled),
        Expectation::BeEnabled => flag("enabled", "disabled", |e| !e.disabled),
        Expectation::BeVisible => flag("visible", "hidden", |e| e.visible),
        Expectation::HaveClass(class) => Observation::new(
            els.iter().any(|e| e.has_class(class)),
            expected,
            format!("class {:?}", first.attr("class").unwrap_or_default()),
        ),
        Expectation::HaveValue(v) => {
            let actual = first.form_value().unwrap_or_default();
            Observation::new(actual == v, expected, format!("value {actual:?}"))
        }
        Expectation::AttributeEquals { name, value } => match (first.attr(name), value) {
            (None, _) => Observation::new(false, expected, format!("no {name:?} attribute")),
            (Some(_), None) => Observation::new(true, expected.clone(), expected),
            (Some(actual), Some(want)) => {
                Observation::new(actual == want, expected, format!("{name}={actual:?}"))
            }
        },
        Expectation::PropertyEquals { name, value } => match first.property(name) {
            Some(actual) => Observation::new(actual == *value, expected, format!("{name} = {actual}")),
            None => Observation::new(false, expected, format!("no {name} property")),
        },
        Expectation::Equals(_) => {
            Observation::new(false, expected, format!("{} element(s)", els.len()))
        }
        _ => Observation::new(false, expected, "an element set"),
    }
}

fn observe_scalar(subject: &Subject, expectation: &Expectation) -> Observation {
    let expected = expected_state(expectation);
    match (expectation, subject) {
        (Expectation::Equals(want), Subject::Value(actual)) => {
            Observation::new(actual == want, expected, actual.to_string())
        }
        (Expectation::Equals(want), Subject::Attribute { value, .. }) => {
            let passed = match (value, want) {
                (Some(actual), serde_json::Value::String(w)) => actual == w,
                (None, serde_json::Value::Null) => true,
                (Some(actual), other) => *actual == other.to_string(),
                (None, _) => false,
            };
            Observation::new(passed, expected, subject.to_string())
        }
        _ => Observation::new(false, expected, subject.kind()),
    }
}
