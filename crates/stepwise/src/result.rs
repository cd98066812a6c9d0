//! Result and error types for Stepwise.

use thiserror::Error;

/// Result type for Stepwise operations
pub type StepwiseResult<T> = Result<T, StepwiseError>;

/// Errors that can occur while resolving, retrying and executing chains
#[derive(Debug, Error)]
pub enum StepwiseError {
    /// Selector text is not valid for the supported grammar
    #[error("Invalid selector `{selector}`: {message}")]
    InvalidSelector {
        /// Selector source text
        selector: String,
        /// Parser message
        message: String,
    },

    /// No element matched. Only terminal when surfaced outside a retry loop.
    #[error("No elements matched `{selector}`")]
    ResolutionEmpty {
        /// Selector (or query lineage) that matched nothing
        selector: String,
    },

    /// A retry loop exhausted its budget
    #[error("Timed out after {ms}ms ({attempts} attempt(s)) waiting for {selector} to {expectation}; last observed: {last_observed}")]
    Timeout {
        /// Budget in milliseconds
        ms: u64,
        /// Number of polls performed
        attempts: u32,
        /// Selector (or query lineage) being polled
        selector: String,
        /// What the loop was waiting for
        expectation: String,
        /// Last observed, unsatisfying state
        last_observed: String,
    },

    /// Assertion still failing when its retry budget ran out
    #[error("Assertion failed after {ms}ms: {selector} should {expectation}; expected {expected}, but found {actual}")]
    AssertionError {
        /// Selector (or query lineage) of the asserted subject
        selector: String,
        /// Expectation as written, e.g. `have text "Email"`
        expectation: String,
        /// Expected value or state
        expected: String,
        /// Last observed value or state
        actual: String,
        /// Budget in milliseconds
        ms: u64,
    },

    /// Chai-style chainer or its arguments are not understood
    #[error("Invalid expectation `{chainer}`: {message}")]
    InvalidExpectation {
        /// Chainer text, e.g. `have.attr`
        chainer: String,
        /// What is wrong with it
        message: String,
    },

    /// Alias fetched before it was stored
    #[error("Unknown alias `@{name}`; aliases must be stored with `as` before use")]
    UnknownAlias {
        /// Alias name without the `@` prefix
        name: String,
    },

    /// Step skipped because the chain already failed or was cancelled
    #[error("Chain aborted before step {step_index}")]
    ChainAborted {
        /// Index of the first step that did not run
        step_index: usize,
    },

    /// Command cannot operate on the current subject
    #[error("`{command}` cannot be applied to {found}")]
    InvalidSubject {
        /// Command that was attempted
        command: String,
        /// Description of the subject it received
        found: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Host driver rejected an action or query
    #[error("Driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// Declarative spec file could not be parsed
    #[error("Spec parse error: {message}")]
    SpecParse {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StepwiseError {
    /// Create an invalid selector error
    #[must_use]
    pub fn invalid_selector(selector: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSelector {
            selector: selector.into(),
            message: message.into(),
        }
    }

    /// Create an invalid expectation error
    #[must_use]
    pub fn invalid_expectation(chainer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidExpectation {
            chainer: chainer.into(),
            message: message.into(),
        }
    }

    /// Create a driver error
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Create a spec parse error
    #[must_use]
    pub fn spec_parse(message: impl Into<String>) -> Self {
        Self::SpecParse {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether a retry loop may poll again after observing this error.
    ///
    /// Only an empty resolution is transient; everything else is terminal.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::ResolutionEmpty { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assertion_error_mentions_expected_and_actual() {
        let err = StepwiseError::AssertionError {
            selector: "label".into(),
            expectation: "have text \"Email address\"".into(),
            expected: "text \"Email address\"".into(),
            actual: "\"Email\"".into(),
            ms: 4000,
        };
        let msg = err.to_string();
        assert!(msg.contains("label"));
        assert!(msg.contains("Email address"));
        assert!(msg.contains("\"Email\""));
    }

    #[test]
    fn test_timeout_mentions_last_observed() {
        let err = StepwiseError::Timeout {
            ms: 100,
            attempts: 3,
            selector: "`#submit`".into(),
            expectation: "be actionable".into(),
            last_observed: "element is disabled".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("100ms"));
        assert!(msg.contains("3 attempt(s)"));
        assert!(msg.contains("element is disabled"));
    }

    #[test]
    fn test_only_resolution_empty_is_recoverable() {
        assert!(StepwiseError::ResolutionEmpty {
            selector: "x".into()
        }
        .is_recoverable());
        assert!(!StepwiseError::UnknownAlias { name: "x".into() }.is_recoverable());
        assert!(!StepwiseError::driver("boom").is_recoverable());
    }

    #[test]
    fn test_unknown_alias_display() {
        let err = StepwiseError::UnknownAlias {
            name: "email".into(),
        };
        assert!(err.to_string().contains("@email"));
    }
}
