//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Spec discovery found nothing or a pattern was malformed
    #[error("Spec discovery failed: {message}")]
    Discovery {
        /// Error message
        message: String,
    },

    /// One or more spec files could not be parsed
    #[error("{count} spec file(s) failed to parse")]
    InvalidSpecs {
        /// Number of files with errors
        count: usize,
    },

    /// At least one test failed
    #[error("{failed} of {total} test(s) failed")]
    TestsFailed {
        /// Failed tests
        failed: usize,
        /// Tests seen
        total: usize,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stepwise library error
    #[error("{0}")]
    Stepwise(#[from] stepwise::StepwiseError),

    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a discovery error
    #[must_use]
    pub fn discovery(message: impl Into<String>) -> Self {
        Self::Discovery {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

impl From<glob::PatternError> for CliError {
    fn from(err: glob::PatternError) -> Self {
        Self::discovery(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error() {
        let err = CliError::config("bad config");
        assert!(err.to_string().contains("Configuration"));
        assert!(err.to_string().contains("bad config"));
    }

    #[test]
    fn test_tests_failed_counts() {
        let err = CliError::TestsFailed {
            failed: 2,
            total: 9,
        };
        assert_eq!(err.to_string(), "2 of 9 test(s) failed");
    }

    #[test]
    fn test_invalid_argument_error() {
        let err = CliError::invalid_argument("bad arg");
        assert!(err.to_string().contains("Invalid argument"));
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let cli_err: CliError = io_err.into();
        assert!(cli_err.to_string().contains("I/O"));
    }

    #[test]
    fn test_library_error_passes_through() {
        let err: CliError = stepwise::StepwiseError::spec_parse("no command").into();
        assert_eq!(err.to_string(), "Spec parse error: no command");
    }

    #[test]
    fn test_glob_pattern_error_from() {
        let err: CliError = glob::Pattern::new("[").unwrap_err().into();
        assert!(err.to_string().contains("Spec discovery"));
    }
}
