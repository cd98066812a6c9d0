//! Run configuration (`stepwise.yaml`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::driver::DriverConfig;
use crate::result::{StepwiseError, StepwiseResult};
use crate::retry::{Backoff, RetryPolicy, DEFAULT_COMMAND_TIMEOUT_MS, DEFAULT_POLL_INTERVAL_MS};

/// Default base URL
pub const DEFAULT_BASE_URL: &str = "http://localhost:4200";

/// Default spec discovery pattern
pub const DEFAULT_SPEC_PATTERN: &str = "**/*.spec.yaml";

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

const fn default_viewport_width() -> u32 {
    1920
}

const fn default_viewport_height() -> u32 {
    1080
}

const fn default_command_timeout_ms() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_MS
}

const fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_spec_pattern() -> Vec<String> {
    vec![DEFAULT_SPEC_PATTERN.to_string()]
}

/// Settings shared by every test of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Base URL for relative `visit` targets
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Viewport width
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,
    /// Viewport height
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,
    /// Budget per command
    #[serde(default = "default_command_timeout_ms")]
    pub default_command_timeout_ms: u64,
    /// Pause between polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Pause growth
    #[serde(default)]
    pub backoff: Backoff,
    /// Spec files to run
    #[serde(default = "default_spec_pattern")]
    pub spec_pattern: Vec<String>,
    /// Spec files to leave out
    #[serde(default)]
    pub exclude_spec_pattern: Vec<String>,
    /// Fixture site, relative to the config file
    #[serde(default)]
    pub fixtures: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            default_command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            backoff: Backoff::Fixed,
            spec_pattern: default_spec_pattern(),
            exclude_spec_pattern: Vec::new(),
            fixtures: None,
        }
    }
}

impl RunConfig {
    /// Create new config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from YAML
    ///
    /// # Errors
    ///
    /// Returns [`StepwiseError::Config`] on invalid YAML or values.
    pub fn from_yaml(yaml: &str) -> StepwiseResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)
            .map_err(|e| StepwiseError::config(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file. A relative `fixtures` path is resolved against
    /// the directory of `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error or [`StepwiseError::Config`].
    pub fn load(path: impl AsRef<Path>) -> StepwiseResult<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&yaml).map_err(|e| match e {
            StepwiseError::Config { message } => {
                StepwiseError::config(format!("{}: {message}", path.display()))
            }
            other => other,
        })?;
        if let (Some(fixtures), Some(dir)) = (&config.fixtures, path.parent()) {
            if fixtures.is_relative() {
                config.fixtures = Some(dir.join(fixtures));
            }
        }
        Ok(config)
    }

    /// Serialize to YAML
    ///
    /// # Errors
    ///
    /// Returns [`StepwiseError::Config`] if serialization fails.
    pub fn to_yaml(&self) -> StepwiseResult<String> {
        serde_yaml_ng::to_string(self).map_err(|e| StepwiseError::config(e.to_string()))
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns [`StepwiseError::Config`] describing the first bad value.
    pub fn validate(&self) -> StepwiseResult<()> {
        if self.default_command_timeout_ms == 0 {
            return Err(StepwiseError::config(
                "default_command_timeout_ms must be greater than zero",
            ));
        }
        if self.viewport_width == 0 || self.viewport_height == 0 {
            return Err(StepwiseError::config("viewport dimensions must be non-zero"));
        }
        if let Backoff::Exponential { factor, .. } = self.backoff {
            if factor.is_nan() || factor < 1.0 {
                return Err(StepwiseError::config(format!(
                    "backoff factor must be at least 1.0, got {factor}"
                )));
            }
        }
        if self.spec_pattern.is_empty() {
            return Err(StepwiseError::config("spec_pattern must not be empty"));
        }
        Ok(())
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the viewport
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set the per-command budget
    #[must_use]
    pub const fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.default_command_timeout_ms = ms;
        self
    }

    /// Set the poll interval
    #[must_use]
    pub const fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the backoff
    #[must_use]
    pub const fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Replace the spec patterns
    #[must_use]
    pub fn with_spec_pattern(mut self, patterns: Vec<String>) -> Self {
        self.spec_pattern = patterns;
        self
    }

    /// Add an exclude pattern
    #[must_use]
    pub fn with_exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_spec_pattern.push(pattern.into());
        self
    }

    /// Set the fixture site path
    #[must_use]
    pub fn with_fixtures(mut self, path: impl Into<PathBuf>) -> Self {
        self.fixtures = Some(path.into());
        self
    }

    /// Retry policy for steps without an override
    #[must_use]
    pub const fn default_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(self.default_command_timeout_ms),
            Duration::from_millis(self.poll_interval_ms),
        )
        .with_backoff(self.backoff)
    }

    /// Settings handed to each new driver
    #[must_use]
    pub const fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            viewport_width: self.viewport_width,
            viewport_height: self.viewport_height,
        }
    }
}
