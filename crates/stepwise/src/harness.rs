//! Test harness for running suites of chains.
//!
//! Every test gets a fresh driver from the [`DriverFactory`] and a fresh
//! [`ExecutionContext`], so aliases, abort flags and page state never leak
//! between siblings. A failing test stops its own chain only.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::Instrument;

use crate::chain::{execute, ChainError};
use crate::command::Step;
use crate::config::RunConfig;
use crate::context::ExecutionContext;
use crate::driver::{DriverConfig, DriverFactory};
use crate::result::StepwiseError;
use crate::retry::{duration_ms, RetryPolicy};
use crate::specfile::SpecFile;

/// A single test case
#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    /// Test name
    pub name: String,
    /// Steps after the suite's `before_each`
    pub steps: Vec<Step>,
    /// Do not run
    pub skip: bool,
    /// Run only focused tests of the suite
    pub only: bool,
}

impl TestCase {
    /// Create a new test case
    #[must_use]
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            steps,
            skip: false,
            only: false,
        }
    }

    /// Mark as skipped
    #[must_use]
    pub const fn skipped(mut self) -> Self {
        self.skip = true;
        self
    }

    /// Mark as focused
    #[must_use]
    pub const fn focused(mut self) -> Self {
        self.only = true;
        self
    }
}

/// A test suite containing multiple tests
#[derive(Debug, Clone, PartialEq)]
pub struct TestSuite {
    /// Suite name
    pub name: String,
    /// Steps prepended to every test
    pub before_each: Vec<Step>,
    /// Tests in this suite
    pub tests: Vec<TestCase>,
}

impl TestSuite {
    /// Create a new test suite
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            before_each: Vec::new(),
            tests: Vec::new(),
        }
    }

    /// Set the shared setup steps
    #[must_use]
    pub fn with_before_each(mut self, steps: Vec<Step>) -> Self {
        self.before_each = steps;
        self
    }

    /// Add a test case
    pub fn add_test(&mut self, test: TestCase) {
        self.tests.push(test);
    }

    /// Get the number of tests
    #[must_use]
    pub fn test_count(&self) -> usize {
        self.tests.len()
    }

    /// Build from a parsed spec file; step overrides merge with `defaults`
    #[must_use]
    pub fn from_spec(spec: &SpecFile, defaults: &RetryPolicy) -> Self {
        let steps = |specs: &[crate::specfile::StepSpec]| -> Vec<Step> {
            specs.iter().map(|s| s.to_step(defaults)).collect()
        };
        Self {
            name: spec.suite.clone(),
            before_each: steps(&spec.before_each),
            tests: spec
                .tests
                .iter()
                .map(|t| TestCase {
                    name: t.name.clone(),
                    steps: steps(&t.steps),
                    skip: t.skip,
                    only: t.only,
                })
                .collect(),
        }
    }

    fn runs(&self, test: &TestCase) -> bool {
        let focused = self.tests.iter().any(|t| t.only);
        !test.skip && (!focused || test.only)
    }
}

/// Test result status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    /// Test passed
    Passed,
    /// Test failed
    Failed,
    /// Test was skipped
    Skipped,
}

impl TestStatus {
    /// Check if status is passing
    #[must_use]
    pub const fn is_passed(self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Check if status is failing
    #[must_use]
    pub const fn is_failed(self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// Where and why a test stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    /// Index into `before_each` followed by the test's steps
    pub step_index: usize,
    /// Failing command as written
    pub command: String,
    /// Selector or query lineage, when the failure came from a retry loop
    pub selector: Option<String>,
    /// Expectation being waited for
    pub expectation: Option<String>,
    /// Last observed value
    pub actual: Option<String>,
    /// Full message
    pub message: String,
}

impl StepFailure {
    /// Failure before any step could run
    #[must_use]
    pub fn setup(error: &StepwiseError) -> Self {
        Self {
            step_index: 0,
            command: "setup".to_string(),
            selector: None,
            expectation: None,
            actual: None,
            message: error.to_string(),
        }
    }
}

impl From<&ChainError> for StepFailure {
    fn from(err: &ChainError) -> Self {
        let (selector, expectation, actual) = match &err.source {
            StepwiseError::Timeout {
                selector,
                expectation,
                last_observed,
                ..
            } => (
                Some(selector.clone()),
                Some(expectation.clone()),
                Some(last_observed.clone()),
            ),
            StepwiseError::AssertionError {
                selector,
                expectation,
                actual,
                ..
            } => (
                Some(selector.clone()),
                Some(expectation.clone()),
                Some(actual.clone()),
            ),
            StepwiseError::ResolutionEmpty { selector } => (Some(selector.clone()), None, None),
            _ => (None, None, None),
        };
        Self {
            step_index: err.step_index,
            command: err.command.clone(),
            selector,
            expectation,
            actual,
            message: err.source.to_string(),
        }
    }
}

/// Result of running a single test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    /// Test name
    pub name: String,
    /// Outcome
    pub status: TestStatus,
    /// Failure details
    pub failure: Option<StepFailure>,
    /// Steps executed
    pub steps_run: usize,
    /// Test duration
    #[serde(rename = "duration_ms", with = "duration_ms")]
    pub duration: Duration,
}

impl TestResult {
    /// Create a passing test result
    #[must_use]
    pub fn pass(name: impl Into<String>, steps_run: usize) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Passed,
            failure: None,
            steps_run,
            duration: Duration::ZERO,
        }
    }

    /// Create a failing test result
    #[must_use]
    pub fn fail(name: impl Into<String>, failure: StepFailure) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Failed,
            steps_run: failure.step_index,
            failure: Some(failure),
            duration: Duration::ZERO,
        }
    }

    /// Create a skipped test result
    #[must_use]
    pub fn skip(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Skipped,
            failure: None,
            steps_run: 0,
            duration: Duration::ZERO,
        }
    }

    /// Set duration
    #[must_use]
    pub const fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

/// Results from running a test suite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteResults {
    /// Suite name
    pub suite_name: String,
    /// Individual test results
    pub results: Vec<TestResult>,
    /// Total duration
    #[serde(rename = "duration_ms", with = "duration_ms")]
    pub duration: Duration,
}

impl SuiteResults {
    /// Check if no test failed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        !self.results.iter().any(|r| r.status.is_failed())
    }

    /// Count passed tests
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.count(TestStatus::Passed)
    }

    /// Count failed tests
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.count(TestStatus::Failed)
    }

    /// Count skipped tests
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.count(TestStatus::Skipped)
    }

    /// Get total test count
    #[must_use]
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Get failed tests
    #[must_use]
    pub fn failures(&self) -> Vec<&TestResult> {
        self.results.iter().filter(|r| r.status.is_failed()).collect()
    }

    fn count(&self, status: TestStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}

/// What to do after a failing test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureMode {
    /// Run every test (default)
    #[default]
    CollectAll,
    /// Stop the suite at the first failure; remaining tests are skipped
    AndonCord,
}

/// Test harness for running suites
#[derive(Debug, Clone, Default)]
pub struct TestHarness {
    /// Retry policy for steps without an override
    pub policy: RetryPolicy,
    /// Base URL for relative `visit` targets
    pub base_url: Option<String>,
    /// Settings for each new driver
    pub driver_config: DriverConfig,
    /// Behaviour after a failure
    pub failure_mode: FailureMode,
}

impl TestHarness {
    /// Create a new test harness
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Harness configured from a run config
    #[must_use]
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            policy: config.default_policy(),
            base_url: Some(config.base_url.clone()),
            driver_config: config.driver_config(),
            failure_mode: FailureMode::default(),
        }
    }

    /// Set the default retry policy
    #[must_use]
    pub const fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the driver settings
    #[must_use]
    pub const fn with_driver_config(mut self, config: DriverConfig) -> Self {
        self.driver_config = config;
        self
    }

    /// Enable fail-fast mode
    #[must_use]
    pub const fn with_fail_fast(mut self) -> Self {
        self.failure_mode = FailureMode::AndonCord;
        self
    }

    /// Run a test suite
    pub async fn run(&self, suite: &TestSuite, factory: &dyn DriverFactory) -> SuiteResults {
        let span = tracing::info_span!("suite", suite = %suite.name);
        async {
            let start = Instant::now();
            let mut results = Vec::with_capacity(suite.tests.len());
            let mut stopped = false;
            for test in &suite.tests {
                if stopped || !suite.runs(test) {
                    tracing::debug!(test = %test.name, "skipped");
                    results.push(TestResult::skip(&test.name));
                    continue;
                }
                let result = self.run_test(suite, test, factory).await;
                stopped = result.status.is_failed() && self.failure_mode == FailureMode::AndonCord;
                results.push(result);
            }
            SuiteResults {
                suite_name: suite.name.clone(),
                results,
                duration: start.elapsed(),
            }
        }
        .instrument(span)
        .await
    }

    /// Run one test of `suite` in isolation
    pub async fn run_test(
        &self,
        suite: &TestSuite,
        test: &TestCase,
        factory: &dyn DriverFactory,
    ) -> TestResult {
        let span = tracing::info_span!("test", test = %test.name);
        async {
            let start = Instant::now();
            let mut driver = match factory.create(&self.driver_config) {
                Ok(driver) => driver,
                Err(e) => {
                    tracing::warn!(error = %e, "driver could not be created");
                    return TestResult::fail(&test.name, StepFailure::setup(&e))
                        .with_duration(start.elapsed());
                }
            };
            let mut ctx = ExecutionContext::new(driver.as_mut()).with_policy(self.policy);
            if let Some(base) = &self.base_url {
                ctx = ctx.with_base_url(base);
            }
            let steps: Vec<Step> = suite
                .before_each
                .iter()
                .chain(&test.steps)
                .cloned()
                .collect();
            let result = match execute(&mut ctx, &steps).await {
                Ok(outcome) => TestResult::pass(&test.name, outcome.steps_run),
                Err(err) => TestResult::fail(&test.name, StepFailure::from(&err)),
            };
            let result = result.with_duration(start.elapsed());
            tracing::info!(
                status = ?result.status,
                steps = result.steps_run,
                duration_ms = result.duration.as_millis() as u64,
                "test finished"
            );
            result
        }
        .instrument(span)
        .await
    }
}
