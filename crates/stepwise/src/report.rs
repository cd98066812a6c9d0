//! Run reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::harness::SuiteResults;
use crate::result::StepwiseResult;

/// Aggregate counts over every suite of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    /// Tests seen
    pub tests: usize,
    /// Passed tests
    pub passed: usize,
    /// Failed tests
    pub failed: usize,
    /// Skipped tests
    pub skipped: usize,
}

/// Results of one `stepwise run`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique run identifier
    pub run_id: Uuid,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: Option<DateTime<Utc>>,
    /// Per-suite results
    pub suites: Vec<SuiteResults>,
    /// Aggregate counts
    pub totals: Totals,
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

impl RunReport {
    /// Start a report now
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            suites: Vec::new(),
            totals: Totals::default(),
        }
    }

    /// Record a finished suite
    pub fn add_suite(&mut self, suite: SuiteResults) {
        self.totals.tests += suite.total();
        self.totals.passed += suite.passed_count();
        self.totals.failed += suite.failed_count();
        self.totals.skipped += suite.skipped_count();
        self.suites.push(suite);
    }

    /// Stamp the finish time
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// No test failed
    #[must_use]
    pub const fn success(&self) -> bool {
        self.totals.failed == 0
    }

    /// Serialize as pretty JSON
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> StepwiseResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write pretty JSON to `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_json(&self, path: impl AsRef<Path>) -> StepwiseResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
