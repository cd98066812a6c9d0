//! Output formatting and progress reporting

use console::{style, Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use stepwise::{TestResult, TestStatus, Totals};

/// Output format for test results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON report on stdout
    Json,
}

/// Lines describing where and why a test failed.
///
/// Empty for tests that did not fail.
#[must_use]
pub fn failure_lines(result: &TestResult) -> Vec<String> {
    let Some(failure) = &result.failure else {
        return Vec::new();
    };
    let mut lines = vec![format!("step {}: {}", failure.step_index, failure.command)];
    if let Some(selector) = &failure.selector {
        lines.push(format!("subject:  {selector}"));
    }
    if let Some(expectation) = &failure.expectation {
        lines.push(format!("expected: {expectation}"));
    }
    if let Some(actual) = &failure.actual {
        lines.push(format!("actual:   {actual}"));
    }
    lines.push(failure.message.clone());
    lines
}

/// Progress reporter for test execution
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    progress_bar: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stdout(),
            progress_bar: None,
            use_color,
            quiet,
        }
    }

    fn emit(&self, line: &str) {
        match &self.progress_bar {
            Some(pb) => pb.suspend(|| {
                let _ = self.term.write_line(line);
            }),
            None => {
                let _ = self.term.write_line(line);
            }
        }
    }

    /// Start a progress bar over `total` spec files
    pub fn start_progress(&mut self, total: u64, message: &str) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message(message.to_string());
        self.progress_bar = Some(pb);
    }

    /// Increment progress
    pub fn increment(&self, delta: u64) {
        if let Some(ref pb) = self.progress_bar {
            pb.inc(delta);
        }
    }

    /// Update progress message
    pub fn set_message(&self, message: &str) {
        if let Some(ref pb) = self.progress_bar {
            pb.set_message(message.to_string());
        }
    }

    /// Clear the progress bar
    pub fn finish(&mut self) {
        if let Some(pb) = self.progress_bar.take() {
            pb.finish_and_clear();
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "PASS".to_string()
        };

        self.emit(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Failures print even in quiet mode
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };

        self.emit(&format!("{prefix} {message}"));
    }

    /// Print a skipped test
    pub fn skipped(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("-").yellow().to_string()
        } else {
            "SKIP".to_string()
        };

        self.emit(&format!("{prefix} {message}"));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("ℹ").blue().bold().to_string()
        } else {
            "INFO".to_string()
        };

        self.emit(&format!("{prefix} {message}"));
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }

        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };

        self.emit("");
        self.emit(&styled);
    }

    /// Print one test outcome, with failure detail indented below it
    pub fn test_result(&self, result: &TestResult) {
        let label = format!("{} ({}ms)", result.name, result.duration.as_millis());
        match result.status {
            TestStatus::Passed => self.success(&label),
            TestStatus::Skipped => self.skipped(&result.name),
            TestStatus::Failed => {
                self.failure(&label);
                let dim = Style::new().dim();
                for line in failure_lines(result) {
                    if self.use_color {
                        self.emit(&format!("    {}", dim.apply_to(line)));
                    } else {
                        self.emit(&format!("    {line}"));
                    }
                }
            }
        }
    }

    /// Print test summary
    pub fn summary(&self, totals: &Totals, duration: Duration) {
        let Totals {
            tests,
            passed,
            failed,
            skipped,
        } = *totals;
        if self.quiet && failed == 0 {
            return;
        }

        self.emit("");

        let duration_secs = duration.as_secs_f64();

        if self.use_color {
            let passed_style = Style::new().green().bold();
            let failed_style = Style::new().red().bold();
            let skipped_style = Style::new().yellow();

            let status = if failed > 0 {
                failed_style.apply_to("FAILED")
            } else {
                passed_style.apply_to("PASSED")
            };

            self.emit(&format!(
                "{} {} tests in {:.2}s ({} passed, {} failed, {} skipped)",
                status,
                tests,
                duration_secs,
                passed_style.apply_to(passed),
                if failed > 0 {
                    failed_style.apply_to(failed).to_string()
                } else {
                    failed.to_string()
                },
                skipped_style.apply_to(skipped)
            ));
        } else {
            let status = if failed > 0 { "FAILED" } else { "PASSED" };
            self.emit(&format!(
                "{status} {tests} tests in {duration_secs:.2}s ({passed} passed, {failed} failed, {skipped} skipped)"
            ));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use stepwise::StepFailure;

    fn failed() -> TestResult {
        TestResult::fail(
            "label text",
            StepFailure {
                step_index: 6,
                command: "should(have text \"Email\")".into(),
                selector: Some("get([for=\"exampleInputEmail1\"])".into()),
                expectation: Some("have text \"Email\"".into()),
                actual: Some("\"Email address\"".into()),
                message: "Assertion failed after 300ms".into(),
            },
        )
    }

    mod failure_lines_tests {
        use super::*;

        #[test]
        fn test_failure_lines_name_step_subject_and_values() {
            let lines = failure_lines(&failed());
            assert_eq!(lines[0], "step 6: should(have text \"Email\")");
            assert_eq!(lines[1], "subject:  get([for=\"exampleInputEmail1\"])");
            assert_eq!(lines[2], "expected: have text \"Email\"");
            assert_eq!(lines[3], "actual:   \"Email address\"");
            assert_eq!(lines[4], "Assertion failed after 300ms");
        }

        #[test]
        fn test_setup_failure_omits_missing_parts() {
            let mut result = failed();
            if let Some(failure) = result.failure.as_mut() {
                failure.selector = None;
                failure.expectation = None;
                failure.actual = None;
            }
            assert_eq!(failure_lines(&result).len(), 2);
        }

        #[test]
        fn test_passing_result_has_no_lines() {
            assert!(failure_lines(&TestResult::pass("ok", 3)).is_empty());
        }
    }

    mod progress_reporter_tests {
        use super::*;

        #[test]
        fn test_new_reporter() {
            let reporter = ProgressReporter::new(true, false);
            assert!(reporter.use_color);
            assert!(!reporter.quiet);
        }

        #[test]
        fn test_default_format() {
            assert_eq!(OutputFormat::default(), OutputFormat::Text);
        }

        #[test]
        fn test_test_result_each_status() {
            let reporter = ProgressReporter::new(false, false);
            reporter.test_result(&TestResult::pass("a", 2));
            reporter.test_result(&TestResult::skip("b"));
            reporter.test_result(&failed());
        }

        #[test]
        fn test_summary() {
            let reporter = ProgressReporter::new(false, false);
            let totals = Totals {
                tests: 3,
                passed: 1,
                failed: 1,
                skipped: 1,
            };
            reporter.summary(&totals, Duration::from_secs(3));
        }

        #[test]
        fn test_progress_bar_lifecycle() {
            let mut reporter = ProgressReporter::new(false, false);
            reporter.start_progress(2, "Running specs");
            reporter.set_message("forms.spec.yaml");
            reporter.info("between updates");
            reporter.increment(1);
            reporter.finish();
            assert!(reporter.progress_bar.is_none());
        }

        #[test]
        fn test_quiet_mode_skips_progress_bar() {
            let mut reporter = ProgressReporter::new(false, true);
            reporter.start_progress(10, "Running specs");
            assert!(reporter.progress_bar.is_none());
            reporter.failure("shown");
        }
    }
}
