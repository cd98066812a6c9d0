//! Test runner implementation

use crate::commands::RunArgs;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::{OutputFormat, ProgressReporter};
use crate::specs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use stepwise::{FixtureDriverFactory, FixtureSite, RunConfig, RunReport, SpecFile, TestHarness, TestSuite};

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "stepwise.yaml";

/// A run config together with where it came from
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Effective configuration
    pub config: RunConfig,
    /// Directory relative spec patterns resolve against
    pub root: PathBuf,
    /// File the config was read from, if any
    pub source: Option<PathBuf>,
}

/// Load `path`, or `./stepwise.yaml` when present, or the defaults.
///
/// An explicit path that does not exist is an error.
pub fn load_config(path: Option<&Path>) -> CliResult<LoadedConfig> {
    let source = match path {
        Some(path) if !path.is_file() => {
            return Err(CliError::config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        Some(path) => Some(path.to_path_buf()),
        None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.is_file()),
    };
    match source {
        Some(source) => {
            let config = RunConfig::load(&source)?;
            let root = source.parent().map(Path::to_path_buf).unwrap_or_default();
            tracing::debug!(config = %source.display(), "loaded config");
            Ok(LoadedConfig {
                config,
                root,
                source: Some(source),
            })
        }
        None => Ok(LoadedConfig {
            config: RunConfig::default(),
            root: PathBuf::new(),
            source: None,
        }),
    }
}

/// Runs discovered spec files against the fixture host
#[derive(Debug)]
pub struct TestRunner {
    config: CliConfig,
    reporter: ProgressReporter,
    format: OutputFormat,
}

impl TestRunner {
    /// Create a new test runner
    #[must_use]
    pub fn new(config: CliConfig) -> Self {
        let reporter =
            ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
        Self {
            config,
            reporter,
            format: OutputFormat::Text,
        }
    }

    /// Set the result output format
    #[must_use]
    pub const fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Discover, parse and run every spec file selected by `args`.
    ///
    /// All files are parsed before any runs; a parse error stops the run.
    /// Failing tests do not make this an error; check [`RunReport::success`].
    ///
    /// # Errors
    ///
    /// Returns an error if configuration, discovery, parsing or the fixture
    /// site fail, or the JSON report cannot be written.
    pub async fn run(&mut self, args: &RunArgs) -> CliResult<RunReport> {
        let started = Instant::now();
        let loaded = load_config(args.config.as_deref())?;
        let mut config = loaded.config;
        if let Some(ms) = args.timeout {
            config = config.with_timeout_ms(ms);
        }
        if let Some(fixtures) = &args.fixtures {
            config = config.with_fixtures(fixtures);
        }
        config.validate()?;

        let (patterns, root) = if args.specs.is_empty() {
            (config.spec_pattern.clone(), loaded.root)
        } else {
            (args.specs.clone(), PathBuf::new())
        };
        let files = specs::discover(&root, &patterns, &config.exclude_spec_pattern)?;
        if files.is_empty() {
            return Err(CliError::discovery(format!(
                "no spec files matched {}",
                patterns.join(", ")
            )));
        }
        let parsed = self.parse(&files)?;

        let fixtures = config.fixtures.as_ref().ok_or_else(|| {
            CliError::config("no fixture site configured; set `fixtures` or pass --fixtures")
        })?;
        let factory = FixtureDriverFactory::new(FixtureSite::load(fixtures)?);
        let mut harness = TestHarness::from_config(&config);
        if args.fail_fast {
            harness = harness.with_fail_fast();
        }
        let policy = config.default_policy();

        let text = self.format == OutputFormat::Text;
        if self.config.verbosity.is_verbose() && text {
            self.reporter.info(&format!(
                "{} spec file(s), base url {}, timeout {}ms",
                parsed.len(),
                config.base_url,
                config.default_command_timeout_ms
            ));
        }
        if text {
            self.reporter.start_progress(parsed.len() as u64, "Running specs");
        }

        let mut report = RunReport::new();
        for (path, spec) in &parsed {
            self.reporter.set_message(&path.display().to_string());
            let suite = TestSuite::from_spec(spec, &policy);
            let results = harness.run(&suite, &factory).await;
            if text {
                self.reporter
                    .header(&format!("{} ({})", suite.name, path.display()));
                for result in &results.results {
                    self.reporter.test_result(result);
                }
            }
            report.add_suite(results);
            self.reporter.increment(1);
        }
        self.reporter.finish();
        report.finish();

        if let Some(path) = &args.json {
            report.write_json(path)?;
            tracing::info!(path = %path.display(), "wrote JSON report");
        }
        match self.format {
            OutputFormat::Text => self.reporter.summary(&report.totals, started.elapsed()),
            OutputFormat::Json => println!("{}", report.to_json()?),
        }
        Ok(report)
    }

    fn parse(&self, files: &[PathBuf]) -> CliResult<Vec<(PathBuf, SpecFile)>> {
        let mut parsed = Vec::with_capacity(files.len());
        let mut errors = 0;
        for (path, outcome) in specs::parse_all(files) {
            match outcome {
                Ok(spec) => parsed.push((path, spec)),
                Err(err) => {
                    errors += 1;
                    self.reporter.failure(&err.to_string());
                }
            }
        }
        if errors > 0 {
            return Err(CliError::InvalidSpecs { count: errors });
        }
        Ok(parsed)
    }
}
