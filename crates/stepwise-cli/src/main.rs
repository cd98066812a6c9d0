//! Stepwise CLI: run declarative end-to-end spec files
//!
//! ## Usage
//!
//! ```bash
//! stepwise run                                  # Specs from ./stepwise.yaml
//! stepwise run -c demos/stepwise.yaml --json out.json
//! stepwise check demos/specs/**/*.spec.yaml     # Parse only
//! stepwise config                               # Effective configuration
//! ```

use clap::Parser;
use std::process::ExitCode;
use stepwise_cli::{
    load_config, specs, CheckArgs, Cli, CliConfig, CliError, CliResult, Commands, ConfigArgs,
    ProgressReporter, RunArgs, TestRunner, Verbosity,
};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(cli.color.into())
        .with_log_json(cli.log_json);
    init_logging(&config);

    match run(cli.command, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr; `RUST_LOG` overrides the verbosity flags.
fn init_logging(config: &CliConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.verbosity.log_filter()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    let _ = if config.log_json {
        builder.json().try_init()
    } else {
        builder.with_ansi(config.color.should_color()).try_init()
    };
}

fn run(command: Commands, config: CliConfig) -> CliResult<()> {
    match command {
        Commands::Run(args) => run_specs(config, &args),
        Commands::Check(args) => run_check(&config, &args),
        Commands::Config(args) => run_config(&args),
    }
}

fn run_specs(config: CliConfig, args: &RunArgs) -> CliResult<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    let mut runner = TestRunner::new(config).with_format(args.format.into());
    let report = runtime.block_on(runner.run(args))?;
    if report.success() {
        Ok(())
    } else {
        Err(CliError::TestsFailed {
            failed: report.totals.failed,
            total: report.totals.tests,
        })
    }
}

fn run_check(config: &CliConfig, args: &CheckArgs) -> CliResult<()> {
    let reporter = ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
    let mut errors = 0;
    for (path, outcome) in specs::parse_all(&args.files) {
        match outcome {
            Ok(spec) => reporter.success(&format!(
                "{}: {} ({} test(s))",
                path.display(),
                spec.suite,
                spec.tests.len()
            )),
            Err(err) => {
                errors += 1;
                reporter.failure(&err.to_string());
            }
        }
    }
    if errors > 0 {
        return Err(CliError::InvalidSpecs { count: errors });
    }
    Ok(())
}

fn run_config(args: &ConfigArgs) -> CliResult<()> {
    let loaded = load_config(args.config.as_deref())?;
    match &loaded.source {
        Some(source) => println!("# {}", source.display()),
        None => println!("# defaults"),
    }
    print!("{}", loaded.config.to_yaml()?);
    Ok(())
}
