//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Stepwise: run declarative end-to-end spec files with retrying command chains
#[derive(Parser, Debug)]
#[command(name = "stepwise")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (failures and the summary only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Discover spec files and run every suite against the fixture host
    Run(RunArgs),

    /// Parse spec files and report errors without running them
    Check(CheckArgs),

    /// Print the effective configuration
    Config(ConfigArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Config file (defaults to ./stepwise.yaml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Spec glob, replacing the configured patterns (repeatable)
    #[arg(short, long = "spec", value_name = "GLOB")]
    pub specs: Vec<String>,

    /// Fixture site file, overriding the configured one
    #[arg(long)]
    pub fixtures: Option<PathBuf>,

    /// Write the run report as JSON to this file
    #[arg(long, value_name = "FILE")]
    pub json: Option<PathBuf>,

    /// Default command timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Stop a suite at its first failing test
    #[arg(long)]
    pub fail_fast: bool,

    /// Result output format
    #[arg(short, long, default_value = "text")]
    pub format: FormatArg,
}

/// Arguments for the check command
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Spec files to parse
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Config file (defaults to ./stepwise.yaml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Result output format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum FormatArg {
    /// Human-readable text
    #[default]
    Text,
    /// The run report as JSON on stdout
    Json,
}

impl From<FormatArg> for crate::output::OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => Self::Text,
            FormatArg::Json => Self::Json,
        }
    }
}

/// Color argument for CLI
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::config::ColorChoice;
    use crate::output::OutputFormat;

    mod cli_tests {
        use super::*;

        #[test]
        fn test_parse_run_command() {
            let cli = Cli::parse_from(["stepwise", "run"]);
            let Commands::Run(args) = cli.command else {
                panic!("expected Run command");
            };
            assert!(args.config.is_none());
            assert!(args.specs.is_empty());
            assert!(!args.fail_fast);
        }

        #[test]
        fn test_parse_run_with_overrides() {
            let cli = Cli::parse_from([
                "stepwise",
                "run",
                "--config",
                "demos/stepwise.yaml",
                "--spec",
                "a/**/*.spec.yaml",
                "-s",
                "b.spec.yaml",
                "--fixtures",
                "site.yaml",
                "--json",
                "out.json",
                "--timeout",
                "2000",
                "--fail-fast",
            ]);
            let Commands::Run(args) = cli.command else {
                panic!("expected Run command");
            };
            assert_eq!(args.config, Some(PathBuf::from("demos/stepwise.yaml")));
            assert_eq!(args.specs, vec!["a/**/*.spec.yaml", "b.spec.yaml"]);
            assert_eq!(args.fixtures, Some(PathBuf::from("site.yaml")));
            assert_eq!(args.json, Some(PathBuf::from("out.json")));
            assert_eq!(args.timeout, Some(2000));
            assert!(args.fail_fast);
        }

        #[test]
        fn test_parse_check_requires_files() {
            assert!(Cli::try_parse_from(["stepwise", "check"]).is_err());
            let cli = Cli::parse_from(["stepwise", "check", "a.spec.yaml", "b.spec.yaml"]);
            let Commands::Check(args) = cli.command else {
                panic!("expected Check command");
            };
            assert_eq!(args.files.len(), 2);
        }

        #[test]
        fn test_parse_config_command() {
            let cli = Cli::parse_from(["stepwise", "config", "-c", "x.yaml"]);
            assert!(matches!(cli.command, Commands::Config(ConfigArgs { config: Some(_) })));
        }

        #[test]
        fn test_global_flags_after_subcommand() {
            let cli = Cli::parse_from(["stepwise", "run", "-vv", "--color", "never", "--log-json"]);
            assert_eq!(cli.verbose, 2);
            assert!(cli.log_json);
            assert_eq!(ColorChoice::from(cli.color), ColorChoice::Never);
        }

        #[test]
        fn test_subcommand_is_required() {
            assert!(Cli::try_parse_from(["stepwise"]).is_err());
        }
    }

    mod arg_conversion_tests {
        use super::*;

        #[test]
        fn test_color_arg_conversion() {
            assert_eq!(ColorChoice::from(ColorArg::Auto), ColorChoice::Auto);
            assert_eq!(ColorChoice::from(ColorArg::Always), ColorChoice::Always);
            assert_eq!(ColorChoice::from(ColorArg::Never), ColorChoice::Never);
        }

        #[test]
        fn test_format_arg_conversion() {
            assert_eq!(OutputFormat::from(FormatArg::Text), OutputFormat::Text);
            assert_eq!(OutputFormat::from(FormatArg::Json), OutputFormat::Json);
        }

        #[test]
        fn test_parse_json_format() {
            let cli = Cli::parse_from(["stepwise", "run", "--format", "json"]);
            let Commands::Run(args) = cli.command else {
                panic!("expected Run command");
            };
            assert!(matches!(args.format, FormatArg::Json));
        }
    }
}
