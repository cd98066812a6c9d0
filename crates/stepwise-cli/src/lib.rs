//! Stepwise CLI library
//!
//! Command-line front end for the Stepwise chain engine: spec discovery,
//! suite execution against the fixture host, and result reporting.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
mod output;
mod runner;
pub mod specs;

pub use commands::{CheckArgs, Cli, ColorArg, Commands, ConfigArgs, FormatArg, RunArgs};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{failure_lines, OutputFormat, ProgressReporter};
pub use runner::{load_config, LoadedConfig, TestRunner, DEFAULT_CONFIG_FILE};
