//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// logroute - route log records to named sinks
#[derive(Parser, Debug)]
#[command(
    name = "logroute",
    author,
    version,
    about = "Route log records to named sinks",
    long_about = "Reads log records, renders them with the configured layout and fans \n\
                  them out to the sinks named by the routing configuration."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "LOGROUTE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all diagnostics except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Diagnostic log format
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "LOGROUTE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Dispatch records from stdin or a file
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "routes.toml", env = "LOGROUTE_CONFIG")]
    pub config: PathBuf,

    /// Read records from this file instead of stdin
    #[arg(short, long, env = "LOGROUTE_INPUT")]
    pub input: Option<PathBuf>,

    /// Treat each input line as an INFO message instead of a JSON record
    #[arg(long)]
    pub plain: bool,

    /// Logger name used for plain input lines
    #[arg(long, default_value = "stdin")]
    pub logger: String,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "LOGROUTE_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "routes.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "routes.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show sink parameters
    #[arg(long)]
    pub params: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
