#![doc = include_str!("../README.md")]

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use modelrun_core::DEFAULT_CRASH_LOG;
use modelrun_engine::{DEFAULT_BRIDGE_PROGRAM, DEFAULT_SOLVER};

#[derive(Parser)]
#[command(name = "modelrun")]
#[command(about = "Run the check and run commands of a relational model and classify each result")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
pub(crate) struct Cli {
    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every command of a model (the default when no subcommand is given)
    #[command(display_order = 0)]
    Run(RunArgs),

    /// Print the command, verdict and fields recorded in an XML artifact
    #[command(display_order = 1)]
    Inspect {
        /// Path to an artifact written by `modelrun run`
        artifact: PathBuf,

        /// Only print the tuples of this field (e.g. has_threat)
        #[arg(long)]
        field: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Args, Debug, Clone)]
pub(crate) struct RunArgs {
    /// Path to the model file
    pub(crate) model: Option<PathBuf>,

    /// Engine bridge program
    #[arg(long, env = "MODELRUN_ENGINE", default_value = DEFAULT_BRIDGE_PROGRAM)]
    pub(crate) engine: String,

    /// Extra argument passed to the engine program (repeatable)
    #[arg(long = "engine-arg", allow_hyphen_values = true)]
    pub(crate) engine_args: Vec<String>,

    /// SAT solver the engine should use
    #[arg(long, default_value = DEFAULT_SOLVER)]
    pub(crate) solver: String,

    /// Per-command timeout in seconds (0 disables)
    #[arg(long, default_value_t = 600)]
    pub(crate) timeout: u64,

    /// Directory for XML artifacts
    #[arg(long, default_value = ".")]
    pub(crate) out_dir: PathBuf,

    /// Do not write XML artifacts
    #[arg(long, default_value_t = false)]
    pub(crate) no_persist: bool,

    /// Stop at the first command the engine fails on
    #[arg(long, default_value_t = false)]
    pub(crate) fail_fast: bool,

    /// Only run commands with this label
    #[arg(long = "command")]
    pub(crate) only: Option<String>,

    /// Report format on stdout
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub(crate) format: OutputFormat,

    /// Where to write the crash record on unexpected failure
    #[arg(long, default_value = DEFAULT_CRASH_LOG)]
    pub(crate) crash_log: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

fn main() -> miette::Result<ExitCode> {
    // Logs go to stderr so stdout carries only the report.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Run(args)) => commands::run::run_command(args),
        Some(Commands::Inspect {
            artifact,
            field,
            format,
        }) => commands::inspect::run_inspect_command(&artifact, field.as_deref(), format),
        None => commands::run::run_command(cli.run),
    }
}
