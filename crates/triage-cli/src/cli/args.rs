use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "triage",
    version,
    about = "Parse Go test CI logs, extract failure details and classify failures"
)]
pub struct Cli {
    /// YAML config file; missing file means defaults
    #[arg(long, global = true, default_value = "triage.yaml")]
    pub config: PathBuf,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Parse one log file and print its test runs
    Parse(ParseArgs),
    /// Parse every log in a directory and print a summary
    Ingest(IngestArgs),
    /// Ingest a directory and classify every failure
    Classify(ClassifyArgs),
}

#[derive(Args, Clone)]
pub struct ParseArgs {
    pub file: PathBuf,

    /// Print completed runs as pretty JSON
    #[arg(long)]
    pub json: bool,

    /// Drop parent runs whose subtests are listed
    #[arg(long)]
    pub no_group_parents: bool,
}

#[derive(Args, Clone)]
pub struct IngestOverrides {
    /// Concurrent workers (overrides ingest.worker_count)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Seconds before unfinished workers are abandoned (overrides ingest.max_wait_seconds)
    #[arg(long)]
    pub timeout: Option<u64>,
}

#[derive(Args, Clone)]
pub struct IngestArgs {
    /// Directory with `*.log` / `*.txt` files
    pub dir: PathBuf,

    #[command(flatten)]
    pub overrides: IngestOverrides,

    /// Print the full report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone)]
pub struct ClassifyArgs {
    /// Directory with `*.log` / `*.txt` files
    pub dir: PathBuf,

    #[command(flatten)]
    pub overrides: IngestOverrides,

    /// Classification database (overrides store.path)
    #[arg(long, env = "TRIAGE_DB")]
    pub db: Option<PathBuf>,

    /// Never prompt; only automatic rules and stored decisions apply
    #[arg(long)]
    pub non_interactive: bool,
}
