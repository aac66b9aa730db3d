pub mod classify;
pub mod ingest;
pub mod parse;

use super::args::{Cli, Command, IngestOverrides};
use anyhow::Context;
use triage_core::config::{load_config, TriageConfig};
use triage_core::ingest::IngestOptions;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let cfg = load_config(&cli.config)
        .with_context(|| format!("failed to load config {}", cli.config.display()))?;
    match cli.cmd {
        Command::Parse(args) => parse::run(args),
        Command::Ingest(args) => ingest::run(args, &cfg).await,
        Command::Classify(args) => classify::run(args, &cfg).await,
    }
}

/// Config values with command-line overrides applied.
pub(crate) fn ingest_options(cfg: &TriageConfig, overrides: &IngestOverrides) -> IngestOptions {
    let mut options = IngestOptions::from(&cfg.ingest);
    if let Some(workers) = overrides.workers {
        options.worker_count = workers.max(1);
    }
    if let Some(secs) = overrides.timeout {
        options.max_wait = std::time::Duration::from_secs(secs);
    }
    options
}
