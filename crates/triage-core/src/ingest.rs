//! Concurrent fetch-and-parse of many CI log files.
//!
//! Each log file is fetched and parsed by one task with its own parse context. A
//! semaphore bounds concurrency and one wall-clock deadline bounds the whole batch: tasks
//! still running at the deadline are aborted and reported, never awaited.

use crate::config::IngestConfig;
use crate::errors::ParseError;
use crate::model::{TestFailure, TestRun};
use crate::parse::parse_tests;
use anyhow::Context;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

lazy_static! {
    static ref BASE_URL: Regex = Regex::new(r"(?m)MONGODB_ATLAS_BASE_URL: (\S+)").unwrap();
}

/// Where raw log text comes from.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Identifiers of every available log.
    async fn list(&self) -> anyhow::Result<Vec<String>>;

    /// Raw text of one log; `None` when the log exists but has no content.
    async fn fetch(&self, log_id: &str) -> anyhow::Result<Option<String>>;
}

/// Reads `*.log` and `*.txt` files of one directory; the file name is the log id.
#[derive(Debug, Clone)]
pub struct DirLogSource {
    dir: PathBuf,
}

impl DirLogSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl LogSource for DirLogSource {
    async fn list(&self) -> anyhow::Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("failed to read log directory {}", self.dir.display()))?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_log = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("log") | Some("txt")
            );
            if !is_log || !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                ids.push(name.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn fetch(&self, log_id: &str) -> anyhow::Result<Option<String>> {
        let path = self.dir.join(log_id);
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("failed to read log {}", path.display()))?;
        if bytes.is_empty() {
            return Ok(None);
        }
        // Invalid UTF-8 is replaced, never fatal to the file.
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
    pub worker_count: usize,
    pub max_wait: Duration,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self::from(&IngestConfig::default())
    }
}

impl From<&IngestConfig> for IngestOptions {
    fn from(cfg: &IngestConfig) -> Self {
        Self {
            worker_count: cfg.worker_count,
            max_wait: cfg.max_wait(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub log_id: String,
    pub error: String,
}

/// Outcome of one ingestion batch. Every listed log id appears in exactly one of
/// `runs` (via `TestRun::log_id`), `empty`, `failures`, `fetch_errors` or `timeouts`,
/// except parsed logs without any test.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    /// Completed runs ordered by log id, then creation order within the log.
    pub runs: Vec<TestRun>,
    /// Logs whose event sequence was inconsistent.
    pub failures: Vec<FileFailure>,
    pub empty: Vec<String>,
    pub fetch_errors: Vec<FileFailure>,
    /// Logs abandoned at the deadline.
    pub timeouts: Vec<String>,
}

impl IngestReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.fetch_errors.is_empty() && self.timeouts.is_empty()
    }

    /// Failed runs paired with their extracted error details.
    pub fn test_failures(&self) -> Vec<TestFailure> {
        self.runs
            .iter()
            .filter(|r| r.is_failure())
            .cloned()
            .map(TestFailure::from_run)
            .collect()
    }
}

enum FileOutcome {
    Parsed(Vec<TestRun>),
    Empty,
    FetchFailed(String),
    ParseFailed(ParseError),
}

/// Fetches and parses every log of `source` on a bounded pool.
///
/// Only listing errors are returned; per-log problems land in the report.
pub async fn ingest_logs(
    source: Arc<dyn LogSource>,
    options: IngestOptions,
) -> anyhow::Result<IngestReport> {
    let ids = source.list().await?;
    info!(
        logs = ids.len(),
        workers = options.worker_count,
        "ingesting logs"
    );

    let sem = Arc::new(Semaphore::new(options.worker_count.max(1)));
    let mut join_set = JoinSet::new();
    let mut pending: BTreeSet<String> = BTreeSet::new();
    for id in ids {
        pending.insert(id.clone());
        let sem = sem.clone();
        let source = source.clone();
        join_set.spawn(async move {
            let outcome = match sem.acquire_owned().await {
                Ok(_permit) => fetch_and_parse(source.as_ref(), &id).await,
                Err(e) => FileOutcome::FetchFailed(e.to_string()),
            };
            (id, outcome)
        });
    }

    let deadline = tokio::time::Instant::now() + options.max_wait;
    let mut parsed: BTreeMap<String, Vec<TestRun>> = BTreeMap::new();
    let mut report = IngestReport::default();
    loop {
        match tokio::time::timeout_at(deadline, join_set.join_next()).await {
            Ok(Some(Ok((id, outcome)))) => {
                pending.remove(&id);
                match outcome {
                    FileOutcome::Parsed(runs) => {
                        info!(log_id = %id, runs = runs.len(), "parsed log");
                        parsed.insert(id, runs);
                    }
                    FileOutcome::Empty => report.empty.push(id),
                    FileOutcome::FetchFailed(error) => {
                        warn!(log_id = %id, %error, "failed to fetch log");
                        report.fetch_errors.push(FileFailure { log_id: id, error });
                    }
                    FileOutcome::ParseFailed(e) => {
                        warn!(log_id = %id, error = %e, "failed to parse log");
                        report.failures.push(FileFailure {
                            log_id: id,
                            error: e.to_string(),
                        });
                    }
                }
            }
            Ok(Some(Err(e))) => warn!(error = %e, "ingest worker failed"),
            Ok(None) => break,
            Err(_) => {
                join_set.abort_all();
                warn!(
                    abandoned = pending.len(),
                    max_wait_secs = options.max_wait.as_secs(),
                    "ingest deadline reached"
                );
                report.timeouts = std::mem::take(&mut pending).into_iter().collect();
                break;
            }
        }
    }
    // Workers that panicked never reported their id.
    report
        .fetch_errors
        .extend(pending.into_iter().map(|log_id| FileFailure {
            log_id,
            error: "worker task failed".into(),
        }));

    report.runs = parsed.into_values().flatten().collect();
    report.empty.sort();
    report.failures.sort_by(|a, b| a.log_id.cmp(&b.log_id));
    report.fetch_errors.sort_by(|a, b| a.log_id.cmp(&b.log_id));
    Ok(report)
}

async fn fetch_and_parse(source: &dyn LogSource, log_id: &str) -> FileOutcome {
    let text = match source.fetch(log_id).await {
        Ok(Some(text)) if !text.trim().is_empty() => text,
        Ok(_) => return FileOutcome::Empty,
        Err(e) => return FileOutcome::FetchFailed(format!("{e:#}")),
    };
    let env = find_env_of_base_url(&text);
    let parsed = match tokio::task::spawn_blocking(move || parse_tests(&text)).await {
        Ok(parsed) => parsed,
        Err(e) => return FileOutcome::FetchFailed(format!("parser task failed: {e}")),
    };
    match parsed {
        Ok(mut runs) => {
            for run in &mut runs {
                run.log_id = Some(log_id.to_string());
                run.env = env.clone();
            }
            FileOutcome::Parsed(runs)
        }
        Err(e) => FileOutcome::ParseFailed(e),
    }
}

/// Environment of the first `MONGODB_ATLAS_BASE_URL` in a log: the first host label
/// without its `cloud-` prefix (`https://cloud-dev.mongodb.com/` is `dev`).
pub fn find_env_of_base_url(log_text: &str) -> Option<String> {
    let raw = BASE_URL.captures(log_text)?.get(1)?.as_str();
    let url = url::Url::parse(raw).ok()?;
    let label = url.host_str()?.split('.').next()?;
    Some(label.strip_prefix("cloud-").unwrap_or(label).to_string())
}
