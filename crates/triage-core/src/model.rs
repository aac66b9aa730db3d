use crate::classify::ErrorClassification;
use crate::extract::ErrorDetail;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Lifecycle status of a single test execution.
///
/// `Running` and `Paused` are transient; `Pass`, `Fail` and `Skip` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Running,
    Paused,
    Pass,
    Fail,
    Skip,
}

impl TestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TestStatus::Pass | TestStatus::Fail | TestStatus::Skip)
    }

    pub fn is_pass_or_fail(self) -> bool {
        matches!(self, TestStatus::Pass | TestStatus::Fail)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TestStatus::Running => "RUN",
            TestStatus::Paused => "PAUSE",
            TestStatus::Pass => "PASS",
            TestStatus::Fail => "FAIL",
            TestStatus::Skip => "SKIP",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Duration token of a terminal `--- PASS/FAIL/SKIP` line.
///
/// CI secret scrubbing may replace digits with `*`; such tokens are kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunDuration {
    Seconds(f64),
    Redacted { raw: String },
}

impl RunDuration {
    /// Parses the `<secs>.<fraction>` part of a duration token (without the `s` suffix).
    pub fn parse(token: &str) -> Self {
        if token.contains('*') {
            return RunDuration::Redacted {
                raw: token.to_string(),
            };
        }
        match token.parse::<f64>() {
            Ok(secs) => RunDuration::Seconds(secs),
            Err(_) => RunDuration::Redacted {
                raw: token.to_string(),
            },
        }
    }

    pub fn seconds(&self) -> Option<f64> {
        match self {
            RunDuration::Seconds(s) => Some(*s),
            RunDuration::Redacted { .. } => None,
        }
    }
}

/// One execution of a Go test or subtest reconstructed from a log file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRun {
    pub name: String,
    pub status: TestStatus,
    pub ts: DateTime<Utc>,
    pub finish_ts: Option<DateTime<Utc>>,
    pub duration: Option<RunDuration>,
    pub output_lines: Vec<String>,
    pub package_url: Option<String>,
    /// Identifier of the log file the run was parsed from.
    pub log_id: Option<String>,
    /// Target environment (`dev`, `qa`, ...) detected in the log file.
    pub env: Option<String>,
}

impl TestRun {
    pub fn new(name: impl Into<String>, ts: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Running,
            ts,
            finish_ts: None,
            duration: None,
            output_lines: Vec::new(),
            package_url: None,
            log_id: None,
            env: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_failure(&self) -> bool {
        self.status == TestStatus::Fail
    }

    pub fn is_pass(&self) -> bool {
        self.status == TestStatus::Pass
    }

    /// Stable identity of the run: start timestamp plus name.
    pub fn id(&self) -> String {
        format!("{}-{}", self.ts.to_rfc3339(), self.name)
    }

    pub fn output_text(&self) -> String {
        self.output_lines.join("\n")
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.duration.as_ref().and_then(RunDuration::seconds)
    }

    /// `<last package segment>/<name>`, or just the name when no package is known.
    pub fn name_with_package(&self) -> String {
        match &self.package_url {
            Some(url) => {
                let pkg = url.trim_end_matches('/').rsplit('/').next().unwrap_or(url);
                format!("{}/{}", pkg, self.name)
            }
            None => self.name.clone(),
        }
    }

    /// Test group encoded in CI job log names, e.g.
    /// `40216340925_tests-1.11.x-latest_tests-1.11.x-latest-false_search_deployment.txt`
    /// belongs to `search_deployment`.
    pub fn group_name(&self) -> String {
        self.log_id.as_deref().map(extract_group_name).unwrap_or_default()
    }

    pub(crate) fn finish(
        &mut self,
        status: TestStatus,
        finish_ts: DateTime<Utc>,
        line: &str,
        duration: RunDuration,
    ) {
        debug_assert!(status.is_terminal());
        debug_assert!(!self.is_terminal(), "test {} finished twice", self.name);
        self.status = status;
        self.finish_ts = Some(finish_ts);
        self.duration = Some(duration);
        self.output_lines.push(line.to_string());
    }
}

pub fn extract_group_name(log_id: &str) -> String {
    let path = Path::new(log_id);
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return String::new();
    };
    if !file_name.contains('-') {
        return String::new();
    }
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    let last_part = stem.rsplit('-').next().unwrap_or(stem);
    match last_part.split_once('_') {
        Some((_, rest)) => rest.to_string(),
        None => last_part.to_string(),
    }
}

/// A failed run paired with its extracted error shape and, once decided, its classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestFailure {
    pub run: TestRun,
    pub details: ErrorDetail,
    pub classification: Option<ErrorClassification>,
}

impl TestFailure {
    /// Extracts the error detail of a failed run.
    ///
    /// Panics if `run` is not a failure.
    pub fn from_run(run: TestRun) -> Self {
        let details = ErrorDetail::extract(&run);
        Self {
            run,
            details,
            classification: None,
        }
    }

    pub fn run_id(&self) -> String {
        self.run.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 9, 0, 25, 1).unwrap()
    }

    #[test]
    fn redacted_durations_keep_raw_token() {
        assert_eq!(RunDuration::parse("1.23"), RunDuration::Seconds(1.23));
        assert_eq!(
            RunDuration::parse("12.**"),
            RunDuration::Redacted {
                raw: "12.**".into()
            }
        );
        assert_eq!(RunDuration::parse("**.5").seconds(), None);
    }

    #[test]
    fn group_name_from_job_log_name() {
        assert_eq!(
            extract_group_name(
                "40216340925_tests-1.11.x-latest_tests-1.11.x-latest-false_search_deployment.txt"
            ),
            "search_deployment"
        );
        assert_eq!(extract_group_name("plain.log"), "");
        assert_eq!(extract_group_name("logs/a-b.txt"), "b");
    }

    #[test]
    fn name_with_package_uses_last_segment() {
        let mut run = TestRun::new("TestAccCluster_basic", ts());
        assert_eq!(run.name_with_package(), "TestAccCluster_basic");
        run.package_url = Some(
            "github.com/mongodb/terraform-provider-mongodbatlas/internal/service/cluster".into(),
        );
        assert_eq!(run.name_with_package(), "cluster/TestAccCluster_basic");
    }

    #[test]
    fn id_combines_start_and_name() {
        let run = TestRun::new("TestX", ts());
        assert_eq!(run.id(), "2025-04-09T00:25:01+00:00-TestX");
    }
}
