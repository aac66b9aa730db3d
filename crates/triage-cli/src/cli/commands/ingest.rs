use super::ingest_options;
use crate::cli::args::IngestArgs;
use crate::exit_codes;
use std::collections::BTreeMap;
use std::sync::Arc;
use triage_core::config::TriageConfig;
use triage_core::ingest::{ingest_logs, DirLogSource, IngestReport};
use triage_core::TestStatus;

pub async fn run(args: IngestArgs, cfg: &TriageConfig) -> anyhow::Result<i32> {
    let options = ingest_options(cfg, &args.overrides);
    let report = ingest_logs(Arc::new(DirLogSource::new(&args.dir)), options).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_summary(&report));
    }
    Ok(if report.is_complete() {
        exit_codes::SUCCESS
    } else {
        exit_codes::PARTIAL
    })
}

pub(crate) fn render_summary(report: &IngestReport) -> String {
    let mut by_status: BTreeMap<&'static str, usize> = BTreeMap::new();
    for run in &report.runs {
        *by_status.entry(run.status.as_str()).or_default() += 1;
    }
    let counts: Vec<String> = [TestStatus::Pass, TestStatus::Fail, TestStatus::Skip]
        .iter()
        .map(|s| format!("{}={}", s, by_status.get(s.as_str()).copied().unwrap_or(0)))
        .collect();
    let mut out = format!("runs: {} ({})\n", report.runs.len(), counts.join(" "));
    for failed in report.runs.iter().filter(|r| r.is_failure()) {
        out.push_str(&format!("  FAIL {}\n", failed.name_with_package()));
    }
    if !report.empty.is_empty() {
        out.push_str(&format!("empty logs: {}\n", report.empty.join(", ")));
    }
    for f in report.failures.iter().chain(&report.fetch_errors) {
        out.push_str(&format!("error {}: {}\n", f.log_id, f.error));
    }
    if !report.timeouts.is_empty() {
        out.push_str(&format!("timed out: {}\n", report.timeouts.join(", ")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::ingest::FileFailure;
    use triage_core::parse_tests;

    #[test]
    fn summary_lists_failures_and_problems() {
        let report = IngestReport {
            runs: parse_tests(
                "2025-04-09T00:25:01.1Z === RUN   TestX\n\
                 2025-04-09T00:25:02.3Z --- FAIL: TestX (1.23s)",
            )
            .unwrap(),
            failures: vec![FileFailure {
                log_id: "bad.log".into(),
                error: "some tests are not completed: TestY".into(),
            }],
            empty: vec!["empty.log".into()],
            fetch_errors: vec![],
            timeouts: vec!["slow.log".into()],
        };
        assert_eq!(
            render_summary(&report),
            "runs: 1 (PASS=0 FAIL=1 SKIP=0)\n  FAIL TestX\nempty logs: empty.log\n\
             error bad.log: some tests are not completed: TestY\ntimed out: slow.log\n"
        );
    }
}
