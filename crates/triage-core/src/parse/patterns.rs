//! Line-shape matchers for `go test -v` console output as shipped by CI runners.
//!
//! Every relevant line starts with the runner's timestamp prefix
//! (`2025-04-09T00:25:01.8116397Z `). Patterns are tried in [`StatusPattern::ORDER`];
//! the first match wins.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;

const TS: &str = r"(?P<ts>\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d+Z?)\s*";
const TS_BARE: &str = r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d+Z?";
/// Digits may be replaced with `*` by CI secret scrubbing.
const RUNTIME: &str = r"(?P<runtime>[\d*]+\.[\d*]+)s";

fn status_regex(body: &str) -> Regex {
    Regex::new(&format!("^{TS}{body}")).unwrap()
}

lazy_static! {
    static ref RUN: Regex = status_regex(r"=== RUN\s+(?P<name>\S+)");
    static ref PAUSE: Regex = status_regex(r"=== PAUSE\s+(?P<name>\S+)");
    static ref NAME: Regex = status_regex(r"=== NAME\s+(?P<name>\S+)");
    static ref CONT: Regex = status_regex(r"=== CONT\s+(?P<name>\S+)");
    static ref PASS: Regex = status_regex(&format!(r"--- PASS: (?P<name>\S+)\s+\({RUNTIME}\)"));
    static ref FAIL: Regex = status_regex(&format!(r"--- FAIL: (?P<name>\S+)\s+\({RUNTIME}\)"));
    static ref SKIP: Regex = status_regex(&format!(r"--- SKIP: (?P<name>\S+)\s+\({RUNTIME}\)"));
    static ref PACKAGE_FAIL: Regex =
        status_regex(&format!(r"FAIL\s+(?P<package_url>\S+)\s+{RUNTIME}"));
    static ref PACKAGE_OK: Regex = status_regex(&format!(r"ok\s+(?P<package_url>\S+)\s+{RUNTIME}"));
    /// Two runner timestamps glued on one line (log shipping artifact).
    static ref GLUED_TIMESTAMPS: Regex =
        Regex::new(&format!(r"^{TS_BARE}\s*\s{TS_BARE}")).unwrap();
}

/// Lifecycle event a log line can announce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPattern {
    Run,
    Pause,
    Name,
    Cont,
    Pass,
    Fail,
    Skip,
    PackageFail,
    PackageOk,
}

impl StatusPattern {
    pub const ORDER: [StatusPattern; 9] = [
        StatusPattern::Run,
        StatusPattern::Pause,
        StatusPattern::Name,
        StatusPattern::Cont,
        StatusPattern::Pass,
        StatusPattern::Fail,
        StatusPattern::Skip,
        StatusPattern::PackageFail,
        StatusPattern::PackageOk,
    ];

    fn regex(self) -> &'static Regex {
        match self {
            StatusPattern::Run => &*RUN,
            StatusPattern::Pause => &*PAUSE,
            StatusPattern::Name => &*NAME,
            StatusPattern::Cont => &*CONT,
            StatusPattern::Pass => &*PASS,
            StatusPattern::Fail => &*FAIL,
            StatusPattern::Skip => &*SKIP,
            StatusPattern::PackageFail => &*PACKAGE_FAIL,
            StatusPattern::PackageOk => &*PACKAGE_OK,
        }
    }

    pub fn is_package_summary(self) -> bool {
        matches!(self, StatusPattern::PackageFail | StatusPattern::PackageOk)
    }
}

/// Captured fields of a matched line. `name` is empty for package summaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMatch<'a> {
    pub pattern: StatusPattern,
    pub ts: &'a str,
    pub name: &'a str,
    pub runtime: Option<&'a str>,
    pub package_url: Option<&'a str>,
}

pub fn match_line(line: &str) -> Option<LineMatch<'_>> {
    StatusPattern::ORDER.iter().find_map(|&pattern| {
        let caps = pattern.regex().captures(line)?;
        let ts = caps.name("ts").map(|m| m.as_str()).unwrap_or_default();
        Some(LineMatch {
            pattern,
            ts,
            name: caps.name("name").map(|m| m.as_str()).unwrap_or_default(),
            runtime: caps.name("runtime").map(|m| m.as_str()),
            package_url: caps.name("package_url").map(|m| m.as_str()),
        })
    })
}

pub fn is_ignored(line: &str) -> bool {
    GLUED_TIMESTAMPS.is_match(line)
}

/// Runner timestamps carry 7 fractional digits and an optional `Z`; both are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim().trim_end_matches('Z');
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn run_line_captures_name_and_timestamp() {
        let m = match_line("2025-04-09T00:25:01.8116397Z === RUN   TestAccCluster_tenant").unwrap();
        assert_eq!(m.pattern, StatusPattern::Run);
        assert_eq!(m.name, "TestAccCluster_tenant");
        assert_eq!(m.ts, "2025-04-09T00:25:01.8116397Z");
    }

    #[test]
    fn finish_line_accepts_redacted_runtime() {
        let m = match_line("2025-04-09T01:00:42.6195226Z --- FAIL: TestAccCluster_tenant (21**.81s)")
            .unwrap();
        assert_eq!(m.pattern, StatusPattern::Fail);
        assert_eq!(m.runtime, Some("21**.81"));
    }

    #[test]
    fn package_summary_lines() {
        let ok = match_line(
            "2025-04-09T01:00:42.7Z ok  \tgithub.com/org/repo/internal/service/cluster\t2140.95s",
        )
        .unwrap();
        assert_eq!(ok.pattern, StatusPattern::PackageOk);
        assert_eq!(
            ok.package_url,
            Some("github.com/org/repo/internal/service/cluster")
        );

        let fail =
            match_line("2025-04-09T01:00:42.7Z FAIL\tgithub.com/org/repo/internal/service/cluster\t2140.9**s")
                .unwrap();
        assert_eq!(fail.pattern, StatusPattern::PackageFail);
    }

    #[test]
    fn subtest_fail_is_not_a_package_summary() {
        let m = match_line("2025-04-09T00:25:01.1Z     --- FAIL: TestA/case_1 (0.00s)").unwrap();
        assert_eq!(m.pattern, StatusPattern::Fail);
        assert_eq!(m.name, "TestA/case_1");
    }

    #[test]
    fn plain_output_does_not_match() {
        assert!(match_line("2025-04-09T00:25:05.2244878Z     resource_cluster_test.go:1369: Step 1/1 error").is_none());
        assert!(match_line("=== RUN TestWithoutTimestamp").is_none());
    }

    #[test]
    fn glued_timestamps_are_ignored() {
        assert!(is_ignored(
            "2025-04-29T00:44:02.9968072Z 2025-04-29T00:44:02.9968072Z === RUN TestX"
        ));
        assert!(!is_ignored("2025-04-29T00:44:02.9968072Z === RUN TestX"));
    }

    #[test]
    fn timestamps_parse_with_and_without_zone_suffix() {
        let a = parse_timestamp("2025-04-09T00:25:01.8116397Z").unwrap();
        let b = parse_timestamp("2025-04-09T00:25:01.8116397").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.second(), 1);
        assert!(parse_timestamp("2025-13-45T00:00:00.0Z").is_none());
    }
}
