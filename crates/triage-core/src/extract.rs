//! Failure-detail extraction from the captured output of a failed run.
//!
//! An ordered list of patterns is searched over the whole output; each contributes its
//! named groups to one accumulating map and later patterns overwrite earlier keys. The
//! map then decides the shape: an API path makes an [`ApiError`], otherwise a check
//! number makes a [`CheckError`], otherwise the raw text is kept as a [`DefaultError`].
//!
//! The API-path-over-check precedence mirrors how failures were historically triaged
//! and is pending product confirmation; keep it unless that changes.

use crate::model::TestRun;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

const API_URL: &str = r"https://cloud(?:-dev|-qa)?\.mongodb\.com(?P<api_path>\S+)";

lazy_static! {
    static ref STEP: Regex = Regex::new(r"Step (?P<step_nr>\d+)/\d+").unwrap();
    static ref CHECK: Regex = Regex::new(r"Check (?P<check_nr>\d+)/\d+").unwrap();
    static ref RESOURCE: Regex =
        Regex::new(r"mongodbatlas_(?P<resource_type>\w+)\.(?P<resource_name>[\w-]+)").unwrap();
    static ref URL: Regex = Regex::new(API_URL).unwrap();
    static ref PARAMS: Regex = Regex::new(r"Params: \[(?P<api_path>[^\]\s,]+)").unwrap();
    static ref METHOD_CODE: Regex = Regex::new(
        r"(?P<api_method>GET|POST|PUT|DELETE|PATCH): HTTP (?P<api_response_code>\d+)"
    )
    .unwrap();
    static ref ERROR_CODE: Regex = Regex::new(r#"Error code: "(?P<api_error_code>[^"]+)""#).unwrap();
    /// `POST https://cloud-dev.mongodb.com/api/..: 409 (request "OUT_OF_CAPACITY")`
    static ref REQUEST_SUMMARY: Regex = Regex::new(&format!(
        r#"(?P<api_method>GET|POST|PUT|DELETE|PATCH)\s+{API_URL}\s+(?P<api_response_code>\d+)\s\(request\s"(?P<api_error_code>[^"]+)"\)"#
    ))
    .unwrap();
    static ref OBJECT_ID: Regex = Regex::new(
        r"^(?:[0-9a-fA-F]{24}|[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12})$"
    )
    .unwrap();
    static ref DETAIL_PATTERNS: Vec<&'static Regex> = vec![
        &*STEP,
        &*CHECK,
        &*RESOURCE,
        &*URL,
        &*PARAMS,
        &*METHOD_CODE,
        &*ERROR_CODE,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApiMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl ApiMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            ApiMethod::Get => "GET",
            ApiMethod::Post => "POST",
            ApiMethod::Put => "PUT",
            ApiMethod::Delete => "DELETE",
            ApiMethod::Patch => "PATCH",
        }
    }
}

impl FromStr for ApiMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(ApiMethod::Get),
            "POST" => Ok(ApiMethod::Post),
            "PUT" => Ok(ApiMethod::Put),
            "DELETE" => Ok(ApiMethod::Delete),
            "PATCH" => Ok(ApiMethod::Patch),
            other => Err(format!("unknown HTTP method: {other}")),
        }
    }
}

impl fmt::Display for ApiMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failing Admin API call surfaced by a Terraform acceptance test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub api_path: String,
    pub api_method: Option<ApiMethod>,
    pub api_response_code: Option<u16>,
    pub api_error_code: Option<String>,
    pub resource_type: Option<String>,
    pub resource_name: Option<String>,
    pub step_nr: Option<u32>,
}

impl ApiError {
    /// API path with object identifiers replaced by `{id}`.
    pub fn normalized_path(&self) -> String {
        self.api_path
            .split('/')
            .map(|segment| {
                if OBJECT_ID.is_match(segment) {
                    "{id}"
                } else {
                    segment
                }
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CheckItem {
    pub check_nr: u32,
}

/// A failed `resource.TestCheckFunc` assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckError {
    pub resource_type: Option<String>,
    pub resource_name: Option<String>,
    pub step_nr: Option<u32>,
    pub checks: Vec<CheckItem>,
}

impl CheckError {
    /// Sorted, comma separated check numbers.
    pub fn check_numbers_str(&self) -> String {
        let mut numbers: Vec<u32> = self.checks.iter().map(|c| c.check_nr).collect();
        numbers.sort_unstable();
        numbers
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultError {
    pub raw_text: String,
}

/// Typed shape of a test failure; exactly one per failed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorDetail {
    ApiError(ApiError),
    CheckError(CheckError),
    DefaultError(DefaultError),
}

impl ErrorDetail {
    /// Extracts the error detail of a failed run.
    ///
    /// # Panics
    /// When `run` did not fail; only failures carry an error shape.
    pub fn extract(run: &TestRun) -> Self {
        assert!(run.is_failure(), "test is not failed: {}", run.name);
        Self::from_output(&run.output_text())
    }

    /// Extracts an error detail from raw failure output. Never fails.
    pub fn from_output(output: &str) -> Self {
        let mut fields: HashMap<String, String> = HashMap::new();
        for pattern in DETAIL_PATTERNS.iter() {
            if let Some(caps) = pattern.captures(output) {
                merge_groups(pattern, &caps, &mut fields);
            }
        }

        if fields.contains_key("api_path") {
            if !fields.contains_key("api_error_code") {
                if let Some(caps) = REQUEST_SUMMARY.captures(output) {
                    merge_groups(&REQUEST_SUMMARY, &caps, &mut fields);
                }
            }
            return ErrorDetail::ApiError(api_error_from(fields));
        }

        if fields.remove("check_nr").is_some() {
            let checks = CHECK
                .captures_iter(output)
                .filter_map(|caps| caps.name("check_nr")?.as_str().parse().ok())
                .map(|check_nr| CheckItem { check_nr })
                .collect();
            return ErrorDetail::CheckError(CheckError {
                resource_type: fields.remove("resource_type"),
                resource_name: fields.remove("resource_name"),
                step_nr: parse_num(fields.get("step_nr")),
                checks,
            });
        }

        ErrorDetail::DefaultError(DefaultError {
            raw_text: output.to_string(),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ErrorDetail::ApiError(_) => "api_error",
            ErrorDetail::CheckError(_) => "check_error",
            ErrorDetail::DefaultError(_) => "default_error",
        }
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorDetail::ApiError(e) => {
                if let Some(resource_type) = &e.resource_type {
                    write!(f, "{resource_type} ")?;
                }
                write!(
                    f,
                    "{} {} {} {}",
                    e.api_error_code.as_deref().unwrap_or("-"),
                    e.api_method.map(ApiMethod::as_str).unwrap_or("-"),
                    e.normalized_path(),
                    e.api_response_code
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "-".to_string())
                )
            }
            ErrorDetail::CheckError(e) => write!(
                f,
                "{} {} step={} checks=[{}]",
                e.resource_type.as_deref().unwrap_or("-"),
                e.resource_name.as_deref().unwrap_or("-"),
                e.step_nr.map(|s| s.to_string()).unwrap_or_else(|| "-".into()),
                e.check_numbers_str()
            ),
            ErrorDetail::DefaultError(e) => {
                let first = e.raw_text.lines().next().unwrap_or_default();
                write!(f, "default error: {first}")
            }
        }
    }
}

fn merge_groups(pattern: &Regex, caps: &regex::Captures<'_>, fields: &mut HashMap<String, String>) {
    for name in pattern.capture_names().flatten() {
        if let Some(m) = caps.name(name) {
            fields.insert(name.to_string(), m.as_str().to_string());
        }
    }
}

fn parse_num<T: FromStr>(value: Option<&String>) -> Option<T> {
    value.and_then(|v| v.parse().ok())
}

fn api_error_from(mut fields: HashMap<String, String>) -> ApiError {
    let api_path = fields
        .remove("api_path")
        .unwrap_or_default()
        .trim_end_matches(&[':', '/'][..])
        .to_string();
    ApiError {
        api_path,
        api_method: fields.get("api_method").and_then(|m| m.parse().ok()),
        api_response_code: parse_num(fields.get("api_response_code")),
        api_error_code: fields.remove("api_error_code"),
        resource_type: fields.remove("resource_type"),
        resource_name: fields.remove("resource_name"),
        step_nr: parse_num(fields.get("step_nr")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TENANT: &str = "\
2025-04-09T00:25:01.8107100Z === RUN   TestAccCluster_tenant
2025-04-09T00:59:12.0131855Z     resource_cluster_test.go:1029: Step 2/2 error: Check failed: Check 4/5 error: mongodbatlas_cluster.tenant: Attribute 'disk_size_gb' expected \"10\", got \"5\"
2025-04-09T01:00:42.6195226Z --- FAIL: TestAccCluster_tenant (2140.81s)";

    const PROJECT_NOT_FOUND: &str = "\
2025-04-09T00:25:01.8117740Z === RUN   TestAccCluster_pinnedFCVWithVersionUpgradeAndDowngrade
2025-04-09T00:25:05.8150912Z     resource_cluster_test.go:1399: Step 1/7 error: Error running apply: exit status 1
2025-04-09T00:25:05.8151883Z         Error: error during project deletion when getting project settings
2025-04-09T00:25:05.8152658Z           with mongodbatlas_project.test,
2025-04-09T00:25:05.8153361Z           on terraform_plugin_test.tf line 12, in resource \"mongodbatlas_project\" \"test\":
2025-04-09T00:25:05.8155033Z         error deleting project (67f5be5fe7455b55f206ba3e):
2025-04-09T00:25:05.8155686Z         https://cloud-dev.mongodb.com/api/atlas/v2/groups/67f5be5fe7455b55f206ba3e/settings
2025-04-09T00:25:05.8156649Z         GET: HTTP 404 Not Found (Error code: \"RESOURCE_NOT_FOUND\") Detail: Cannot
2025-04-09T00:25:05.8157317Z         find resource /api/atlas/v2/groups/67f5be5fe7455b55f206ba3e/settings. Reason:
2025-04-09T00:25:05.8157985Z         Not Found. Params: [/api/atlas/v2/groups/67f5be5fe7455b55f206ba3e/settings],
2025-04-09T00:25:05.8158436Z         BadRequestDetail:
2025-04-09T00:25:05.8592892Z --- FAIL: TestAccCluster_pinnedFCVWithVersionUpgradeAndDowngrade (4.05s)";

    #[test]
    fn check_failure_becomes_check_error() {
        let detail = ErrorDetail::from_output(TENANT);
        assert_eq!(
            detail,
            ErrorDetail::CheckError(CheckError {
                resource_type: Some("cluster".into()),
                resource_name: Some("tenant".into()),
                step_nr: Some(2),
                checks: vec![CheckItem { check_nr: 4 }],
            })
        );
    }

    #[test]
    fn api_failure_becomes_api_error() {
        let detail = ErrorDetail::from_output(PROJECT_NOT_FOUND);
        assert_eq!(
            detail,
            ErrorDetail::ApiError(ApiError {
                api_path: "/api/atlas/v2/groups/67f5be5fe7455b55f206ba3e/settings".into(),
                api_method: Some(ApiMethod::Get),
                api_response_code: Some(404),
                api_error_code: Some("RESOURCE_NOT_FOUND".into()),
                resource_type: Some("project".into()),
                resource_name: Some("test".into()),
                step_nr: Some(1),
            })
        );
    }

    #[test]
    fn request_summary_fills_missing_api_fields() {
        let output = "Error: error creating MongoDB Cluster: POST https://cloud-dev.mongodb.com/api/atlas/v1.0/groups/680ecbc7122f5b15cc627ba5/clusters: 409 (request \"OUT_OF_CAPACITY\") The requested region is currently out of capacity";
        let ErrorDetail::ApiError(api) = ErrorDetail::from_output(output) else {
            panic!("expected api error");
        };
        assert_eq!(api.api_path, "/api/atlas/v1.0/groups/680ecbc7122f5b15cc627ba5/clusters");
        assert_eq!(api.api_method, Some(ApiMethod::Post));
        assert_eq!(api.api_response_code, Some(409));
        assert_eq!(api.api_error_code.as_deref(), Some("OUT_OF_CAPACITY"));
        assert_eq!(api.normalized_path(), "/api/atlas/v1.0/groups/{id}/clusters");
    }

    #[test]
    fn api_path_wins_over_check_numbers() {
        let output = "Check 1/2 error\nParams: [/api/x]\nPOST: HTTP 400 (Error code: \"BAD\")";
        assert_eq!(ErrorDetail::from_output(output).kind(), "api_error");
    }

    #[test]
    fn unmatched_output_is_kept_verbatim() {
        let output = "panic: runtime error: invalid memory address";
        assert_eq!(
            ErrorDetail::from_output(output),
            ErrorDetail::DefaultError(DefaultError {
                raw_text: output.to_string()
            })
        );
    }

    #[test]
    #[should_panic(expected = "test is not failed")]
    fn passing_run_is_a_contract_violation() {
        let run = crate::parse::parse_tests(
            "2025-04-09T00:25:01.1Z === RUN   X\n2025-04-09T00:25:02.3Z --- PASS: X (1.23s)",
        )
        .unwrap()
        .remove(0);
        let _ = ErrorDetail::extract(&run);
    }
}
