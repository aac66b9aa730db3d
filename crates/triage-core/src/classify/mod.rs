//! Error classification: categories, persisted records and the classifier pipeline.

pub mod engine;
pub mod prompt;
pub mod rules;
pub mod signature;

pub use engine::{ClassificationReport, ErrorClassifier};
pub use prompt::{DecisionPrompt, DecisionRequest, NonInteractivePrompt, ScriptedPrompt};
pub use rules::{AutoRule, ClassificationRules};
pub use signature::ErrorSignature;

use crate::extract::ErrorDetail;
use crate::model::TestFailure;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Triage category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    #[serde(rename = "flaky_400")]
    Flaky400,
    #[serde(rename = "flaky_500")]
    Flaky500,
    FlakyCheck,
    OutOfCapacity,
    ProjectLimitExceeded,
    DanglingResource,
    RealTestFailure,
    Timeout,
    Unknown,
}

/// Follow-up a category calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorAction {
    Retry,
    RetryLater,
    CleanProject,
    UpdateCleanupScript,
    Investigate,
}

impl ErrorCategory {
    /// Choices offered to a human, in display order.
    pub const ALL: [ErrorCategory; 9] = [
        ErrorCategory::Flaky400,
        ErrorCategory::Flaky500,
        ErrorCategory::FlakyCheck,
        ErrorCategory::OutOfCapacity,
        ErrorCategory::ProjectLimitExceeded,
        ErrorCategory::DanglingResource,
        ErrorCategory::RealTestFailure,
        ErrorCategory::Timeout,
        ErrorCategory::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Flaky400 => "FLAKY_400",
            ErrorCategory::Flaky500 => "FLAKY_500",
            ErrorCategory::FlakyCheck => "FLAKY_CHECK",
            ErrorCategory::OutOfCapacity => "OUT_OF_CAPACITY",
            ErrorCategory::ProjectLimitExceeded => "PROJECT_LIMIT_EXCEEDED",
            ErrorCategory::DanglingResource => "DANGLING_RESOURCE",
            ErrorCategory::RealTestFailure => "REAL_TEST_FAILURE",
            ErrorCategory::Timeout => "TIMEOUT",
            ErrorCategory::Unknown => "UNKNOWN",
        }
    }

    pub fn action(self) -> ErrorAction {
        match self {
            ErrorCategory::Flaky400 | ErrorCategory::Flaky500 | ErrorCategory::FlakyCheck => {
                ErrorAction::Retry
            }
            ErrorCategory::OutOfCapacity => ErrorAction::RetryLater,
            ErrorCategory::ProjectLimitExceeded => ErrorAction::CleanProject,
            ErrorCategory::DanglingResource => ErrorAction::UpdateCleanupScript,
            ErrorCategory::RealTestFailure | ErrorCategory::Timeout | ErrorCategory::Unknown => {
                ErrorAction::Investigate
            }
        }
    }

    /// Suggestion offered to a human for a failure no rule or prior decision covers.
    pub fn suggested_for(detail: &ErrorDetail) -> ErrorCategory {
        match detail {
            ErrorDetail::ApiError(api) => match api.api_response_code {
                Some(code) if code >= 500 => ErrorCategory::Flaky500,
                Some(code) if code >= 400 => ErrorCategory::Flaky400,
                _ => ErrorCategory::Unknown,
            },
            ErrorDetail::CheckError(_) => ErrorCategory::FlakyCheck,
            ErrorDetail::DefaultError(_) => ErrorCategory::Unknown,
        }
    }
}

impl ErrorAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorAction::Retry => "retry",
            ErrorAction::RetryLater => "retry_later",
            ErrorAction::CleanProject => "clean_project",
            ErrorAction::UpdateCleanupScript => "update_cleanup_script",
            ErrorAction::Investigate => "investigate",
        }
    }
}

impl fmt::Display for ErrorAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ErrorCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        ErrorCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| format!("unknown error category: {s}"))
    }
}

/// How a category was assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    Automatic,
    Reused,
    Manual,
}

impl ClassificationSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ClassificationSource::Automatic => "automatic",
            ClassificationSource::Reused => "reused",
            ClassificationSource::Manual => "manual",
        }
    }
}

impl FromStr for ClassificationSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "automatic" => Ok(ClassificationSource::Automatic),
            "reused" => Ok(ClassificationSource::Reused),
            "manual" => Ok(ClassificationSource::Manual),
            other => Err(format!("unknown classification source: {other}")),
        }
    }
}

/// Persisted decision for one failed run. Stored per `run_id`; the signature links
/// decisions across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorClassification {
    pub run_id: String,
    pub test_name: String,
    pub signature: Option<ErrorSignature>,
    pub category: ErrorCategory,
    pub source: ClassificationSource,
    pub details: ErrorDetail,
    pub classified_at: DateTime<Utc>,
}

impl ErrorClassification {
    pub fn for_failure(
        failure: &TestFailure,
        category: ErrorCategory,
        source: ClassificationSource,
    ) -> Self {
        Self {
            run_id: failure.run_id(),
            test_name: failure.run.name.clone(),
            signature: ErrorSignature::of(&failure.details),
            category,
            source,
            details: failure.details.clone(),
            classified_at: Utc::now(),
        }
    }
}

/// Classified failures grouped by category.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassificationSummary {
    pub by_category: BTreeMap<ErrorCategory, Vec<String>>,
    pub unclassified: Vec<String>,
}

impl ClassificationSummary {
    pub fn from_failures(failures: &[TestFailure]) -> Self {
        let mut summary = Self::default();
        for failure in failures {
            let name = failure.run.name_with_package();
            match &failure.classification {
                Some(c) => summary.by_category.entry(c.category).or_default().push(name),
                None => summary.unclassified.push(name),
            }
        }
        summary
    }

    pub fn count(&self, category: ErrorCategory) -> usize {
        self.by_category.get(&category).map_or(0, Vec::len)
    }
}
