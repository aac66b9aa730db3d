use crate::extract::ErrorDetail;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structural key of an [`ErrorDetail`], free of run timestamps and object ids.
///
/// Two failures with equal signatures are "the same failure": a decision taken for one
/// is reused for the other. Default errors carry free text and have no signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorSignature(String);

impl ErrorSignature {
    pub fn of(detail: &ErrorDetail) -> Option<Self> {
        match detail {
            ErrorDetail::ApiError(api) => Some(Self(format!(
                "api|{}|{}|{}|{}",
                api.api_method.map(|m| m.as_str()).unwrap_or_default(),
                api.normalized_path(),
                api.api_response_code
                    .map(|c| c.to_string())
                    .unwrap_or_default(),
                api.api_error_code.as_deref().unwrap_or_default(),
            ))),
            ErrorDetail::CheckError(check) => Some(Self(format!(
                "check|{}|{}|{}|{}",
                check.resource_type.as_deref().unwrap_or_default(),
                check.resource_name.as_deref().unwrap_or_default(),
                check.step_nr.map(|s| s.to_string()).unwrap_or_default(),
                check.check_numbers_str(),
            ))),
            ErrorDetail::DefaultError(_) => None,
        }
    }

    /// Rebuilds a signature read back from storage.
    pub fn from_stored(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ErrorSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
