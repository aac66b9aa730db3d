use super::ErrorCategory;
use serde::{Deserialize, Serialize};

/// Substring rule: matches when every `contains` entry occurs in the failure output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoRule {
    pub category: ErrorCategory,
    pub contains: Vec<String>,
}

impl AutoRule {
    pub fn new<I, S>(category: ErrorCategory, contains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            category,
            contains: contains.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matches(&self, output: &str) -> bool {
        !self.contains.is_empty() && self.contains.iter().all(|needle| output.contains(needle))
    }
}

/// Ordered automatic-classification rules; the first matching rule decides.
///
/// Built once from configuration and handed to the classifier, so pipelines running
/// side by side never share rule state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRules {
    rules: Vec<AutoRule>,
}

impl Default for ClassificationRules {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ClassificationRules {
    /// Known transient-error phrasings of the Atlas Admin API.
    pub fn builtin() -> Self {
        Self {
            rules: vec![
                AutoRule::new(ErrorCategory::OutOfCapacity, ["OUT_OF_CAPACITY"]),
                AutoRule::new(ErrorCategory::Flaky500, ["HTTP 500", "UNEXPECTED_ERROR"]),
            ],
        }
    }

    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn new(rules: Vec<AutoRule>) -> Self {
        Self { rules }
    }

    /// Appends `extra` after the current rules.
    pub fn with_rules(mut self, extra: impl IntoIterator<Item = AutoRule>) -> Self {
        self.rules.extend(extra);
        self
    }

    pub fn rules(&self) -> &[AutoRule] {
        &self.rules
    }

    pub fn classify(&self, output: &str) -> Option<ErrorCategory> {
        self.rules
            .iter()
            .find(|rule| rule.matches(output))
            .map(|rule| rule.category)
    }
}
