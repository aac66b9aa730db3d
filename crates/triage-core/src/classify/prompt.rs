use super::ErrorCategory;
use crate::errors::ClassifyError;
use std::collections::VecDeque;

/// What a human is asked about one failure.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionRequest<'a> {
    pub run_id: &'a str,
    pub test_name: &'a str,
    pub summary: String,
    pub choices: &'static [ErrorCategory],
    pub default: ErrorCategory,
    /// Unclassified items that share this failure's signature and will follow the decision.
    pub similar: usize,
    /// Items still waiting for a decision, this one included.
    pub remaining: usize,
}

/// Source of manual classification decisions.
pub trait DecisionPrompt {
    /// `Ok(None)` declines the item.
    fn choose(&mut self, request: &DecisionRequest<'_>)
        -> Result<Option<ErrorCategory>, ClassifyError>;

    /// Asked after a decline; `true` stops the pass and keeps the rest for later.
    fn confirm_stop(&mut self) -> Result<bool, ClassifyError>;
}

/// Declines every item and stops at once: unattended runs only apply rules and reuse.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractivePrompt;

impl DecisionPrompt for NonInteractivePrompt {
    fn choose(
        &mut self,
        _request: &DecisionRequest<'_>,
    ) -> Result<Option<ErrorCategory>, ClassifyError> {
        Ok(None)
    }

    fn confirm_stop(&mut self) -> Result<bool, ClassifyError> {
        Ok(true)
    }
}

/// Replays a fixed list of decisions. Exhausted decisions decline and stop.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrompt {
    decisions: VecDeque<Option<ErrorCategory>>,
    stops: VecDeque<bool>,
    pub asked: Vec<String>,
}

impl ScriptedPrompt {
    pub fn new(decisions: impl IntoIterator<Item = Option<ErrorCategory>>) -> Self {
        Self {
            decisions: decisions.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Answers for successive [`DecisionPrompt::confirm_stop`] calls.
    pub fn with_stops(mut self, stops: impl IntoIterator<Item = bool>) -> Self {
        self.stops = stops.into_iter().collect();
        self
    }
}

impl DecisionPrompt for ScriptedPrompt {
    fn choose(
        &mut self,
        request: &DecisionRequest<'_>,
    ) -> Result<Option<ErrorCategory>, ClassifyError> {
        self.asked.push(request.run_id.to_string());
        Ok(self.decisions.pop_front().flatten())
    }

    fn confirm_stop(&mut self) -> Result<bool, ClassifyError> {
        Ok(self.stops.pop_front().unwrap_or(true))
    }
}
