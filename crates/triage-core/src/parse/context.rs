use super::ParseResult;
use crate::errors::ParseError;
use crate::model::{RunDuration, TestRun, TestStatus};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Mutable per-log-file parse state.
///
/// Owns every [`TestRun`] created while parsing and hands them over on
/// [`ParseContext::finish_parsing`]. Unfinished runs are indexed by name as a stack of
/// indices: Go nests subtests in call-stack order, so the top of the stack is always the
/// most recent unfinished run with that name.
#[derive(Debug, Default)]
pub struct ParseContext {
    tests: Vec<TestRun>,
    unfinished: HashMap<String, Vec<usize>>,
    current: Option<usize>,
    line_no: usize,
}

impl ParseContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tests(&self) -> &[TestRun] {
        &self.tests
    }

    /// Name of the run currently receiving output lines.
    pub fn current_test_name(&self) -> Option<&str> {
        self.current.map(|idx| self.tests[idx].name.as_str())
    }

    pub fn line_no(&self) -> usize {
        self.line_no
    }

    pub(crate) fn advance_line(&mut self) {
        self.line_no += 1;
    }

    pub(crate) fn start_test(&mut self, name: &str, ts: DateTime<Utc>, start_line: &str) {
        let idx = self.tests.len();
        let mut run = TestRun::new(name, ts);
        run.output_lines.push(start_line.to_string());
        self.tests.push(run);
        self.unfinished.entry(name.to_string()).or_default().push(idx);
        self.set_current(idx);
    }

    /// Re-points output capture to the most recent unfinished run named `name`.
    pub(crate) fn continue_test(&mut self, name: &str, line: &str) -> Result<(), ParseError> {
        let idx = self.find_unfinished(name)?;
        let run = &mut self.tests[idx];
        run.status = TestStatus::Running;
        run.output_lines.push(line.to_string());
        self.set_current(idx);
        Ok(())
    }

    pub(crate) fn pause_test(&mut self, name: &str) {
        if let Ok(idx) = self.find_unfinished(name) {
            self.tests[idx].status = TestStatus::Paused;
        }
    }

    pub(crate) fn finish_test(
        &mut self,
        name: &str,
        status: TestStatus,
        ts: DateTime<Utc>,
        end_line: &str,
        duration: RunDuration,
    ) -> Result<(), ParseError> {
        let idx = self.find_unfinished(name)?;
        if ts < self.tests[idx].ts {
            return Err(ParseError::FinishBeforeStart {
                name: name.to_string(),
                line_no: self.line_no,
            });
        }
        if let Some(stack) = self.unfinished.get_mut(name) {
            stack.pop();
            if stack.is_empty() {
                self.unfinished.remove(name);
            }
        }
        self.tests[idx].finish(status, ts, end_line, duration);
        if self.current == Some(idx) {
            self.current = None;
        }
        Ok(())
    }

    pub(crate) fn add_output_line(&mut self, line: &str) {
        if let Some(idx) = self.current {
            self.tests[idx].output_lines.push(line.to_string());
        }
    }

    /// Back-fills the package on every run that has none yet.
    pub(crate) fn set_package(&mut self, package_url: &str) {
        for run in self.tests.iter_mut().filter(|t| t.package_url.is_none()) {
            run.package_url = Some(package_url.to_string());
        }
    }

    /// Validates that every run reached a terminal status and releases the runs.
    pub fn finish_parsing(self) -> Result<ParseResult, ParseError> {
        let incomplete: Vec<String> = self
            .tests
            .iter()
            .filter(|t| !t.is_terminal())
            .map(|t| t.name.clone())
            .collect();
        if !incomplete.is_empty() {
            return Err(ParseError::IncompleteTestRuns { names: incomplete });
        }
        Ok(ParseResult { tests: self.tests })
    }

    fn find_unfinished(&self, name: &str) -> Result<usize, ParseError> {
        self.unfinished
            .get(name)
            .and_then(|stack| stack.last().copied())
            .ok_or_else(|| ParseError::UnknownTest {
                name: name.to_string(),
                line_no: self.line_no,
            })
    }

    fn set_current(&mut self, idx: usize) {
        if self.current != Some(idx) {
            tracing::debug!(
                test = %self.tests[idx].name,
                line_no = self.line_no,
                "capturing output"
            );
        }
        self.current = Some(idx);
    }
}
