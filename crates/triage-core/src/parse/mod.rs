//! Line-driven reconstruction of test runs from `go test -v` CI output.

pub mod context;
pub mod patterns;
pub mod state;

pub use context::ParseContext;
pub use state::ParserState;

use crate::errors::ParseError;
use crate::model::{TestRun, TestStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Completed runs of one log file, in creation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseResult {
    pub tests: Vec<TestRun>,
}

impl ParseResult {
    pub fn tests_with_status(&self, status: TestStatus) -> Vec<&TestRun> {
        self.tests.iter().filter(|t| t.status == status).collect()
    }

    /// Drops parent runs whose subtests are present (`TestA` when `TestA/case` exists).
    pub fn without_group_parents(self) -> Vec<TestRun> {
        let parents: HashSet<String> = self
            .tests
            .iter()
            .filter_map(|t| t.name.split_once('/').map(|(parent, _)| parent.to_string()))
            .collect();
        self.tests
            .into_iter()
            .filter(|t| !parents.contains(&t.name))
            .collect()
    }
}

/// Runs the parser state machine over `lines` and validates the outcome.
pub fn parse_lines<I, S>(lines: I) -> Result<ParseResult, ParseError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut ctx = ParseContext::new();
    let mut state = ParserState::default();
    for line in lines {
        state = state.next(line.as_ref(), &mut ctx)?;
    }
    ctx.finish_parsing()
}

/// Parses the full text of one log file into completed test runs.
pub fn parse_tests(log_text: &str) -> Result<Vec<TestRun>, ParseError> {
    parse_lines(log_text.lines()).map(|result| result.tests)
}
