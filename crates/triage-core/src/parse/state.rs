use super::context::ParseContext;
use super::patterns::{self, LineMatch, StatusPattern};
use crate::errors::ParseError;
use crate::model::{RunDuration, TestStatus};

/// The two states of the line parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParserState {
    #[default]
    WaitForRelevantLine,
    CaptureOutput,
}

impl ParserState {
    /// Feeds one raw log line through the state machine and returns the next state.
    pub fn next(self, line: &str, ctx: &mut ParseContext) -> Result<ParserState, ParseError> {
        ctx.advance_line();
        if patterns::is_ignored(line) {
            return Ok(ParserState::WaitForRelevantLine);
        }
        match patterns::match_line(line) {
            Some(m) => self.on_status_line(&m, line, ctx),
            None => {
                if self == ParserState::CaptureOutput {
                    ctx.add_output_line(line);
                }
                Ok(self)
            }
        }
    }

    fn on_status_line(
        self,
        m: &LineMatch<'_>,
        line: &str,
        ctx: &mut ParseContext,
    ) -> Result<ParserState, ParseError> {
        match m.pattern {
            StatusPattern::Run => {
                let ts = timestamp(m, ctx)?;
                ctx.start_test(m.name, ts, line);
                Ok(ParserState::CaptureOutput)
            }
            StatusPattern::Name | StatusPattern::Cont => {
                ctx.continue_test(m.name, line)?;
                Ok(ParserState::CaptureOutput)
            }
            StatusPattern::Pause => {
                ctx.pause_test(m.name);
                Ok(self)
            }
            StatusPattern::Pass | StatusPattern::Fail | StatusPattern::Skip => {
                let status = match m.pattern {
                    StatusPattern::Pass => TestStatus::Pass,
                    StatusPattern::Fail => TestStatus::Fail,
                    _ => TestStatus::Skip,
                };
                let ts = timestamp(m, ctx)?;
                let duration = RunDuration::parse(m.runtime.unwrap_or_default());
                ctx.finish_test(m.name, status, ts, line, duration)?;
                Ok(ParserState::WaitForRelevantLine)
            }
            StatusPattern::PackageFail | StatusPattern::PackageOk => {
                if let Some(url) = m.package_url {
                    ctx.set_package(url);
                }
                Ok(self)
            }
        }
    }
}

fn timestamp(
    m: &LineMatch<'_>,
    ctx: &ParseContext,
) -> Result<chrono::DateTime<chrono::Utc>, ParseError> {
    patterns::parse_timestamp(m.ts).ok_or_else(|| ParseError::InvalidTimestamp {
        value: m.ts.to_string(),
        line_no: ctx.line_no(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(lines: &[&str]) -> (ParseContext, Vec<ParserState>) {
        let mut ctx = ParseContext::new();
        let mut state = ParserState::default();
        let mut states = Vec::new();
        for line in lines {
            state = state.next(line, &mut ctx).unwrap();
            states.push(state);
        }
        (ctx, states)
    }

    #[test]
    fn lines_before_first_run_are_discarded() {
        let (ctx, states) = feed(&[
            "2025-04-09T00:25:01.1Z go: downloading something",
            "2025-04-09T00:25:01.2Z === RUN   TestX",
            "2025-04-09T00:25:01.3Z     x_test.go:10: hello",
        ]);
        assert_eq!(
            states,
            vec![
                ParserState::WaitForRelevantLine,
                ParserState::CaptureOutput,
                ParserState::CaptureOutput
            ]
        );
        assert_eq!(ctx.tests()[0].output_lines.len(), 2);
    }

    #[test]
    fn finish_returns_to_waiting_and_drops_trailing_noise() {
        let (ctx, states) = feed(&[
            "2025-04-09T00:25:01.2Z === RUN   TestX",
            "2025-04-09T00:25:01.4Z --- PASS: TestX (0.20s)",
            "2025-04-09T00:25:01.5Z PASS",
        ]);
        assert_eq!(states[1], ParserState::WaitForRelevantLine);
        assert_eq!(states[2], ParserState::WaitForRelevantLine);
        assert_eq!(ctx.tests()[0].output_lines.len(), 2);
    }

    #[test]
    fn pause_keeps_state_and_marks_run_paused() {
        let (ctx, states) = feed(&[
            "2025-04-09T00:25:01.2Z === RUN   TestX",
            "2025-04-09T00:25:01.3Z === PAUSE TestX",
        ]);
        assert_eq!(states[1], ParserState::CaptureOutput);
        assert_eq!(ctx.tests()[0].status, TestStatus::Paused);
        assert_eq!(ctx.current_test_name(), Some("TestX"));
    }

    #[test]
    fn glued_timestamp_line_stops_capture() {
        let (ctx, states) = feed(&[
            "2025-04-09T00:25:01.2Z === RUN   TestX",
            "2025-04-09T00:25:01.3Z 2025-04-09T00:25:01.3Z garbage",
            "2025-04-09T00:25:01.4Z not captured",
        ]);
        assert_eq!(states[1], ParserState::WaitForRelevantLine);
        assert_eq!(ctx.tests()[0].output_lines.len(), 1);
    }

    #[test]
    fn name_line_for_unknown_test_is_an_error() {
        let mut ctx = ParseContext::new();
        let err = ParserState::default()
            .next("2025-04-09T00:25:01.2Z === NAME  TestMissing", &mut ctx)
            .unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownTest {
                name: "TestMissing".into(),
                line_no: 1
            }
        );
    }

    #[test]
    fn package_line_does_not_change_state() {
        let (ctx, states) = feed(&[
            "2025-04-09T00:25:01.2Z === RUN   TestX",
            "2025-04-09T00:25:01.3Z ok  \tgithub.com/org/repo/pkg\t1.5s",
        ]);
        assert_eq!(states[1], ParserState::CaptureOutput);
        assert_eq!(
            ctx.tests()[0].package_url.as_deref(),
            Some("github.com/org/repo/pkg")
        );
    }
}
