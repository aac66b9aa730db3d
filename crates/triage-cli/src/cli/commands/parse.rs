use crate::cli::args::ParseArgs;
use crate::exit_codes;
use anyhow::Context;
use triage_core::parse::parse_lines;
use triage_core::{RunDuration, TestRun};

pub fn run(args: ParseArgs) -> anyhow::Result<i32> {
    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read log {}", args.file.display()))?;
    let result = match parse_lines(text.lines()) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("{}: {e}", args.file.display());
            return Ok(exit_codes::PARTIAL);
        }
    };
    let runs = if args.no_group_parents {
        result.without_group_parents()
    } else {
        result.tests
    };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
    } else {
        print!("{}", render_runs(&runs));
    }
    Ok(exit_codes::SUCCESS)
}

fn format_duration(duration: Option<&RunDuration>) -> String {
    match duration {
        Some(RunDuration::Seconds(s)) => format!("{s:.2}s"),
        Some(RunDuration::Redacted { raw }) => format!("{raw}s"),
        None => "-".to_string(),
    }
}

pub(crate) fn render_runs(runs: &[TestRun]) -> String {
    let mut out = String::new();
    for run in runs {
        out.push_str(&format!(
            "{:<4} {:>10} {}\n",
            run.status,
            format_duration(run.duration.as_ref()),
            run.name_with_package()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::parse_tests;

    #[test]
    fn renders_one_line_per_run() {
        let runs = parse_tests(
            "2025-04-09T00:25:01.1Z === RUN   TestX\n\
             2025-04-09T00:25:02.3Z --- PASS: TestX (1.23s)\n\
             2025-04-09T00:25:02.4Z === RUN   TestY\n\
             2025-04-09T00:25:03.4Z --- FAIL: TestY (1*.**s)",
        )
        .unwrap();
        assert_eq!(
            render_runs(&runs),
            "PASS      1.23s TestX\nFAIL     1*.**s TestY\n"
        );
    }
}
