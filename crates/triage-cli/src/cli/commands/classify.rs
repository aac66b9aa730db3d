use super::ingest_options;
use crate::cli::args::ClassifyArgs;
use crate::cli::prompt::DialoguerPrompt;
use crate::exit_codes;
use anyhow::Context;
use std::sync::Arc;
use triage_core::classify::{
    ClassificationReport, ClassificationSummary, DecisionPrompt, NonInteractivePrompt,
};
use triage_core::config::TriageConfig;
use triage_core::ingest::{ingest_logs, DirLogSource};
use triage_core::storage::SqliteClassificationStore;
use triage_core::ErrorClassifier;

pub async fn run(args: ClassifyArgs, cfg: &TriageConfig) -> anyhow::Result<i32> {
    let options = ingest_options(cfg, &args.overrides);
    let ingested = ingest_logs(Arc::new(DirLogSource::new(&args.dir)), options).await?;
    let mut failures = ingested.test_failures();
    tracing::info!(
        runs = ingested.runs.len(),
        failures = failures.len(),
        "logs ingested"
    );

    let db = args.db.clone().unwrap_or_else(|| cfg.store.path.clone());
    let store = SqliteClassificationStore::open(&db)
        .with_context(|| format!("failed to open classification store {}", db.display()))?;
    let classifier = ErrorClassifier::new(cfg.classify.rules());

    let mut prompt: Box<dyn DecisionPrompt> = if args.non_interactive {
        Box::new(NonInteractivePrompt)
    } else {
        Box::new(DialoguerPrompt::default())
    };
    let outcome = tokio::task::block_in_place(|| {
        classifier.classify(&mut failures, &store, prompt.as_mut())
    })?;

    print!(
        "{}",
        render_outcome(&ClassificationSummary::from_failures(&failures), &outcome)
    );
    Ok(if ingested.is_complete() && outcome.unclassified() == 0 {
        exit_codes::SUCCESS
    } else {
        exit_codes::PARTIAL
    })
}

pub(crate) fn render_outcome(
    summary: &ClassificationSummary,
    outcome: &ClassificationReport,
) -> String {
    let mut out = String::new();
    for (category, tests) in &summary.by_category {
        out.push_str(&format!(
            "{category} ({}): {}\n",
            category.action(),
            tests.len()
        ));
        for test in tests {
            out.push_str(&format!("  {test}\n"));
        }
    }
    if !summary.unclassified.is_empty() {
        out.push_str(&format!("unclassified: {}\n", summary.unclassified.len()));
    }
    out.push_str(&format!(
        "automatic={} reused={} manual={} already={}{}\n",
        outcome.automatic,
        outcome.reused,
        outcome.manual,
        outcome.skipped,
        if outcome.stopped_early {
            " (stopped early)"
        } else {
            ""
        }
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::classify::ScriptedPrompt;
    use triage_core::storage::MemoryClassificationStore;
    use triage_core::{parse_tests, ErrorCategory, TestFailure};

    #[test]
    fn outcome_lists_categories_with_actions() {
        let mut failures: Vec<TestFailure> = parse_tests(
            "2025-04-09T00:25:01.1Z === RUN   TestX\n\
             2025-04-09T00:25:01.2Z     POST: HTTP 409 (request \"OUT_OF_CAPACITY\")\n\
             2025-04-09T00:25:02.3Z --- FAIL: TestX (1.23s)\n\
             2025-04-09T00:25:02.4Z === RUN   TestY\n\
             2025-04-09T00:25:02.5Z     panic: boom\n\
             2025-04-09T00:25:03.3Z --- FAIL: TestY (0.90s)",
        )
        .unwrap()
        .into_iter()
        .map(TestFailure::from_run)
        .collect();
        let store = MemoryClassificationStore::new();
        let outcome = ErrorClassifier::default()
            .classify(&mut failures, &store, &mut ScriptedPrompt::new([None]))
            .unwrap();
        let text = render_outcome(&ClassificationSummary::from_failures(&failures), &outcome);
        assert_eq!(
            text,
            "OUT_OF_CAPACITY (retry_later): 1\n  TestX\nunclassified: 1\n\
             automatic=1 reused=0 manual=0 already=0 (stopped early)\n"
        );
    }
}
