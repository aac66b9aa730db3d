use chrono::{Duration, Utc};
use triage_core::classify::{ClassificationSource, ErrorClassification, ErrorSignature, ScriptedPrompt};
use triage_core::storage::{ClassificationStore, SqliteClassificationStore};
use triage_core::{parse_tests, ErrorCategory, ErrorClassifier, TestFailure};

fn failure(name: &str, body: &str) -> TestFailure {
    let log = format!(
        "2025-04-09T00:25:01.1Z === RUN   {name}\n2025-04-09T00:25:01.2Z     {body}\n2025-04-09T00:25:01.3Z --- FAIL: {name} (0.20s)"
    );
    TestFailure::from_run(parse_tests(&log).unwrap().remove(0))
}

const API_BODY: &str =
    "Params: [/api/atlas/v2/groups/67f5be5fe7455b55f206ba3e/settings], GET: HTTP 404 (Error code: \"RESOURCE_NOT_FOUND\")";

#[test]
fn test_persist_and_reopen_file_store() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("triage.db");
    let f = failure("TestAccProject_basic", API_BODY);
    let record = ErrorClassification::for_failure(&f, ErrorCategory::Flaky400, ClassificationSource::Manual);

    {
        let store = SqliteClassificationStore::open(&path)?;
        store.persist(std::slice::from_ref(&record))?;
    }

    let store = SqliteClassificationStore::open(&path)?;
    let by_run = store.lookup_run(&f.run_id())?.expect("stored by run id");
    assert_eq!(by_run.category, ErrorCategory::Flaky400);
    assert_eq!(by_run.details, f.details);
    assert_eq!(by_run.classified_at, record.classified_at);
    let sig = ErrorSignature::of(&f.details).unwrap();
    assert_eq!(store.lookup(&sig)?.map(|c| c.run_id), Some(f.run_id()));
    Ok(())
}

#[test]
fn test_upsert_per_run_and_latest_signature_wins() -> anyhow::Result<()> {
    let store = SqliteClassificationStore::memory()?;
    let a = failure("TestA", API_BODY);
    let b = failure("TestB", API_BODY);

    let mut first = ErrorClassification::for_failure(&a, ErrorCategory::Flaky400, ClassificationSource::Manual);
    store.persist(std::slice::from_ref(&first))?;
    let second = ErrorClassification::for_failure(&b, ErrorCategory::DanglingResource, ClassificationSource::Manual);
    store.persist(std::slice::from_ref(&second))?;
    assert_eq!(store.count()?, 2);

    let sig = ErrorSignature::of(&a.details).unwrap();
    assert_eq!(
        store.lookup(&sig)?.map(|c| c.category),
        Some(ErrorCategory::DanglingResource)
    );

    first.category = ErrorCategory::Unknown;
    first.classified_at = Utc::now() + Duration::seconds(1);
    store.persist(&[first])?;
    assert_eq!(store.count()?, 2);
    assert_eq!(
        store.lookup(&sig)?.map(|c| c.category),
        Some(ErrorCategory::Unknown)
    );
    Ok(())
}

#[test]
fn test_default_errors_are_stored_without_signature() -> anyhow::Result<()> {
    let store = SqliteClassificationStore::memory()?;
    let f = failure("TestPanic", "panic: runtime error");
    let record = ErrorClassification::for_failure(&f, ErrorCategory::RealTestFailure, ClassificationSource::Manual);
    assert!(record.signature.is_none());
    store.persist(&[record])?;
    let stored = store.lookup_run(&f.run_id())?.unwrap();
    assert!(stored.signature.is_none());
    assert_eq!(stored.source, ClassificationSource::Manual);
    Ok(())
}

#[test]
fn test_classifier_round_trip_through_sqlite() -> anyhow::Result<()> {
    let store = SqliteClassificationStore::memory()?;
    let mut items = vec![failure("TestA", API_BODY)];
    let mut prompt = ScriptedPrompt::new([Some(ErrorCategory::Flaky400)]);
    ErrorClassifier::default().classify(&mut items, &store, &mut prompt)?;

    let mut again = vec![failure("TestB", API_BODY)];
    let mut silent = ScriptedPrompt::default();
    let report = ErrorClassifier::default().classify(&mut again, &store, &mut silent)?;
    assert_eq!(report.reused, 1);
    assert!(silent.asked.is_empty());
    Ok(())
}
