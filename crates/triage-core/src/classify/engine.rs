//! The classification pass over a batch of failures.
//!
//! Order of precedence per failure: an existing decision (attached or stored for the run
//! id), an automatic rule, a stored decision for the same signature, then a human. Every
//! decision is persisted before it is attached, so a failed write leaves the item
//! unclassified for the next pass.

use super::prompt::{DecisionPrompt, DecisionRequest};
use super::rules::ClassificationRules;
use super::signature::ErrorSignature;
use super::{ClassificationSource, ErrorCategory, ErrorClassification};
use crate::errors::ClassifyError;
use crate::model::TestFailure;
use crate::storage::ClassificationStore;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info, warn};

/// Counts of one classification pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassificationReport {
    pub automatic: usize,
    pub reused: usize,
    pub manual: usize,
    /// Already classified before the pass.
    pub skipped: usize,
    /// Run ids the human declined without stopping.
    pub declined: Vec<String>,
    /// Run ids left untouched by an early stop.
    pub remaining: Vec<String>,
    pub stopped_early: bool,
}

impl ClassificationReport {
    pub fn classified(&self) -> usize {
        self.automatic + self.reused + self.manual
    }

    pub fn unclassified(&self) -> usize {
        self.declined.len() + self.remaining.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ErrorClassifier {
    rules: ClassificationRules,
}

impl ErrorClassifier {
    pub fn new(rules: ClassificationRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ClassificationRules {
        &self.rules
    }

    /// Classifies every unclassified failure in `failures`, attaching the decisions.
    ///
    /// Store reads happen once up front; each decision (or manual batch of similar
    /// failures) is written as soon as it is taken. A store or prompt error aborts the
    /// pass; decisions committed before it stay attached.
    pub fn classify(
        &self,
        failures: &mut [TestFailure],
        store: &dyn ClassificationStore,
        prompt: &mut dyn DecisionPrompt,
    ) -> Result<ClassificationReport, ClassifyError> {
        let mut report = ClassificationReport::default();
        let signatures: Vec<Option<ErrorSignature>> = failures
            .iter()
            .map(|f| ErrorSignature::of(&f.details))
            .collect();

        let mut worklist = Vec::new();
        let mut known: HashMap<ErrorSignature, ErrorCategory> = HashMap::new();
        for (idx, failure) in failures.iter_mut().enumerate() {
            if failure.classification.is_some() {
                report.skipped += 1;
                continue;
            }
            if let Some(existing) = store.lookup_run(&failure.run_id())? {
                failure.classification = Some(existing);
                report.skipped += 1;
                continue;
            }
            if let Some(sig) = &signatures[idx] {
                if !known.contains_key(sig) {
                    if let Some(previous) = store.lookup(sig)? {
                        known.insert(sig.clone(), previous.category);
                    }
                }
            }
            worklist.push(idx);
        }
        debug!(
            pending = worklist.len(),
            known_signatures = known.len(),
            "classification worklist ready"
        );

        let mut manual_queue = VecDeque::new();
        for idx in worklist {
            let failure = &mut failures[idx];
            let decided = match self.rules.classify(&failure.run.output_text()) {
                Some(category) => Some((category, ClassificationSource::Automatic)),
                None => signatures[idx]
                    .as_ref()
                    .and_then(|sig| known.get(sig))
                    .map(|&category| (category, ClassificationSource::Reused)),
            };
            let Some((category, source)) = decided else {
                manual_queue.push_back(idx);
                continue;
            };
            let record = ErrorClassification::for_failure(failure, category, source);
            store.persist(std::slice::from_ref(&record))?;
            info!(
                test = %failure.run.name,
                category = %category,
                source = source.as_str(),
                "classified"
            );
            failure.classification = Some(record);
            match source {
                ClassificationSource::Automatic => report.automatic += 1,
                _ => report.reused += 1,
            }
        }

        while let Some(idx) = manual_queue.pop_front() {
            let similar: Vec<usize> = manual_queue
                .iter()
                .copied()
                .filter(|&other| is_similar(failures, &signatures, idx, other))
                .collect();
            let failure = &failures[idx];
            let run_id = failure.run_id();
            let request = DecisionRequest {
                run_id: &run_id,
                test_name: &failure.run.name,
                summary: failure.details.to_string(),
                choices: &ErrorCategory::ALL,
                default: ErrorCategory::suggested_for(&failure.details),
                similar: similar.len(),
                remaining: manual_queue.len() + 1,
            };

            let Some(category) = prompt.choose(&request)? else {
                if prompt.confirm_stop()? {
                    report.stopped_early = true;
                    report.remaining.push(run_id);
                    report
                        .remaining
                        .extend(manual_queue.iter().map(|&i| failures[i].run_id()));
                    info!(remaining = report.remaining.len(), "classification stopped");
                    break;
                }
                report.declined.push(run_id);
                continue;
            };

            manual_queue.retain(|i| !similar.contains(i));
            let batch: Vec<usize> = std::iter::once(idx).chain(similar).collect();
            let records: Vec<ErrorClassification> = batch
                .iter()
                .map(|&i| {
                    ErrorClassification::for_failure(
                        &failures[i],
                        category,
                        ClassificationSource::Manual,
                    )
                })
                .collect();
            if let Err(e) = store.persist(&records) {
                warn!(error = %e, batch = records.len(), "failed to persist manual decision");
                return Err(e.into());
            }
            let classified = records.len();
            info!(
                test = %failures[idx].run.name,
                category = %category,
                similar = classified - 1,
                "classified manually"
            );
            for (i, record) in batch.into_iter().zip(records) {
                failures[i].classification = Some(record);
            }
            report.manual += classified;
        }

        Ok(report)
    }
}

/// Same signature, or the same run appearing twice in one batch.
fn is_similar(
    failures: &[TestFailure],
    signatures: &[Option<ErrorSignature>],
    a: usize,
    b: usize,
) -> bool {
    match (&signatures[a], &signatures[b]) {
        (Some(x), Some(y)) if x == y => true,
        _ => failures[a].run_id() == failures[b].run_id(),
    }
}
