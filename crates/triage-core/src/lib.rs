//! Go test CI log triage.
//!
//! Raw console output of `go test -v` runs goes in, structured [`model::TestRun`] records,
//! typed [`extract::ErrorDetail`] failure shapes and persisted
//! [`classify::ErrorClassification`] records come out.

pub mod classify;
pub mod config;
pub mod errors;
pub mod extract;
pub mod ingest;
pub mod model;
pub mod parse;
pub mod storage;

pub use classify::{ErrorCategory, ErrorClassification, ErrorClassifier};
pub use extract::ErrorDetail;
pub use model::{RunDuration, TestFailure, TestRun, TestStatus};
pub use parse::{parse_tests, ParseContext, ParseResult};
