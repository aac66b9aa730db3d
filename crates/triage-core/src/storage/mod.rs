//! Persistence of classification decisions.

pub mod memory;
pub mod schema;
pub mod sqlite;

pub use memory::MemoryClassificationStore;
pub use sqlite::SqliteClassificationStore;

use crate::classify::{ErrorClassification, ErrorSignature};
use crate::errors::StoreError;

/// Decisions keyed by run id and looked up by signature.
///
/// `persist` is an upsert per run id and never drops records of other runs; when several
/// runs share a signature, `lookup` returns the most recently persisted one.
pub trait ClassificationStore: Send + Sync {
    fn lookup(&self, signature: &ErrorSignature)
        -> Result<Option<ErrorClassification>, StoreError>;

    fn lookup_run(&self, run_id: &str) -> Result<Option<ErrorClassification>, StoreError>;

    fn persist(&self, batch: &[ErrorClassification]) -> Result<(), StoreError>;
}
