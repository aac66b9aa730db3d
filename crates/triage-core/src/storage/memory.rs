use super::ClassificationStore;
use crate::classify::{ErrorClassification, ErrorSignature};
use crate::errors::StoreError;
use std::sync::{Mutex, MutexGuard};

/// In-process store; records are kept in write order.
#[derive(Debug, Default)]
pub struct MemoryClassificationStore {
    records: Mutex<Vec<ErrorClassification>>,
}

impl MemoryClassificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records(&self) -> Result<Vec<ErrorClassification>, StoreError> {
        Ok(self.guard()?.clone())
    }

    fn guard(&self) -> Result<MutexGuard<'_, Vec<ErrorClassification>>, StoreError> {
        self.records
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

impl ClassificationStore for MemoryClassificationStore {
    fn lookup(
        &self,
        signature: &ErrorSignature,
    ) -> Result<Option<ErrorClassification>, StoreError> {
        let records = self.guard()?;
        Ok(records
            .iter()
            .rev()
            .find(|r| r.signature.as_ref() == Some(signature))
            .cloned())
    }

    fn lookup_run(&self, run_id: &str) -> Result<Option<ErrorClassification>, StoreError> {
        let records = self.guard()?;
        Ok(records.iter().find(|r| r.run_id == run_id).cloned())
    }

    fn persist(&self, batch: &[ErrorClassification]) -> Result<(), StoreError> {
        let mut records = self.guard()?;
        for record in batch {
            records.retain(|r| r.run_id != record.run_id);
            records.push(record.clone());
        }
        Ok(())
    }
}
