//! Bulk sync report

use crate::domain::MedSyncError;
use serde::{Deserialize, Serialize};

/// One failed item of a bulk sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkFailure {
    /// Position in the input
    pub index: usize,
    /// Decoded external id, when the payload carried one
    pub external_id: Option<i64>,
    pub code: String,
    pub message: String,
}

/// Outcome counts of a bulk sync; failures never abort siblings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkSyncReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<BulkFailure>,
}

impl BulkSyncReport {
    pub fn record_success(&mut self) {
        self.attempted += 1;
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, index: usize, external_id: Option<i64>, error: &MedSyncError) {
        self.attempted += 1;
        self.failed += 1;
        self.failures.push(BulkFailure {
            index,
            external_id,
            code: error.code().to_string(),
            message: error.to_string(),
        });
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed == 0
    }
}
