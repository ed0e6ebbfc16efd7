//! Reconciliation of HIS records into the local store

pub mod orchestrator;
pub mod report;

pub use orchestrator::{
    ReconciliationOrchestrator, SyncOutcome, SyncedChildren, DEFAULT_BULK_CONCURRENCY,
};
pub use report::{BulkFailure, BulkSyncReport};
