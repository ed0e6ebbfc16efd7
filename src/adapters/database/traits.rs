//! Database abstraction traits
//!
//! This module defines the traits that storage adapters must implement to
//! hold reconciled records. Every entity kind is one table with the same
//! reconciliation columns, so a single row type ([`StoredRow`]) and a single
//! set of operations serve all seven kinds.

use crate::domain::ids::EntityKind;
use crate::domain::{Record, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::any::Any;
use uuid::Uuid;

/// Default upper bound on ids per lookup statement
pub const DEFAULT_MAX_BIND_PARAMS: usize = 900;

/// A persisted row with an untyped JSON body
pub type StoredRow = Record<serde_json::Value>;

/// Operations available on a connection, inside or outside a transaction
///
/// Rows are matched on `external_id`, which adapters must keep unique per
/// entity kind. Inserts that would duplicate one fail with
/// [`MedSyncError::StorageConflict`](crate::domain::MedSyncError::StorageConflict).
#[async_trait]
pub trait RecordSession: Send + Sync {
    /// Rows whose external id is in `external_ids`, in no particular order
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    async fn find_by_external_ids(
        &self,
        kind: EntityKind,
        external_ids: &[i64],
    ) -> Result<Vec<StoredRow>>;

    /// Rows owned by any of `parent_external_ids`, in no particular order
    async fn find_by_parent_ids(
        &self,
        kind: EntityKind,
        parent_external_ids: &[i64],
    ) -> Result<Vec<StoredRow>>;

    /// Insert a new row
    ///
    /// # Errors
    ///
    /// Returns `StorageConflict` if the external id already exists.
    async fn insert_row(&self, kind: EntityKind, row: &StoredRow) -> Result<()>;

    /// Persist body, parent reference and audit columns of an existing row
    ///
    /// The adapter increments the stored `version` by one and leaves
    /// `working_state_id` untouched. Returns the row as stored.
    async fn update_row(&self, kind: EntityKind, row: &StoredRow) -> Result<StoredRow>;

    /// Set the working state of a row, incrementing its `version` by one
    async fn update_working_state(
        &self,
        kind: EntityKind,
        local_id: Uuid,
        working_state_id: Option<i64>,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<StoredRow>;

    /// Delete every row owned by `parent_external_id`
    async fn delete_by_parent_id(&self, kind: EntityKind, parent_external_id: i64) -> Result<u64>;

    /// Point `parent_local_id` of rows referencing the parent at its current
    /// local id
    ///
    /// Covers rows synced before the parent existed and rows still caching
    /// the local id of a replaced parent. Only rows that change get their
    /// `version` incremented.
    async fn backfill_parent_local_id(
        &self,
        kind: EntityKind,
        parent_external_id: i64,
        parent_local_id: Uuid,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<u64>;

    /// Maximum ids per lookup statement
    fn max_bind_params(&self) -> usize {
        DEFAULT_MAX_BIND_PARAMS
    }
}

/// An open transaction
///
/// Dropping a transaction without calling [`commit`](Self::commit) or
/// [`rollback`](Self::rollback) must leave none of its writes visible.
#[async_trait]
pub trait RecordTransaction: RecordSession {
    /// View as a plain session
    fn as_session(&self) -> &dyn RecordSession;

    /// Make all writes visible
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discard all writes
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Storage backend for reconciled records
///
/// Operations called directly on the backend run in autocommit mode.
#[async_trait]
pub trait RecordBackend: RecordSession {
    /// Downcast to Any for type-specific operations
    fn as_any(&self) -> &dyn Any;

    /// View as a plain (autocommit) session
    fn as_session(&self) -> &dyn RecordSession;

    /// Test the database connection
    async fn test_connection(&self) -> Result<()>;

    /// Create tables, constraints and indexes if they don't exist
    async fn ensure_schema(&self) -> Result<()>;

    /// Open a transaction
    async fn begin(&self) -> Result<Box<dyn RecordTransaction>>;

    /// Short backend name for logs
    fn backend_name(&self) -> &str;
}
