//! In-memory record backend
//!
//! Holds every table in one mutex-guarded map. Transactions take the lock for
//! their whole lifetime and keep a snapshot to restore on rollback or drop,
//! so they are fully isolated (and fully serialized).

use crate::adapters::database::traits::{
    RecordBackend, RecordSession, RecordTransaction, StoredRow, DEFAULT_MAX_BIND_PARAMS,
};
use crate::domain::ids::EntityKind;
use crate::domain::{MedSyncError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct Tables {
    rows: HashMap<EntityKind, Vec<StoredRow>>,
}

impl Tables {
    fn table(&mut self, kind: EntityKind) -> &mut Vec<StoredRow> {
        self.rows.entry(kind).or_default()
    }

    fn find_by_external_ids(&mut self, kind: EntityKind, ids: &[i64]) -> Vec<StoredRow> {
        self.table(kind)
            .iter()
            .filter(|row| ids.contains(&row.external_id))
            .cloned()
            .collect()
    }

    fn find_by_parent_ids(&mut self, kind: EntityKind, parent_ids: &[i64]) -> Vec<StoredRow> {
        self.table(kind)
            .iter()
            .filter(|row| {
                row.parent_external_id
                    .is_some_and(|parent| parent_ids.contains(&parent))
            })
            .cloned()
            .collect()
    }

    fn insert_row(&mut self, kind: EntityKind, row: &StoredRow) -> Result<()> {
        let table = self.table(kind);
        if table.iter().any(|r| r.external_id == row.external_id) {
            return Err(MedSyncError::StorageConflict(format!(
                "{} already holds external_id {}",
                kind.table_name(),
                row.external_id
            )));
        }
        if table.iter().any(|r| r.local_id == row.local_id) {
            return Err(MedSyncError::StorageConflict(format!(
                "{} already holds local_id {}",
                kind.table_name(),
                row.local_id
            )));
        }
        table.push(row.clone());
        Ok(())
    }

    fn row_mut(&mut self, kind: EntityKind, local_id: Uuid) -> Result<&mut StoredRow> {
        self.table(kind)
            .iter_mut()
            .find(|r| r.local_id == local_id)
            .ok_or_else(|| {
                MedSyncError::NotFound(format!("{} row {}", kind.table_name(), local_id))
            })
    }

    fn update_row(&mut self, kind: EntityKind, row: &StoredRow) -> Result<StoredRow> {
        let stored = self.row_mut(kind, row.local_id)?;
        stored.parent_external_id = row.parent_external_id;
        stored.parent_local_id = row.parent_local_id;
        stored.body = row.body.clone();
        stored.meta.version += 1;
        stored.meta.updated_at = row.meta.updated_at;
        stored.meta.updated_by = row.meta.updated_by.clone();
        stored.meta.is_deleted = row.meta.is_deleted;
        Ok(stored.clone())
    }

    fn update_working_state(
        &mut self,
        kind: EntityKind,
        local_id: Uuid,
        working_state_id: Option<i64>,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<StoredRow> {
        let stored = self.row_mut(kind, local_id)?;
        stored.working_state_id = working_state_id;
        stored.meta.version += 1;
        stored.meta.updated_at = now;
        stored.meta.updated_by = actor.to_string();
        Ok(stored.clone())
    }

    fn delete_by_parent_id(&mut self, kind: EntityKind, parent_external_id: i64) -> u64 {
        let table = self.table(kind);
        let before = table.len();
        table.retain(|row| row.parent_external_id != Some(parent_external_id));
        (before - table.len()) as u64
    }

    fn backfill_parent_local_id(
        &mut self,
        kind: EntityKind,
        parent_external_id: i64,
        parent_local_id: Uuid,
        actor: &str,
        now: DateTime<Utc>,
    ) -> u64 {
        let mut updated = 0;
        for row in self.table(kind).iter_mut() {
            if row.parent_external_id == Some(parent_external_id)
                && row.parent_local_id != Some(parent_local_id)
            {
                row.parent_local_id = Some(parent_local_id);
                row.meta.version += 1;
                row.meta.updated_at = now;
                row.meta.updated_by = actor.to_string();
                updated += 1;
            }
        }
        updated
    }
}

/// In-memory implementation of the record traits
///
/// Used for local runs (`database_target = "memory"`) and tests.
pub struct MemoryBackend {
    tables: Arc<AsyncMutex<Tables>>,
    max_bind_params: usize,
    lookups: Arc<AtomicUsize>,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::with_max_bind_params(DEFAULT_MAX_BIND_PARAMS)
    }

    /// Create an empty backend with a custom lookup chunk size
    pub fn with_max_bind_params(max_bind_params: usize) -> Self {
        Self {
            tables: Arc::new(AsyncMutex::new(Tables::default())),
            max_bind_params: max_bind_params.max(1),
            lookups: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of rows currently stored for `kind`
    pub async fn row_count(&self, kind: EntityKind) -> usize {
        self.tables.lock().await.table(kind).len()
    }

    /// All rows currently stored for `kind`
    pub async fn rows(&self, kind: EntityKind) -> Vec<StoredRow> {
        self.tables.lock().await.table(kind).clone()
    }

    /// Number of lookup statements executed so far
    pub fn lookup_statements(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }

    async fn with_tables<R>(&self, f: impl FnOnce(&mut Tables) -> R + Send) -> R {
        let mut tables = self.tables.lock().await;
        f(&mut tables)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

struct TxState {
    guard: OwnedMutexGuard<Tables>,
    snapshot: Tables,
}

/// Transaction over the in-memory backend
pub struct MemoryTransaction {
    state: Mutex<Option<TxState>>,
    max_bind_params: usize,
    lookups: Arc<AtomicUsize>,
}

impl MemoryTransaction {
    async fn with_tables<R>(&self, f: impl FnOnce(&mut Tables) -> R + Send) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match state.as_mut() {
            Some(tx) => f(&mut tx.guard),
            // Only reachable after commit/rollback consumed the transaction
            None => f(&mut Tables::default()),
        }
    }

    fn finish(&self, keep_writes: bool) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut tx) = state.take() {
            if !keep_writes {
                *tx.guard = std::mem::take(&mut tx.snapshot);
            }
        }
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut tx) = state.take() {
            tracing::warn!("In-memory transaction dropped without commit; restoring snapshot");
            *tx.guard = std::mem::take(&mut tx.snapshot);
        }
    }
}

macro_rules! impl_memory_session {
    ($ty:ty) => {
        #[async_trait]
        impl RecordSession for $ty {
            async fn find_by_external_ids(
                &self,
                kind: EntityKind,
                external_ids: &[i64],
            ) -> Result<Vec<StoredRow>> {
                self.lookups.fetch_add(1, Ordering::Relaxed);
                Ok(self
                    .with_tables(|t| t.find_by_external_ids(kind, external_ids))
                    .await)
            }

            async fn find_by_parent_ids(
                &self,
                kind: EntityKind,
                parent_external_ids: &[i64],
            ) -> Result<Vec<StoredRow>> {
                self.lookups.fetch_add(1, Ordering::Relaxed);
                Ok(self
                    .with_tables(|t| t.find_by_parent_ids(kind, parent_external_ids))
                    .await)
            }

            async fn insert_row(&self, kind: EntityKind, row: &StoredRow) -> Result<()> {
                self.with_tables(|t| t.insert_row(kind, row)).await
            }

            async fn update_row(&self, kind: EntityKind, row: &StoredRow) -> Result<StoredRow> {
                self.with_tables(|t| t.update_row(kind, row)).await
            }

            async fn update_working_state(
                &self,
                kind: EntityKind,
                local_id: Uuid,
                working_state_id: Option<i64>,
                actor: &str,
                now: DateTime<Utc>,
            ) -> Result<StoredRow> {
                self.with_tables(|t| {
                    t.update_working_state(kind, local_id, working_state_id, actor, now)
                })
                .await
            }

            async fn delete_by_parent_id(
                &self,
                kind: EntityKind,
                parent_external_id: i64,
            ) -> Result<u64> {
                Ok(self
                    .with_tables(|t| t.delete_by_parent_id(kind, parent_external_id))
                    .await)
            }

            async fn backfill_parent_local_id(
                &self,
                kind: EntityKind,
                parent_external_id: i64,
                parent_local_id: Uuid,
                actor: &str,
                now: DateTime<Utc>,
            ) -> Result<u64> {
                Ok(self
                    .with_tables(|t| {
                        t.backfill_parent_local_id(
                            kind,
                            parent_external_id,
                            parent_local_id,
                            actor,
                            now,
                        )
                    })
                    .await)
            }

            fn max_bind_params(&self) -> usize {
                self.max_bind_params
            }
        }
    };
}

impl_memory_session!(MemoryBackend);
impl_memory_session!(MemoryTransaction);

#[async_trait]
impl RecordTransaction for MemoryTransaction {
    fn as_session(&self) -> &dyn RecordSession {
        self
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.finish(true);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.finish(false);
        Ok(())
    }
}

#[async_trait]
impl RecordBackend for MemoryBackend {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_session(&self) -> &dyn RecordSession {
        self
    }

    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn RecordTransaction>> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let snapshot = guard.clone();
        Ok(Box::new(MemoryTransaction {
            state: Mutex::new(Some(TxState { guard, snapshot })),
            max_bind_params: self.max_bind_params,
            lookups: Arc::clone(&self.lookups),
        }))
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}
