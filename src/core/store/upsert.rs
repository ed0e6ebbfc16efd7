//! Natural-key upsert store
//!
//! [`UpsertStore`] is the one create-or-update implementation shared by every
//! entity kind. It runs against any [`RecordSession`], so the same code serves
//! autocommit calls and the orchestrator's transactions.

use super::shape::{EntityShape, RecordPatch, ID_KEY, PARENT_KEY};
use crate::adapters::database::traits::{RecordSession, StoredRow};
use crate::domain::ids::ActorId;
use crate::domain::payload::{FieldUpdate, HisPayload};
use crate::domain::record::{Record, RecordMeta};
use crate::domain::{wire, MedSyncError, Result};
use chrono::Utc;
use serde_json::Value;
use std::collections::HashSet;
use std::marker::PhantomData;
use uuid::Uuid;

/// Idempotent create-or-update keyed by external id, for shape `S`
pub struct UpsertStore<S: EntityShape> {
    _shape: PhantomData<fn() -> S>,
}

impl<S: EntityShape> Clone for UpsertStore<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: EntityShape> Copy for UpsertStore<S> {}

impl<S: EntityShape> Default for UpsertStore<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: EntityShape> std::fmt::Debug for UpsertStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpsertStore")
            .field("kind", &S::KIND)
            .finish()
    }
}

fn to_row<S: EntityShape>(record: &Record<S::Body>) -> Result<StoredRow> {
    Ok(Record {
        local_id: record.local_id,
        external_id: record.external_id,
        parent_external_id: record.parent_external_id,
        parent_local_id: record.parent_local_id,
        working_state_id: record.working_state_id,
        meta: record.meta.clone(),
        body: serde_json::to_value(&record.body)?,
    })
}

fn from_row<S: EntityShape>(row: StoredRow) -> Result<Record<S::Body>> {
    let body = serde_json::from_value(row.body).map_err(|e| {
        MedSyncError::Serialization(format!(
            "Stored body of {} row {} is invalid: {}",
            S::KIND.table_name(),
            row.local_id,
            e
        ))
    })?;

    Ok(Record {
        local_id: row.local_id,
        external_id: row.external_id,
        parent_external_id: row.parent_external_id,
        parent_local_id: row.parent_local_id,
        working_state_id: row.working_state_id,
        meta: row.meta,
        body,
    })
}

/// Distinct ids, first occurrence order
fn distinct(ids: &[i64]) -> Vec<i64> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

impl<S: EntityShape> UpsertStore<S> {
    pub fn new() -> Self {
        Self {
            _shape: PhantomData,
        }
    }

    /// Create or update the record identified by `external_id`
    ///
    /// Only fields present in the patch change; a present `null` clears the
    /// field. `working_state_id` is never touched here.
    ///
    /// # Errors
    ///
    /// - `FieldInvalid` if the id (or a required parent reference) does not decode
    /// - `StorageConflict` if a concurrent sync inserted the same id first
    pub async fn upsert(
        &self,
        session: &dyn RecordSession,
        external_id: &Value,
        patch: RecordPatch<S::Patch>,
        actor: &ActorId,
    ) -> Result<Record<S::Body>> {
        let external_id = wire::decode_required(Some(external_id), ID_KEY)?;
        self.upsert_decoded(session, external_id, patch, actor).await
    }

    /// Upsert straight from a HIS payload
    pub async fn upsert_payload(
        &self,
        session: &dyn RecordSession,
        payload: &HisPayload,
        actor: &ActorId,
    ) -> Result<Record<S::Body>> {
        let external_id = payload.required_integer(ID_KEY)?;
        let patch = RecordPatch::from_his::<S>(payload);
        self.upsert_decoded(session, external_id, patch, actor).await
    }

    async fn upsert_decoded(
        &self,
        session: &dyn RecordSession,
        external_id: i64,
        patch: RecordPatch<S::Patch>,
        actor: &ActorId,
    ) -> Result<Record<S::Body>> {
        let now = Utc::now();

        match self.find_one(session, external_id).await? {
            Some(mut record) => {
                let previous_parent = record.parent_external_id;
                patch
                    .parent_external_id
                    .apply_to(&mut record.parent_external_id);
                self.check_parent(record.parent_external_id)?;

                if patch.parent_local_id.is_some() {
                    record.parent_local_id = patch.parent_local_id;
                } else if record.parent_external_id != previous_parent {
                    record.parent_local_id = None;
                }

                S::apply_patch(&mut record.body, patch.body);
                record.meta.touch(actor, now);

                let stored = session.update_row(S::KIND, &to_row::<S>(&record)?).await?;

                tracing::debug!(
                    kind = %S::KIND,
                    external_id = external_id,
                    version = stored.meta.version,
                    "Record updated"
                );
                from_row::<S>(stored)
            }
            None => {
                let parent_external_id = match patch.parent_external_id {
                    FieldUpdate::Set(id) => Some(id),
                    FieldUpdate::Absent | FieldUpdate::Clear => None,
                };
                self.check_parent(parent_external_id)?;

                let mut body = S::Body::default();
                S::apply_patch(&mut body, patch.body);

                let record = Record {
                    local_id: Uuid::new_v4(),
                    external_id,
                    parent_external_id,
                    parent_local_id: patch.parent_local_id,
                    working_state_id: None,
                    meta: RecordMeta::created(actor, now),
                    body,
                };
                session.insert_row(S::KIND, &to_row::<S>(&record)?).await?;

                tracing::debug!(
                    kind = %S::KIND,
                    external_id = external_id,
                    local_id = %record.local_id,
                    "Record created"
                );
                Ok(record)
            }
        }
    }

    fn check_parent(&self, parent_external_id: Option<i64>) -> Result<()> {
        if S::KIND.requires_parent() && parent_external_id.is_none() {
            return Err(MedSyncError::field_invalid(
                PARENT_KEY,
                format!("{} rows must reference a parent", S::KIND.table_name()),
            ));
        }
        Ok(())
    }

    /// Batch lookup by external id, chunked to the session's bind limit
    ///
    /// Results are unordered.
    pub async fn find_by_external_ids(
        &self,
        session: &dyn RecordSession,
        external_ids: &[i64],
    ) -> Result<Vec<Record<S::Body>>> {
        let ids = distinct(external_ids);
        let mut records = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(session.max_bind_params().max(1)) {
            for row in session.find_by_external_ids(S::KIND, chunk).await? {
                records.push(from_row::<S>(row)?);
            }
        }
        Ok(records)
    }

    /// Single lookup by external id
    pub async fn find_one(
        &self,
        session: &dyn RecordSession,
        external_id: i64,
    ) -> Result<Option<Record<S::Body>>> {
        Ok(self
            .find_by_external_ids(session, &[external_id])
            .await?
            .into_iter()
            .next())
    }

    /// Rows owned by any of `parent_external_ids`, chunked like
    /// [`find_by_external_ids`](Self::find_by_external_ids)
    pub async fn find_by_parent_ids(
        &self,
        session: &dyn RecordSession,
        parent_external_ids: &[i64],
    ) -> Result<Vec<Record<S::Body>>> {
        let ids = distinct(parent_external_ids);
        let mut records = Vec::new();
        for chunk in ids.chunks(session.max_bind_params().max(1)) {
            for row in session.find_by_parent_ids(S::KIND, chunk).await? {
                records.push(from_row::<S>(row)?);
            }
        }
        Ok(records)
    }

    /// Delete every row owned by the parent and recreate from `payloads`
    ///
    /// Each payload's parent reference is forced to `parent_external_id`.
    /// Must run inside a transaction to be atomic.
    pub async fn replace_for_parent(
        &self,
        session: &dyn RecordSession,
        parent_external_id: i64,
        parent_local_id: Option<Uuid>,
        payloads: &[HisPayload],
        actor: &ActorId,
    ) -> Result<Vec<Record<S::Body>>> {
        let deleted = session
            .delete_by_parent_id(S::KIND, parent_external_id)
            .await?;

        let mut records = Vec::with_capacity(payloads.len());
        for payload in payloads {
            let external_id = payload.required_integer(ID_KEY)?;
            let mut patch = RecordPatch::from_his::<S>(payload).with_parent_local_id(parent_local_id);
            patch.parent_external_id = FieldUpdate::Set(parent_external_id);

            records.push(
                self.upsert_decoded(session, external_id, patch, actor)
                    .await?,
            );
        }

        tracing::debug!(
            kind = %S::KIND,
            parent_external_id = parent_external_id,
            deleted = deleted,
            created = records.len(),
            "Replaced rows for parent"
        );
        Ok(records)
    }

    /// Write the working state of a record (engine-only path)
    pub async fn set_working_state(
        &self,
        session: &dyn RecordSession,
        record: &Record<S::Body>,
        working_state_id: Option<i64>,
        actor: &ActorId,
    ) -> Result<Record<S::Body>> {
        let stored = session
            .update_working_state(
                S::KIND,
                record.local_id,
                working_state_id,
                actor.as_str(),
                Utc::now(),
            )
            .await?;
        from_row::<S>(stored)
    }

    /// Re-point the cached parent local id of rows owned by `parent_external_id`
    ///
    /// Fills rows synced before their parent and fixes rows still caching the
    /// local id of a replaced parent.
    pub async fn backfill_parent_local_id(
        &self,
        session: &dyn RecordSession,
        parent_external_id: i64,
        parent_local_id: Uuid,
        actor: &ActorId,
    ) -> Result<u64> {
        session
            .backfill_parent_local_id(
                S::KIND,
                parent_external_id,
                parent_local_id,
                actor.as_str(),
                Utc::now(),
            )
            .await
    }
}
