//! Reconciliation orchestrator
//!
//! Sequences a parent upsert with the full replacement of its children in
//! one transaction, syncs standalone inpatient children, and fans out
//! independent line-item upserts.

use super::report::BulkSyncReport;
use crate::adapters::database::traits::{RecordBackend, RecordSession, RecordTransaction};
use crate::core::store::hierarchy;
use crate::core::store::{
    CabinetLineItemShape, CabinetLineItemStore, EntityShape, InpatientChildShape,
    InpatientChildStore, InpatientLineItemShape, InpatientLineItemStore, OtherLineItemShape,
    OtherLineItemStore,
    RecordPatch, UpsertStore, ID_KEY, PARENT_KEY,
};
use crate::domain::ids::{ActorId, Hierarchy};
use crate::domain::payload::{FieldUpdate, HisPayload};
use crate::domain::record::{ExportRecord, LineItem};
use crate::domain::Result;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Default in-flight limit for bulk fan-out
///
/// Payloads in one batch run concurrently, so a batch repeating an external
/// id can race itself on PostgreSQL: both find no row, one insert wins and
/// the other is reported as a `storage_conflict` failure. Re-sending the
/// failed item resolves it as an update.
pub const DEFAULT_BULK_CONCURRENCY: usize = 8;

/// Children written by a sync
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "records", rename_all = "snake_case")]
pub enum SyncedChildren {
    /// No child payloads supplied; existing children left alone
    Unchanged,
    /// Line items of a flat hierarchy
    LineItems(Vec<LineItem>),
    /// Inpatient child records
    Children(Vec<ExportRecord>),
}

impl SyncedChildren {
    pub fn len(&self) -> usize {
        match self {
            SyncedChildren::Unchanged => 0,
            SyncedChildren::LineItems(items) => items.len(),
            SyncedChildren::Children(children) => children.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of [`ReconciliationOrchestrator::sync_with_children`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub parent: ExportRecord,
    pub children: SyncedChildren,
}

/// Sequences upserts across a hierarchy
pub struct ReconciliationOrchestrator {
    backend: Arc<dyn RecordBackend>,
    bulk_concurrency: usize,
}

impl ReconciliationOrchestrator {
    pub fn new(backend: Arc<dyn RecordBackend>, bulk_concurrency: usize) -> Self {
        Self {
            backend,
            bulk_concurrency: bulk_concurrency.max(1),
        }
    }

    /// Upsert a parent and replace all of its children, atomically
    ///
    /// Children are line items for the flat hierarchies and child records
    /// for inpatient. An empty `child_payloads` leaves existing children
    /// untouched. Any failure rolls the whole sync back.
    pub async fn sync_with_children(
        &self,
        hierarchy: Hierarchy,
        parent_payload: &HisPayload,
        child_payloads: &[HisPayload],
        actor: &ActorId,
    ) -> Result<SyncOutcome> {
        let tx = self.backend.begin().await?;
        let result = self
            .sync_in(tx.as_session(), hierarchy, parent_payload, child_payloads, actor)
            .await;

        match result {
            Ok(outcome) => {
                tx.commit().await?;
                tracing::info!(
                    hierarchy = %hierarchy,
                    external_id = outcome.parent.external_id,
                    children = outcome.children.len(),
                    version = outcome.parent.meta.version,
                    "Parent synced"
                );
                Ok(outcome)
            }
            Err(e) => {
                rollback_quietly(tx).await;
                tracing::error!(
                    hierarchy = %hierarchy,
                    external_id = ?parent_payload.integer(ID_KEY),
                    error = %e,
                    error_code = e.code(),
                    "Parent sync rolled back"
                );
                Err(e)
            }
        }
    }

    async fn sync_in(
        &self,
        session: &dyn RecordSession,
        hierarchy: Hierarchy,
        parent_payload: &HisPayload,
        child_payloads: &[HisPayload],
        actor: &ActorId,
    ) -> Result<SyncOutcome> {
        let parent = hierarchy::upsert_parent(session, hierarchy, parent_payload, actor).await?;
        let (parent_id, parent_local) = (parent.external_id, parent.local_id);

        let children = if child_payloads.is_empty() {
            SyncedChildren::Unchanged
        } else {
            match hierarchy {
                Hierarchy::Cabinet => SyncedChildren::LineItems(
                    CabinetLineItemStore::new()
                        .replace_for_parent(
                            session,
                            parent_id,
                            Some(parent_local),
                            child_payloads,
                            actor,
                        )
                        .await?,
                ),
                Hierarchy::Other => SyncedChildren::LineItems(
                    OtherLineItemStore::new()
                        .replace_for_parent(
                            session,
                            parent_id,
                            Some(parent_local),
                            child_payloads,
                            actor,
                        )
                        .await?,
                ),
                Hierarchy::Inpatient => SyncedChildren::Children(
                    InpatientChildStore::new()
                        .replace_for_parent(
                            session,
                            parent_id,
                            Some(parent_local),
                            child_payloads,
                            actor,
                        )
                        .await?,
                ),
            }
        };

        // Rows synced before their parent existed locally
        let backfilled = match hierarchy {
            Hierarchy::Cabinet => {
                CabinetLineItemStore::new()
                    .backfill_parent_local_id(session, parent_id, parent_local, actor)
                    .await?
            }
            Hierarchy::Other => {
                OtherLineItemStore::new()
                    .backfill_parent_local_id(session, parent_id, parent_local, actor)
                    .await?
            }
            Hierarchy::Inpatient => {
                InpatientChildStore::new()
                    .backfill_parent_local_id(session, parent_id, parent_local, actor)
                    .await?
            }
        };
        if backfilled > 0 {
            tracing::debug!(
                hierarchy = %hierarchy,
                external_id = parent_id,
                backfilled = backfilled,
                "Backfilled parent local id"
            );
        }

        // Replaced inpatient children get fresh local ids; their line items
        // must follow
        if let SyncedChildren::Children(children) = &children {
            let line_items = InpatientLineItemStore::new();
            for child in children {
                line_items
                    .backfill_parent_local_id(session, child.external_id, child.local_id, actor)
                    .await?;
            }
        }

        Ok(SyncOutcome { parent, children })
    }

    /// Upsert one inpatient child against a parent reference
    ///
    /// The parent may not exist locally yet; `parent_local_id` is then left
    /// empty and filled when the parent syncs.
    pub async fn sync_child(
        &self,
        payload: &HisPayload,
        parent_external_id: i64,
        parent_local_id: Option<Uuid>,
        actor: &ActorId,
    ) -> Result<ExportRecord> {
        let session = self.backend.as_session();

        let parent_local_id = match parent_local_id {
            Some(id) => Some(id),
            None => hierarchy::find_parent(session, Hierarchy::Inpatient, parent_external_id)
                .await?
                .map(|parent| parent.local_id),
        };

        let mut patch = RecordPatch::from_his::<InpatientChildShape>(payload)
            .with_parent_local_id(parent_local_id);
        patch.parent_external_id = FieldUpdate::Set(parent_external_id);

        InpatientChildStore::new()
            .upsert(session, id_value(payload), patch, actor)
            .await
    }

    /// Upsert line items independently, in autocommit mode
    ///
    /// Each payload's `PARENT_ID` names its owner (parent for flat
    /// hierarchies, child record for inpatient). Failures are logged and
    /// counted; results are reported in input order.
    pub async fn sync_line_items(
        &self,
        hierarchy: Hierarchy,
        payloads: &[HisPayload],
        actor: &ActorId,
    ) -> BulkSyncReport {
        let session = self.backend.as_session();

        let owner_ids: Vec<i64> = payloads
            .iter()
            .filter_map(|payload| payload.integer(PARENT_KEY))
            .collect();
        let owners: HashMap<i64, Uuid> =
            match hierarchy::owner_local_ids(session, hierarchy, &owner_ids).await {
                Ok(owners) => owners.into_iter().collect(),
                Err(e) => {
                    tracing::warn!(
                        hierarchy = %hierarchy,
                        error = %e,
                        "Owner lookup failed; line items keep an empty parent local id"
                    );
                    HashMap::new()
                }
            };

        let owners = &owners;
        let results: Vec<Result<LineItem>> = stream::iter(payloads)
            .map(|payload| async move {
                let owner_local = payload
                    .integer(PARENT_KEY)
                    .and_then(|owner| owners.get(&owner).copied());
                upsert_line_item(session, hierarchy, payload, owner_local, actor).await
            })
            .buffered(self.bulk_concurrency)
            .collect()
            .await;

        let mut report = BulkSyncReport::default();
        for (index, (payload, result)) in payloads.iter().zip(results).enumerate() {
            match result {
                Ok(_) => report.record_success(),
                Err(e) => {
                    let external_id = payload.integer(ID_KEY);
                    crate::log_bulk_failure!(hierarchy, index, external_id, e);
                    report.record_failure(index, external_id, &e);
                }
            }
        }

        tracing::info!(
            hierarchy = %hierarchy,
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            "Line-item bulk sync finished"
        );
        report
    }
}

fn id_value(payload: &HisPayload) -> &Value {
    payload.get(ID_KEY).unwrap_or(&Value::Null)
}

async fn upsert_line_item(
    session: &dyn RecordSession,
    hierarchy: Hierarchy,
    payload: &HisPayload,
    owner_local: Option<Uuid>,
    actor: &ActorId,
) -> Result<LineItem> {
    match hierarchy {
        Hierarchy::Cabinet => {
            upsert_owned::<CabinetLineItemShape>(session, payload, owner_local, actor).await
        }
        Hierarchy::Other => {
            upsert_owned::<OtherLineItemShape>(session, payload, owner_local, actor).await
        }
        Hierarchy::Inpatient => {
            upsert_owned::<InpatientLineItemShape>(session, payload, owner_local, actor).await
        }
    }
}

async fn upsert_owned<S>(
    session: &dyn RecordSession,
    payload: &HisPayload,
    owner_local: Option<Uuid>,
    actor: &ActorId,
) -> Result<LineItem>
where
    S: EntityShape<Body = crate::domain::record::LineItemBody>,
{
    let patch = RecordPatch::from_his::<S>(payload).with_parent_local_id(owner_local);
    UpsertStore::<S>::new()
        .upsert(session, id_value(payload), patch, actor)
        .await
}

async fn rollback_quietly(tx: Box<dyn RecordTransaction>) {
    if let Err(e) = tx.rollback().await {
        tracing::warn!(error = %e, "Rollback failed");
    }
}
