//! Per-hierarchy dispatch
//!
//! Parents of all three hierarchies share the descriptive body, and line
//! items share [`LineItemBody`](crate::domain::LineItemBody), so these helpers
//! pick the right store for a [`Hierarchy`] and return common record types.

use super::{
    CabinetLineItemStore, CabinetStore, InpatientChildStore, InpatientLineItemStore,
    InpatientParentStore, OtherLineItemStore, OtherStore,
};
use crate::adapters::database::traits::RecordSession;
use crate::domain::ids::{ActorId, Hierarchy};
use crate::domain::payload::HisPayload;
use crate::domain::record::{ExportRecord, LineItem};
use crate::domain::Result;
use uuid::Uuid;

/// Look up a parent record
pub async fn find_parent(
    session: &dyn RecordSession,
    hierarchy: Hierarchy,
    external_id: i64,
) -> Result<Option<ExportRecord>> {
    match hierarchy {
        Hierarchy::Cabinet => CabinetStore::new().find_one(session, external_id).await,
        Hierarchy::Other => OtherStore::new().find_one(session, external_id).await,
        Hierarchy::Inpatient => InpatientParentStore::new().find_one(session, external_id).await,
    }
}

/// Upsert a parent record from a HIS payload
pub async fn upsert_parent(
    session: &dyn RecordSession,
    hierarchy: Hierarchy,
    payload: &HisPayload,
    actor: &ActorId,
) -> Result<ExportRecord> {
    match hierarchy {
        Hierarchy::Cabinet => CabinetStore::new().upsert_payload(session, payload, actor).await,
        Hierarchy::Other => OtherStore::new().upsert_payload(session, payload, actor).await,
        Hierarchy::Inpatient => {
            InpatientParentStore::new()
                .upsert_payload(session, payload, actor)
                .await
        }
    }
}

/// Persist a parent's working state
pub async fn set_parent_working_state(
    session: &dyn RecordSession,
    hierarchy: Hierarchy,
    parent: &ExportRecord,
    working_state_id: Option<i64>,
    actor: &ActorId,
) -> Result<ExportRecord> {
    match hierarchy {
        Hierarchy::Cabinet => {
            CabinetStore::new()
                .set_working_state(session, parent, working_state_id, actor)
                .await
        }
        Hierarchy::Other => {
            OtherStore::new()
                .set_working_state(session, parent, working_state_id, actor)
                .await
        }
        Hierarchy::Inpatient => {
            InpatientParentStore::new()
                .set_working_state(session, parent, working_state_id, actor)
                .await
        }
    }
}

/// Line items owned by any of `owner_external_ids`
///
/// Owners are parents for the flat hierarchies and inpatient children for
/// the nested one.
pub async fn line_items_of_owners(
    session: &dyn RecordSession,
    hierarchy: Hierarchy,
    owner_external_ids: &[i64],
) -> Result<Vec<LineItem>> {
    if owner_external_ids.is_empty() {
        return Ok(Vec::new());
    }
    match hierarchy {
        Hierarchy::Cabinet => {
            CabinetLineItemStore::new()
                .find_by_parent_ids(session, owner_external_ids)
                .await
        }
        Hierarchy::Other => {
            OtherLineItemStore::new()
                .find_by_parent_ids(session, owner_external_ids)
                .await
        }
        Hierarchy::Inpatient => {
            InpatientLineItemStore::new()
                .find_by_parent_ids(session, owner_external_ids)
                .await
        }
    }
}

/// Every line item under a parent; for inpatient, the union over its children
pub async fn line_items_of_parent(
    session: &dyn RecordSession,
    hierarchy: Hierarchy,
    parent_external_id: i64,
) -> Result<Vec<LineItem>> {
    if !hierarchy.is_nested() {
        return line_items_of_owners(session, hierarchy, &[parent_external_id]).await;
    }

    let children = InpatientChildStore::new()
        .find_by_parent_ids(session, &[parent_external_id])
        .await?;
    let child_ids: Vec<i64> = children.iter().map(|child| child.external_id).collect();
    line_items_of_owners(session, hierarchy, &child_ids).await
}

/// Local ids of line-item owners, keyed by external id
pub async fn owner_local_ids(
    session: &dyn RecordSession,
    hierarchy: Hierarchy,
    owner_external_ids: &[i64],
) -> Result<Vec<(i64, Uuid)>> {
    let owners = match hierarchy {
        Hierarchy::Cabinet => CabinetStore::new().find_by_external_ids(session, owner_external_ids).await?,
        Hierarchy::Other => OtherStore::new().find_by_external_ids(session, owner_external_ids).await?,
        Hierarchy::Inpatient => {
            InpatientChildStore::new()
                .find_by_external_ids(session, owner_external_ids)
                .await?
        }
    };
    Ok(owners
        .into_iter()
        .map(|owner| (owner.external_id, owner.local_id))
        .collect())
}
