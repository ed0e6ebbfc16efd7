//! Reconciliation service
//!
//! The outbound surface of the engine: reconcile a parent with its children,
//! evaluate or summarize its working state, and the standalone/bulk sync
//! paths. Transport layers (CLI, RPC) call only this type.

use crate::adapters::catalog::StateCatalog;
use crate::adapters::database::traits::RecordBackend;
use crate::config::schema::MedSyncConfig;
use crate::core::notify::ChangeNotifier;
use crate::core::reconcile::{BulkSyncReport, ReconciliationOrchestrator, SyncOutcome};
use crate::core::working_state::{
    EngineSettings, Evaluation, WorkingStateEngine, WorkingStateSummary,
};
use crate::domain::ids::{ActorId, Hierarchy};
use crate::domain::payload::HisPayload;
use crate::domain::record::ExportRecord;
use crate::domain::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Service settings drawn from configuration
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub engine: EngineSettings,
    pub bulk_concurrency: usize,
    /// Run [`ReconciliationService::evaluate_working_state`] after each reconcile
    pub evaluate_after_sync: bool,
}

impl ServiceSettings {
    pub fn from_config(config: &MedSyncConfig) -> Result<Self> {
        Ok(Self {
            engine: EngineSettings::from_config(config)?,
            bulk_concurrency: config.sync.bulk_concurrency,
            evaluate_after_sync: config.working_state.evaluate_after_sync,
        })
    }
}

/// Result of [`ReconciliationService::reconcile`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    #[serde(flatten)]
    pub sync: SyncOutcome,
    /// Present when evaluation after sync is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<Evaluation>,
}

/// Facade over the orchestrator and the working-state engine
pub struct ReconciliationService {
    orchestrator: ReconciliationOrchestrator,
    engine: WorkingStateEngine,
    evaluate_after_sync: bool,
}

impl ReconciliationService {
    pub fn new(
        backend: Arc<dyn RecordBackend>,
        catalog: Arc<dyn StateCatalog>,
        notifier: Arc<dyn ChangeNotifier>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            orchestrator: ReconciliationOrchestrator::new(
                Arc::clone(&backend),
                settings.bulk_concurrency,
            ),
            engine: WorkingStateEngine::new(backend, catalog, notifier, settings.engine),
            evaluate_after_sync: settings.evaluate_after_sync,
        }
    }

    pub fn engine(&self) -> &WorkingStateEngine {
        &self.engine
    }

    pub fn orchestrator(&self) -> &ReconciliationOrchestrator {
        &self.orchestrator
    }

    /// Sync a parent and replace its children in one transaction
    ///
    /// With evaluation after sync enabled, the working state is re-derived
    /// once the transaction has committed; an evaluation error is returned
    /// even though the sync itself is already durable (re-running is safe).
    pub async fn reconcile(
        &self,
        hierarchy: Hierarchy,
        parent_payload: &HisPayload,
        child_payloads: &[HisPayload],
        actor: &ActorId,
    ) -> Result<ReconcileOutcome> {
        let sync = self
            .orchestrator
            .sync_with_children(hierarchy, parent_payload, child_payloads, actor)
            .await?;

        let evaluation = if self.evaluate_after_sync {
            Some(
                self.engine
                    .evaluate(hierarchy, sync.parent.external_id)
                    .await?,
            )
        } else {
            None
        };

        Ok(ReconcileOutcome { sync, evaluation })
    }

    /// Re-derive and apply a parent's working state
    pub async fn evaluate_working_state(
        &self,
        hierarchy: Hierarchy,
        external_id: i64,
    ) -> Result<Evaluation> {
        self.engine.evaluate(hierarchy, external_id).await
    }

    /// Parent, working state and ordered line-item groups
    pub async fn summarize(
        &self,
        hierarchy: Hierarchy,
        external_id: i64,
        order_by: Option<&str>,
    ) -> Result<WorkingStateSummary> {
        self.engine.summarize(hierarchy, external_id, order_by).await
    }

    /// Upsert line items independently; never fails as a whole
    pub async fn sync_line_items(
        &self,
        hierarchy: Hierarchy,
        payloads: &[HisPayload],
        actor: &ActorId,
    ) -> BulkSyncReport {
        self.orchestrator
            .sync_line_items(hierarchy, payloads, actor)
            .await
    }

    /// Upsert one inpatient child against a parent reference
    pub async fn sync_child(
        &self,
        payload: &HisPayload,
        parent_external_id: i64,
        parent_local_id: Option<Uuid>,
        actor: &ActorId,
    ) -> Result<ExportRecord> {
        self.orchestrator
            .sync_child(payload, parent_external_id, parent_local_id, actor)
            .await
    }
}
