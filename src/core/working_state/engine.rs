//! Working-state engine
//!
//! Derives a parent's working state from the export status of its line
//! items, persists a transition, and publishes it.

use super::decision::{decide, ExportFacts, StateThresholds, TransitionReason};
use crate::adapters::catalog::StateCatalog;
use crate::adapters::database::traits::RecordBackend;
use crate::config::schema::MedSyncConfig;
use crate::core::aggregate::{self, GroupSummary};
use crate::core::notify::{topic_for, ChangeNotifier, StateChangeEvent};
use crate::core::store::hierarchy;
use crate::domain::ids::{ActorId, Hierarchy};
use crate::domain::record::{ExportRecord, WorkingStateDescriptor};
use crate::domain::{MedSyncError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Engine settings drawn from configuration
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub thresholds: StateThresholds,
    /// Actor stamped on state transitions
    pub system_actor: ActorId,
    pub topic_prefix: String,
}

impl EngineSettings {
    /// Read settings from a loaded configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `application.system_actor` is blank.
    pub fn from_config(config: &MedSyncConfig) -> Result<Self> {
        let system_actor = ActorId::new(config.application.system_actor.clone())
            .map_err(|e| MedSyncError::Configuration(format!("application.system_actor: {}", e)))?;

        Ok(Self {
            thresholds: StateThresholds {
                all_exported: config.working_state.all_exported_state_id,
                all_actually_exported: config.working_state.all_actually_exported_state_id,
            },
            system_actor,
            topic_prefix: config.notifier.topic_prefix.clone(),
        })
    }
}

/// Details of a persisted transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionSummary {
    /// Parent as re-read after the transition
    pub record: ExportRecord,
    pub working_state: Option<WorkingStateDescriptor>,
    pub groups: Vec<GroupSummary>,
    pub timestamp: DateTime<Utc>,
}

/// Result of [`WorkingStateEngine::evaluate`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub updated: bool,
    pub old_state: Option<i64>,
    pub new_state: Option<i64>,
    pub reason: TransitionReason,
    pub summary: Option<TransitionSummary>,
}

impl Evaluation {
    fn unchanged(state: Option<i64>, reason: TransitionReason) -> Self {
        Self {
            updated: false,
            old_state: state,
            new_state: state,
            reason,
            summary: None,
        }
    }
}

/// Result of [`WorkingStateEngine::summarize`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingStateSummary {
    pub parent: ExportRecord,
    pub working_state: Option<WorkingStateDescriptor>,
    pub groups: Vec<GroupSummary>,
}

/// Derives and applies working states
pub struct WorkingStateEngine {
    backend: Arc<dyn RecordBackend>,
    catalog: Arc<dyn StateCatalog>,
    notifier: Arc<dyn ChangeNotifier>,
    settings: EngineSettings,
}

impl WorkingStateEngine {
    pub fn new(
        backend: Arc<dyn RecordBackend>,
        catalog: Arc<dyn StateCatalog>,
        notifier: Arc<dyn ChangeNotifier>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            backend,
            catalog,
            notifier,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Re-derive the working state of one parent
    ///
    /// A missing parent, a parent without line items and an unchanged state
    /// are reported through `reason`, not as errors. Storage failures before
    /// the state is persisted propagate; a failed descriptor lookup after it
    /// is logged and leaves the descriptor empty.
    pub async fn evaluate(&self, hierarchy: Hierarchy, parent_external_id: i64) -> Result<Evaluation> {
        let session = self.backend.as_session();

        let Some(parent) = hierarchy::find_parent(session, hierarchy, parent_external_id).await?
        else {
            tracing::debug!(
                hierarchy = %hierarchy,
                external_id = parent_external_id,
                "Parent not synced yet; skipping evaluation"
            );
            return Ok(Evaluation::unchanged(None, TransitionReason::ParentNotFound));
        };
        let current = parent.working_state_id;

        let items = hierarchy::line_items_of_parent(session, hierarchy, parent_external_id).await?;
        if items.is_empty() {
            return Ok(Evaluation::unchanged(current, TransitionReason::NoMedicines));
        }

        let facts = ExportFacts {
            all_exported: aggregate::all_logically_exported(&items),
            all_actually_exported: aggregate::all_actually_exported(&items),
        };

        let Some((target, reason)) = decide(current, facts, self.settings.thresholds) else {
            tracing::debug!(
                hierarchy = %hierarchy,
                external_id = parent_external_id,
                current_state = ?current,
                all_exported = facts.all_exported,
                all_actually_exported = facts.all_actually_exported,
                "No working-state change needed"
            );
            return Ok(Evaluation::unchanged(
                current,
                TransitionReason::NoStateChangeNeeded,
            ));
        };

        let persisted = hierarchy::set_parent_working_state(
            session,
            hierarchy,
            &parent,
            Some(target),
            &self.settings.system_actor,
        )
        .await?;

        // Past this point the transition is committed; nothing below may fail it
        let record = match hierarchy::find_parent(session, hierarchy, parent_external_id).await {
            Ok(Some(record)) => record,
            Ok(None) => persisted,
            Err(e) => {
                tracing::warn!(
                    hierarchy = %hierarchy,
                    external_id = parent_external_id,
                    error = %e,
                    "Failed to re-read parent after transition"
                );
                persisted
            }
        };

        let descriptor = match self.catalog.describe(target).await {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                tracing::warn!(
                    hierarchy = %hierarchy,
                    external_id = parent_external_id,
                    state_id = target,
                    error = %e,
                    error_code = e.code(),
                    "Working-state descriptor lookup failed"
                );
                None
            }
        };

        let timestamp = Utc::now();
        let event = StateChangeEvent {
            hierarchy,
            external_id: parent_external_id,
            local_id: record.local_id,
            old_state: current,
            new_state: Some(target),
            reason,
            timestamp,
            record: record.clone(),
            descriptor: descriptor.clone(),
        };
        self.notifier
            .publish(&topic_for(&self.settings.topic_prefix, hierarchy), event);

        crate::log_state_transition!(hierarchy, parent_external_id, current, target, reason);

        Ok(Evaluation {
            updated: true,
            old_state: current,
            new_state: Some(target),
            reason,
            summary: Some(TransitionSummary {
                record,
                working_state: descriptor,
                groups: aggregate::aggregate(&items, None),
                timestamp,
            }),
        })
    }

    /// Parent, resolved working state and ordered line-item groups
    ///
    /// # Errors
    ///
    /// `NotFound` when the parent does not exist; catalog failures are
    /// surfaced as-is. A parent without a state skips the lookup.
    pub async fn summarize(
        &self,
        hierarchy: Hierarchy,
        external_id: i64,
        order_by: Option<&str>,
    ) -> Result<WorkingStateSummary> {
        let session = self.backend.as_session();

        let parent = hierarchy::find_parent(session, hierarchy, external_id)
            .await?
            .ok_or_else(|| {
                MedSyncError::NotFound(format!("{} record {}", hierarchy, external_id))
            })?;

        let working_state = match parent.working_state_id {
            Some(id) => Some(self.catalog.describe(id).await?),
            None => None,
        };

        let items = hierarchy::line_items_of_parent(session, hierarchy, external_id).await?;
        let groups = aggregate::aggregate(&items, order_by);

        Ok(WorkingStateSummary {
            parent,
            working_state,
            groups,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::catalog::StaticStateCatalog;
    use crate::adapters::memory::MemoryBackend;
    use crate::config::schema::test_config;
    use crate::core::notify::BroadcastNotifier;
    use crate::core::store::hierarchy::upsert_parent;
    use crate::domain::HisPayload;
    use serde_json::json;

    #[test]
    fn test_settings_from_config() {
        let mut config = test_config();
        let settings = EngineSettings::from_config(&config).unwrap();
        assert_eq!(settings.thresholds.all_exported, Some(20));
        assert_eq!(settings.system_actor.as_str(), "system");

        config.application.system_actor = String::new();
        assert!(matches!(
            EngineSettings::from_config(&config),
            Err(MedSyncError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_summarize_without_state_skips_catalog() {
        let backend = Arc::new(MemoryBackend::new());
        let engine = WorkingStateEngine::new(
            backend.clone(),
            Arc::new(StaticStateCatalog::default()),
            Arc::new(BroadcastNotifier::default()),
            EngineSettings::from_config(&test_config()).unwrap(),
        );

        let payload = HisPayload::from_value(json!({"ID": 3})).unwrap();
        let actor = ActorId::new("sync").unwrap();
        upsert_parent(backend.as_session(), Hierarchy::Other, &payload, &actor)
            .await
            .unwrap();

        let summary = engine.summarize(Hierarchy::Other, 3, None).await.unwrap();
        assert!(summary.working_state.is_none());
        assert!(summary.groups.is_empty());
    }
}
