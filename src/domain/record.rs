//! Persisted record model
//!
//! Every entity kind is stored as a [`Record`]: the reconciliation columns
//! shared by all shapes (external id, parent reference, working state,
//! version, audit) plus a shape-specific body.

use crate::domain::ids::ActorId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Version, audit and soft-delete columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMeta {
    /// Starts at 1, +1 per mutating update
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_by: String,
    pub is_deleted: bool,
}

impl RecordMeta {
    /// Metadata for a freshly created row
    pub fn created(actor: &ActorId, now: DateTime<Utc>) -> Self {
        Self {
            version: 1,
            created_at: now,
            updated_at: now,
            created_by: actor.as_str().to_string(),
            updated_by: actor.as_str().to_string(),
            is_deleted: false,
        }
    }

    /// Record a mutating update
    pub fn touch(&mut self, actor: &ActorId, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
        self.updated_by = actor.as_str().to_string();
    }
}

/// A persisted row of any entity kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<B> {
    pub local_id: Uuid,
    pub external_id: i64,
    pub parent_external_id: Option<i64>,
    /// Cached local id of the parent; null until the parent has synced
    pub parent_local_id: Option<Uuid>,
    /// Reference into the external working-state catalog
    pub working_state_id: Option<i64>,
    pub meta: RecordMeta,
    pub body: B,
}

/// Parent records and inpatient child records
pub type ExportRecord = Record<DescriptiveFields>;

/// Medicine line items
pub type LineItem = Record<LineItemBody>;

/// Denormalized descriptive columns, keyed by snake_case attribute name
pub type DescriptiveFields = Map<String, Value>;

/// Completion marker: who exported and when
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportMark {
    pub actor: Option<String>,
    /// Epoch milliseconds as delivered by HIS
    pub timestamp: Option<i64>,
}

impl ExportMark {
    /// Marked complete: a non-blank actor or a positive timestamp
    pub fn is_complete(&self) -> bool {
        let has_actor = self
            .actor
            .as_deref()
            .is_some_and(|actor| !actor.trim().is_empty());
        let has_time = self.timestamp.is_some_and(|ts| ts > 0);
        has_actor || has_time
    }
}

/// Line-item columns the engine reads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItemBody {
    pub amount: Option<f64>,
    pub type_code: Option<String>,
    pub type_name: Option<String>,
    pub unit_code: Option<String>,
    pub unit_name: Option<String>,
    pub specification: Option<String>,
    /// Recorded/approved export
    pub logical_export: ExportMark,
    /// Physically dispensed
    pub actual_export: ExportMark,
}

impl LineItemBody {
    /// Type code, if present and non-blank
    pub fn group_code(&self) -> Option<&str> {
        self.type_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }
}

/// Externally owned working-state catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingStateDescriptor {
    pub id: i64,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub updated_by: Option<String>,
    #[serde(default)]
    pub version: Option<i64>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}
