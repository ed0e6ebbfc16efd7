//! Domain models and types for MedSync.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Routing identifiers** ([`Hierarchy`], [`EntityKind`], [`ActorId`])
//! - **The wire integer codec** ([`wire`]), applied once at ingress
//! - **Inbound payloads** ([`HisPayload`], [`FieldUpdate`])
//! - **Persisted records** ([`Record`], [`ExportRecord`], [`LineItem`])
//! - **Error types** ([`MedSyncError`], [`CatalogError`]) and the [`Result`] alias
//!
//! # Example
//!
//! ```rust
//! use medsync::domain::{HisPayload, Hierarchy};
//! use serde_json::json;
//!
//! # fn example() -> medsync::domain::Result<()> {
//! let payload = HisPayload::from_value(json!({"ID": {"low": 1001, "high": 0}}))?;
//! assert_eq!(payload.required_integer("ID")?, 1001);
//! assert_eq!(Hierarchy::Cabinet.as_str(), "cabinet");
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod ids;
pub mod payload;
pub mod record;
pub mod result;
pub mod wire;

// Re-export commonly used types for convenience
pub use errors::{CatalogError, MedSyncError};
pub use ids::{ActorId, EntityKind, Hierarchy};
pub use payload::{FieldUpdate, HisPayload};
pub use record::{
    DescriptiveFields, ExportMark, ExportRecord, LineItem, LineItemBody, Record, RecordMeta,
    WorkingStateDescriptor,
};
pub use result::Result;
pub use wire::WireInteger;
