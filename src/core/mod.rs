//! Core reconciliation logic for MedSync.
//!
//! # Overview
//!
//! - [`store`] - generic natural-key upsert store, one shape per entity kind
//! - [`aggregate`] - line-item grouping and export predicates
//! - [`working_state`] - transition rule and the engine applying it
//! - [`reconcile`] - transactional parent/children sync and bulk fan-out
//! - [`notify`] - state-change events
//! - [`service`] - the facade transport layers call
//!
//! # Example
//!
//! ```rust,no_run
//! use medsync::adapters::catalog::StaticStateCatalog;
//! use medsync::adapters::memory::MemoryBackend;
//! use medsync::core::notify::BroadcastNotifier;
//! use medsync::core::service::{ReconciliationService, ServiceSettings};
//! use medsync::core::working_state::{EngineSettings, StateThresholds};
//! use medsync::domain::{ActorId, Hierarchy, HisPayload};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> medsync::domain::Result<()> {
//! let settings = ServiceSettings {
//!     engine: EngineSettings {
//!         thresholds: StateThresholds {
//!             all_exported: Some(20),
//!             all_actually_exported: Some(30),
//!         },
//!         system_actor: ActorId::new("system").unwrap(),
//!         topic_prefix: "medsync".to_string(),
//!     },
//!     bulk_concurrency: 8,
//!     evaluate_after_sync: true,
//! };
//! let service = ReconciliationService::new(
//!     Arc::new(MemoryBackend::new()),
//!     Arc::new(StaticStateCatalog::default()),
//!     Arc::new(BroadcastNotifier::default()),
//!     settings,
//! );
//!
//! let parent = HisPayload::from_value(json!({"ID": 1001, "DEPT_NAME": "ICU"}))?;
//! let items = vec![HisPayload::from_value(
//!     json!({"ID": 1, "TYPE_CODE": "PARA", "AMOUNT": 10, "EXPORT_USER": "nurse1"}),
//! )?];
//! let actor = ActorId::new("his-sync").unwrap();
//! let outcome = service
//!     .reconcile(Hierarchy::Cabinet, &parent, &items, &actor)
//!     .await?;
//! println!("{:?}", outcome.evaluation.map(|e| e.reason));
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod notify;
pub mod reconcile;
pub mod service;
pub mod store;
pub mod working_state;
