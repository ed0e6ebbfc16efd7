// MedSync - HIS dispensing record reconciliation
// Licensed under the MIT License

//! # MedSync
//!
//! Mirrors medication-dispensing records from a Hospital Information System
//! (HIS) into a local store and derives a working state for each parent
//! record from the export status of its line items.
//!
//! ## Overview
//!
//! Three hierarchies are reconciled:
//! - **Cabinet**: parent records owning line items
//! - **Other**: parent records owning line items
//! - **Inpatient**: parent records owning child records, which own line items
//!
//! HIS payloads are upserted by natural key (the HIS `ID`), children are
//! replaced wholesale inside one transaction, and the working state moves
//! forward once every line item has been logically or actually exported.
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Upsert store, aggregation, working-state engine, reconciliation
//! - [`adapters`] - PostgreSQL and in-memory storage, the working-state catalog
//! - [`domain`] - Identifiers, payloads, records, wire codec and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and observability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use medsync::adapters::catalog::create_state_catalog;
//! use medsync::adapters::database::create_record_backend;
//! use medsync::config::load_config;
//! use medsync::core::notify::BroadcastNotifier;
//! use medsync::core::service::{ReconciliationService, ServiceSettings};
//! use medsync::domain::Hierarchy;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("medsync.toml")?;
//!
//!     let service = ReconciliationService::new(
//!         create_record_backend(&config).await?,
//!         create_state_catalog(&config)?,
//!         Arc::new(BroadcastNotifier::new(config.notifier.channel_capacity)),
//!         ServiceSettings::from_config(&config)?,
//!     );
//!
//!     let evaluation = service.evaluate_working_state(Hierarchy::Cabinet, 1001).await?;
//!     println!("{} -> {:?}", evaluation.reason, evaluation.new_state);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Library code returns [`domain::Result`], whose error is
//! [`domain::MedSyncError`]. "No change needed" outcomes are reported as
//! reason codes, never as errors.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
