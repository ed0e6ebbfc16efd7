//! External system integrations for MedSync.
//!
//! This module provides adapters for the systems the engine talks to:
//!
//! - [`database`] - Storage abstraction layer (trait-based) and backend factory
//! - [`postgresql`] - PostgreSQL implementation
//! - [`memory`] - In-memory implementation for local runs and tests
//! - [`catalog`] - Working-state descriptor lookups over HTTP
//!
//! # Design Pattern
//!
//! Adapters follow the **Adapter Pattern** to isolate external dependencies and
//! enable testing with in-process implementations.
//!
//! ```rust,no_run
//! use medsync::adapters::catalog::{HttpStateCatalog, StateCatalog};
//! use medsync::config::StateCatalogConfig;
//!
//! # async fn example() -> medsync::domain::Result<()> {
//! let catalog = HttpStateCatalog::new(StateCatalogConfig {
//!     base_url: "https://his.example.org/api".to_string(),
//!     api_token: None,
//!     timeout_seconds: 10,
//!     tls_verify: true,
//! })?;
//! let descriptor = catalog.describe(3).await?;
//! println!("{} ({})", descriptor.name, descriptor.code);
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod database;
pub mod memory;
pub mod postgresql;
