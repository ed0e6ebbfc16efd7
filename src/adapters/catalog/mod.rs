//! Working-state catalog
//!
//! Descriptors for working-state ids live in an external catalog. The engine
//! only ever reads them, through [`StateCatalog`].

pub mod client;

use crate::config::schema::MedSyncConfig;
use crate::domain::{CatalogError, Result, WorkingStateDescriptor};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

pub use client::HttpStateCatalog;

/// Read-only lookup of working-state descriptors
#[async_trait]
pub trait StateCatalog: Send + Sync {
    /// Resolve the descriptor for `id`
    ///
    /// # Errors
    ///
    /// Returns a catalog error whose `code()` is `not_found` when the id is
    /// unknown and `upstream_unavailable` when the lookup itself failed.
    async fn describe(&self, id: i64) -> Result<WorkingStateDescriptor>;
}

/// Catalog with a fixed set of descriptors
///
/// Used when no `[state_catalog]` section is configured; unknown ids are
/// reported as not found.
#[derive(Debug, Clone, Default)]
pub struct StaticStateCatalog {
    descriptors: HashMap<i64, WorkingStateDescriptor>,
}

impl StaticStateCatalog {
    pub fn new(descriptors: impl IntoIterator<Item = WorkingStateDescriptor>) -> Self {
        Self {
            descriptors: descriptors.into_iter().map(|d| (d.id, d)).collect(),
        }
    }
}

#[async_trait]
impl StateCatalog for StaticStateCatalog {
    async fn describe(&self, id: i64) -> Result<WorkingStateDescriptor> {
        self.descriptors
            .get(&id)
            .cloned()
            .ok_or_else(|| CatalogError::StateNotFound(id).into())
    }
}

/// Build the catalog selected by configuration
///
/// # Errors
///
/// Returns a configuration error if `[state_catalog]` is present but invalid.
pub fn create_state_catalog(config: &MedSyncConfig) -> Result<Arc<dyn StateCatalog>> {
    match &config.state_catalog {
        Some(catalog_config) => {
            tracing::info!(base_url = %catalog_config.base_url, "Using remote state catalog");
            Ok(Arc::new(HttpStateCatalog::new(catalog_config.clone())?))
        }
        None => {
            tracing::info!("No state catalog configured; descriptors will be unresolved");
            Ok(Arc::new(StaticStateCatalog::default()))
        }
    }
}
