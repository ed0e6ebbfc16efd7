//! Record backend factory
//!
//! This module creates the storage backend selected by `database_target`.

use crate::adapters::database::traits::RecordBackend;
use crate::adapters::memory::MemoryBackend;
use crate::adapters::postgresql::adapter::PostgreSQLAdapter;
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::config::schema::{DatabaseTarget, MedSyncConfig};
use crate::domain::{MedSyncError, Result};
use std::sync::Arc;

/// Create a record backend based on the configuration
///
/// # Errors
///
/// Returns an error if the backend cannot be created or its configuration
/// section is missing.
pub async fn create_record_backend(config: &MedSyncConfig) -> Result<Arc<dyn RecordBackend>> {
    match config.database_target {
        DatabaseTarget::PostgreSQL => {
            let pg_config = config.postgresql.as_ref().ok_or_else(|| {
                MedSyncError::Configuration(
                    "postgresql configuration is required when database_target = 'postgresql'"
                        .to_string(),
                )
            })?;

            tracing::info!("Creating PostgreSQL record backend");
            let client = PostgreSQLClient::new(pg_config.clone()).await?;
            Ok(Arc::new(PostgreSQLAdapter::new(client)) as Arc<dyn RecordBackend>)
        }
        DatabaseTarget::Memory => {
            tracing::warn!("Using in-memory record backend; nothing will be persisted");
            Ok(Arc::new(MemoryBackend::new()) as Arc<dyn RecordBackend>)
        }
    }
}
