//! PostgreSQL client implementation
//!
//! This module provides the pooled client for interacting with PostgreSQL.

use crate::config::schema::PostgreSQLConfig;
use crate::domain::{MedSyncError, Result};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use postgres_native_tls::MakeTlsConnector;
use secrecy::ExposeSecret;
use std::time::Duration;
use tokio_postgres::error::SqlState;
use tokio_postgres::NoTls;

/// PostgreSQL client for MedSync
///
/// Owns the connection pool. Every connection handed out has the configured
/// statement timeout applied.
pub struct PostgreSQLClient {
    /// Connection pool
    pool: Pool,

    /// Configuration
    config: PostgreSQLConfig,
}

impl PostgreSQLClient {
    /// Create a new PostgreSQL client
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string is invalid, the TLS
    /// connector cannot be built, or the pool cannot be created.
    pub async fn new(config: PostgreSQLConfig) -> Result<Self> {
        let pg_config: tokio_postgres::Config = config
            .connection_string
            .expose_secret()
            .parse()
            .map_err(|e| {
                MedSyncError::Configuration(format!("Invalid PostgreSQL connection string: {}", e))
            })?;

        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let manager = match config.ssl_mode.as_str() {
            "require" | "verify-ca" | "verify-full" => {
                let connector = native_tls::TlsConnector::builder()
                    .danger_accept_invalid_certs(config.ssl_mode == "require")
                    .danger_accept_invalid_hostnames(config.ssl_mode != "verify-full")
                    .build()
                    .map_err(|e| {
                        MedSyncError::Configuration(format!("Failed to build TLS connector: {}", e))
                    })?;
                Manager::from_config(pg_config, MakeTlsConnector::new(connector), manager_config)
            }
            _ => Manager::from_config(pg_config, NoTls, manager_config),
        };

        let timeout = Duration::from_secs(config.connection_timeout_seconds);
        let pool = Pool::builder(manager)
            .max_size(config.max_connections)
            .wait_timeout(Some(timeout))
            .create_timeout(Some(timeout))
            .recycle_timeout(Some(timeout))
            .runtime(deadpool_postgres::Runtime::Tokio1)
            .build()
            .map_err(|e| {
                MedSyncError::Database(format!("Failed to create connection pool: {}", e))
            })?;

        let endpoint = connection_string_safe(config.connection_string.expose_secret().as_ref());
        tracing::debug!(
            endpoint = %endpoint,
            ssl_mode = %config.ssl_mode,
            max_connections = config.max_connections,
            "PostgreSQL pool created"
        );

        Ok(Self { pool, config })
    }

    /// Test the connection to PostgreSQL
    pub async fn test_connection(&self) -> Result<()> {
        let client = self.get_connection().await?;

        client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| MedSyncError::Database(format!("Connection test failed: {}", e)))?;

        tracing::info!("PostgreSQL connection test successful");
        Ok(())
    }

    /// Ensure the database schema exists
    ///
    /// Runs the migration SQL to create tables and indexes if they don't exist.
    pub async fn ensure_schema(&self) -> Result<()> {
        let client = self.get_connection().await?;

        let migration_sql = include_str!("../../../migrations/001_initial_schema.sql");

        client
            .batch_execute(migration_sql)
            .await
            .map_err(|e| MedSyncError::Database(format!("Failed to execute migration: {}", e)))?;

        tracing::info!("PostgreSQL schema initialized successfully");
        Ok(())
    }

    /// Get a connection from the pool with the statement timeout applied
    ///
    /// # Errors
    ///
    /// Returns an error if a connection cannot be obtained.
    pub async fn get_connection(&self) -> Result<deadpool_postgres::Object> {
        let client = self.pool.get().await.map_err(|e| {
            MedSyncError::Database(format!("Failed to get connection from pool: {}", e))
        })?;

        let timeout_query = format!(
            "SET statement_timeout = {}",
            self.config.statement_timeout_seconds * 1000
        );
        client
            .batch_execute(&timeout_query)
            .await
            .map_err(|e| {
                MedSyncError::Database(format!("Failed to set statement timeout: {}", e))
            })?;

        Ok(client)
    }

    /// Maximum ids per lookup statement
    pub fn max_bind_params(&self) -> usize {
        self.config.max_bind_params.max(1)
    }

    /// Get the connection string (without credentials)
    pub fn connection_string_safe(&self) -> String {
        connection_string_safe(self.config.connection_string.expose_secret().as_ref())
    }
}

/// Connection target with credentials masked
pub fn connection_string_safe(connection_string: &str) -> String {
    connection_string
        .rsplit('@')
        .next()
        .filter(|host| *host != connection_string)
        .map(|host| format!("postgresql://***@{}", host))
        .unwrap_or_else(|| "postgresql://***".to_string())
}

/// Map a driver error, turning unique violations into storage conflicts
pub(crate) fn map_pg_error(context: &str, error: tokio_postgres::Error) -> MedSyncError {
    if error.code() == Some(&SqlState::UNIQUE_VIOLATION) {
        return MedSyncError::StorageConflict(format!("{}: {}", context, error));
    }
    MedSyncError::Database(format!("{}: {}", context, error))
}
